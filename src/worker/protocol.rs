//! Messages exchanged with the tokenizer worker.

use crate::tokenizer::Token;
use std::sync::Arc;

/// A request to tokenize one text.
#[derive(Debug, Clone)]
pub struct TokenizeRequest {
    /// Monotonically increasing request id; newer always wins.
    pub generation: u64,
    pub text: Arc<str>,
    /// Maximum tokens per delivered chunk.
    pub chunk_size: usize,
    /// Tokens already delivered for this generation; they are not resent.
    pub skip: usize,
}

/// A message from the worker back to the consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    /// Next ordered, appendable slice of the token sequence.
    Chunk { generation: u64, tokens: Vec<Token> },
    /// Every token for the generation has been delivered.
    Complete { generation: u64, total: usize },
    /// The tokenizer failed after delivering `delivered` tokens.
    Failed {
        generation: u64,
        message: String,
        delivered: usize,
    },
}

impl Delivery {
    pub fn generation(&self) -> u64 {
        match self {
            Delivery::Chunk { generation, .. }
            | Delivery::Complete { generation, .. }
            | Delivery::Failed { generation, .. } => *generation,
        }
    }
}
