//! Display token produced by the tokenizer.

use serde::{Deserialize, Serialize};

/// Punctuation that marks a clause boundary without ending the sentence.
const CLAUSE_MARKS: [char; 5] = [',', ';', ':', '—', '–'];

/// One word of the RSVP stream.
///
/// Tokens are plain values: once the tokenizer hands them out they are never
/// edited. Re-tokenizing a text produces a fresh sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    /// Position in the full token sequence.
    pub global_index: usize,
    /// Raw whitespace-delimited chunk, including attached punctuation.
    pub original_text: String,
    /// Part of the word body before the optical anchor.
    pub left_segment: String,
    /// The optical anchor character.
    pub center_character: String,
    /// Part of the word body after the optical anchor.
    pub right_segment: String,
    /// Trailing punctuation cluster stripped from the body.
    pub punctuation: Option<String>,
    /// Multiplier applied to the base per-word duration.
    pub duration_multiplier: f64,
    pub is_sentence_end: bool,
    pub is_paragraph_end: bool,
    /// Character offset (Unicode scalar values) of the chunk in the source.
    pub start_offset: usize,
}

impl Token {
    /// The word body without trailing punctuation.
    pub fn body(&self) -> String {
        format!(
            "{}{}{}",
            self.left_segment, self.center_character, self.right_segment
        )
    }

    /// True when the attached punctuation closes a clause but not a sentence.
    pub fn ends_clause(&self) -> bool {
        !self.is_sentence_end
            && self
                .punctuation
                .as_deref()
                .is_some_and(|p| p.chars().any(|c| CLAUSE_MARKS.contains(&c)))
    }

    /// Number of characters in `original_text`.
    pub fn char_len(&self) -> usize {
        self.original_text.chars().count()
    }
}
