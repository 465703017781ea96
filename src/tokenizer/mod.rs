//! Text → RSVP token sequence.
//!
//! Tokenization is deterministic and resumable: a [`TokenizeJob`] hands out
//! bounded batches so a host can yield (or check for cancellation) between
//! them, and the concatenation of all batches is identical to a single
//! [`tokenize`] call regardless of the batch size.

pub mod duration;
pub mod lexicon;
pub mod orp;
pub mod token;

pub use token::Token;

use duration::{WordContext, duration_multiplier};
use serde::{Deserialize, Serialize};

/// Trailing characters stripped from a chunk into its punctuation cluster.
const TERMINAL_PUNCTUATION: &[char] = &[
    '.', ',', ';', ':', '!', '?', '…', '"', '\'', '\u{201d}', '\u{2019}', '»', ')', ']', '}',
    '—', '–',
];

/// Characters that open a quotation when leading a chunk.
const OPENING_QUOTES: &[char] = &['"', '\u{201c}', '«', '\u{2018}'];

/// Characters that close a quotation inside a punctuation cluster.
const CLOSING_QUOTES: &[char] = &['"', '\u{201d}', '»', '\u{2019}'];

const SENTENCE_MARKS: &[char] = &['.', '!', '?', '…'];

/// Tunable constants of the duration model.
///
/// The defaults are empirically tuned; override them through the
/// `[tokenizer]` config section rather than editing the heuristics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenizerConfig {
    /// Multiplier for one-syllable words.
    pub one_syllable_factor: f64,
    /// Added per syllable beyond two.
    pub syllable_step: f64,
    pub function_word_factor: f64,
    pub emphasis_word_factor: f64,
    pub conjunction_factor: f64,
    pub sentence_start_factor: f64,
    /// Discount applied inside an open quotation.
    pub dialogue_factor: f64,
    pub sentence_pause_secs: f64,
    pub ellipsis_pause_secs: f64,
    pub semicolon_pause_secs: f64,
    pub dash_pause_secs: f64,
    pub comma_pause_secs: f64,
    pub max_punctuation_pause_secs: f64,
    pub paragraph_pause_secs: f64,
    /// Word duration the pause table is expressed against (300 WPM).
    pub reference_word_secs: f64,
    pub min_multiplier: f64,
    pub max_multiplier: f64,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            one_syllable_factor: 0.85,
            syllable_step: 0.2,
            function_word_factor: 0.85,
            emphasis_word_factor: 1.15,
            conjunction_factor: 1.05,
            sentence_start_factor: 1.1,
            dialogue_factor: 0.92,
            sentence_pause_secs: 0.12,
            ellipsis_pause_secs: 0.16,
            semicolon_pause_secs: 0.08,
            dash_pause_secs: 0.06,
            comma_pause_secs: 0.05,
            max_punctuation_pause_secs: 0.2,
            paragraph_pause_secs: 0.1,
            reference_word_secs: 0.2,
            min_multiplier: 0.5,
            max_multiplier: 3.5,
        }
    }
}

/// Stateless tokenizer front-end holding the duration configuration.
#[derive(Debug, Clone, Default)]
pub struct Tokenizer {
    config: TokenizerConfig,
}

impl Tokenizer {
    pub fn new(config: TokenizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TokenizerConfig {
        &self.config
    }

    /// Tokenizes the whole text in one go.
    pub fn tokenize(&self, text: &str) -> Vec<Token> {
        let mut job = self.job(text);
        let mut tokens = Vec::new();
        while !job.is_done() {
            tokens.extend(job.next_batch(usize::MAX));
        }
        tokens
    }

    /// Starts a resumable job over `text`.
    pub fn job<'t>(&self, text: &'t str) -> TokenizeJob<'t> {
        TokenizeJob {
            text,
            config: self.config.clone(),
            cursor: 0,
            char_offset: 0,
            next_index: 0,
            quote_depth: 0,
            sentence_start: true,
        }
    }
}

/// Tokenizes `text` with the default duration model.
pub fn tokenize(text: &str) -> Vec<Token> {
    Tokenizer::default().tokenize(text)
}

/// Resumable tokenization over a borrowed text.
#[derive(Debug)]
pub struct TokenizeJob<'t> {
    text: &'t str,
    config: TokenizerConfig,
    /// Byte position of the next unread character.
    cursor: usize,
    /// Character position matching `cursor`.
    char_offset: usize,
    next_index: usize,
    quote_depth: u32,
    sentence_start: bool,
}

impl<'t> TokenizeJob<'t> {
    /// True once every token has been produced.
    pub fn is_done(&self) -> bool {
        self.text[self.cursor..].trim_start().is_empty()
    }

    /// Number of tokens produced so far.
    pub fn produced(&self) -> usize {
        self.next_index
    }

    /// Produces up to `max` further tokens (at least one while not done).
    pub fn next_batch(&mut self, max: usize) -> Vec<Token> {
        let max = max.max(1);
        let mut batch = Vec::with_capacity(max.min(1024));
        while batch.len() < max {
            match self.next_token() {
                Some(token) => batch.push(token),
                None => break,
            }
        }
        batch
    }

    fn skip_whitespace(&mut self) -> &'t str {
        let rest = &self.text[self.cursor..];
        let len = rest
            .find(|c: char| !c.is_whitespace())
            .unwrap_or(rest.len());
        let whitespace = &rest[..len];
        self.cursor += len;
        self.char_offset += whitespace.chars().count();
        whitespace
    }

    fn next_token(&mut self) -> Option<Token> {
        self.skip_whitespace();
        let rest = &self.text[self.cursor..];
        if rest.is_empty() {
            return None;
        }

        let chunk_len = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let chunk = &rest[..chunk_len];
        let start_offset = self.char_offset;
        self.cursor += chunk_len;
        self.char_offset += chunk.chars().count();

        let trailing = self.skip_whitespace();
        let is_paragraph_end = trailing.contains('\n') || self.cursor == self.text.len();

        Some(self.build_token(chunk, start_offset, is_paragraph_end))
    }

    fn build_token(&mut self, chunk: &str, start_offset: usize, is_paragraph_end: bool) -> Token {
        let (body, punctuation) = split_punctuation(chunk);

        let opening = body.chars().take_while(|c| OPENING_QUOTES.contains(c)).count() as u32;
        self.quote_depth += opening;
        let in_dialogue = self.quote_depth > 0;

        let is_sentence_end = punctuation.is_some_and(|p| ends_sentence(body, p));

        let context = WordContext {
            is_sentence_start: self.sentence_start,
            in_dialogue,
            is_paragraph_end,
        };
        let duration = duration_multiplier(body, punctuation, context, &self.config);

        if let Some(p) = punctuation {
            let closing = p.chars().filter(|c| CLOSING_QUOTES.contains(c)).count() as u32;
            self.quote_depth = self.quote_depth.saturating_sub(closing);
        }
        if is_paragraph_end {
            // Unbalanced quotes never leak past a paragraph.
            self.quote_depth = 0;
        }
        self.sentence_start = is_sentence_end || is_paragraph_end;

        let (left_segment, center_character, right_segment) = orp::split_at_pivot(body);
        let global_index = self.next_index;
        self.next_index += 1;

        Token {
            global_index,
            original_text: chunk.to_string(),
            left_segment,
            center_character,
            right_segment,
            punctuation: punctuation.map(str::to_string),
            duration_multiplier: duration,
            is_sentence_end,
            is_paragraph_end,
            start_offset,
        }
    }
}

/// Splits a chunk into its word body and trailing punctuation cluster.
///
/// A chunk made only of punctuation stays whole as the body.
fn split_punctuation(chunk: &str) -> (&str, Option<&str>) {
    let body = chunk.trim_end_matches(TERMINAL_PUNCTUATION);
    if body.is_empty() || body.len() == chunk.len() {
        (chunk, None)
    } else {
        (body, Some(&chunk[body.len()..]))
    }
}

fn ends_sentence(body: &str, punctuation: &str) -> bool {
    if !punctuation.contains(SENTENCE_MARKS) {
        return false;
    }
    let only_periods = punctuation
        .chars()
        .filter(|c| SENTENCE_MARKS.contains(c))
        .all(|c| c == '.');
    let single_period = punctuation.matches('.').count() == 1;
    !(only_periods && single_period && lexicon::is_abbreviation(body))
}
