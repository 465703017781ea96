//! Per-token duration heuristics.
//!
//! The multiplier is built in three passes: multiplicative adjustments for
//! syllables, word category, sentence position and dialogue; additive pauses
//! for punctuation and paragraph breaks; and a final clamp.

use super::TokenizerConfig;
use super::lexicon::{WordCategory, classify};

/// Context the tokenizer tracks across tokens.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordContext {
    pub is_sentence_start: bool,
    pub in_dialogue: bool,
    pub is_paragraph_end: bool,
}

fn is_vowel(c: char) -> bool {
    matches!(c, 'a' | 'e' | 'i' | 'o' | 'u' | 'y')
}

/// Estimates syllables by counting vowel groups.
///
/// Cheap end-of-word corrections: a trailing silent `e` is dropped
/// (`make`), but a consonant followed by `le` keeps its syllable (`table`).
/// Never returns less than 1.
pub fn estimate_syllables(word: &str) -> u32 {
    let chars: Vec<char> = word
        .chars()
        .filter(|c| c.is_alphabetic())
        .flat_map(char::to_lowercase)
        .collect();
    if chars.is_empty() {
        return 1;
    }

    let mut count: u32 = 0;
    let mut previous_vowel = false;
    for &c in &chars {
        let vowel = is_vowel(c);
        if vowel && !previous_vowel {
            count += 1;
        }
        previous_vowel = vowel;
    }

    let n = chars.len();
    if n > 2 && chars[n - 1] == 'e' {
        let consonant_le = chars[n - 2] == 'l' && !is_vowel(chars[n - 3]);
        if !consonant_le && count > 1 {
            count -= 1;
        }
    }

    count.max(1)
}

/// Multiplier for a syllable count.
pub fn syllable_factor(syllables: u32, config: &TokenizerConfig) -> f64 {
    match syllables {
        0 | 1 => config.one_syllable_factor,
        2 => 1.0,
        n => 1.0 + config.syllable_step * f64::from(n - 2),
    }
}

/// Pause in seconds for a trailing punctuation cluster.
///
/// Only the heaviest mark in the cluster counts, so `?!` pauses once.
pub fn punctuation_pause_secs(cluster: &str, config: &TokenizerConfig) -> f64 {
    if cluster.contains("...") || cluster.contains('…') {
        return config.ellipsis_pause_secs.min(config.max_punctuation_pause_secs);
    }
    let heaviest = cluster
        .chars()
        .map(|c| match c {
            '.' | '!' | '?' => config.sentence_pause_secs,
            ';' | ':' => config.semicolon_pause_secs,
            '—' | '–' => config.dash_pause_secs,
            ',' => config.comma_pause_secs,
            _ => 0.0,
        })
        .fold(0.0_f64, f64::max);
    heaviest.min(config.max_punctuation_pause_secs)
}

/// Computes the duration multiplier for one word.
///
/// `body` is the word without its trailing punctuation cluster.
pub fn duration_multiplier(
    body: &str,
    punctuation: Option<&str>,
    context: WordContext,
    config: &TokenizerConfig,
) -> f64 {
    let normalized: String = body
        .chars()
        .filter(|c| c.is_alphabetic() || *c == '\'')
        .flat_map(char::to_lowercase)
        .collect();

    let mut multiplier = syllable_factor(estimate_syllables(&normalized), config);

    multiplier *= match classify(normalized.trim_matches('\'')) {
        WordCategory::Function => config.function_word_factor,
        WordCategory::Emphasis => config.emphasis_word_factor,
        WordCategory::ClauseConjunction => config.conjunction_factor,
        WordCategory::Content => 1.0,
    };
    if context.is_sentence_start {
        multiplier *= config.sentence_start_factor;
    }
    if context.in_dialogue {
        multiplier *= config.dialogue_factor;
    }

    let mut pause_secs = punctuation
        .map(|p| punctuation_pause_secs(p, config))
        .unwrap_or(0.0);
    if context.is_paragraph_end {
        pause_secs += config.paragraph_pause_secs;
    }
    if config.reference_word_secs > 0.0 {
        multiplier += pause_secs / config.reference_word_secs;
    }

    // Total for NaN bounds and inverted ranges, unlike `f64::clamp`.
    let bounded = multiplier
        .max(config.min_multiplier)
        .min(config.max_multiplier);
    if bounded.is_finite() && bounded >= 0.0 {
        bounded
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TokenizerConfig {
        TokenizerConfig::default()
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn syllables_of_common_words() {
        assert_eq!(estimate_syllables("world"), 1);
        assert_eq!(estimate_syllables("hello"), 2);
        assert_eq!(estimate_syllables("beautiful"), 3);
        assert_eq!(estimate_syllables("yes"), 1);
    }

    #[test]
    fn silent_e_is_dropped() {
        assert_eq!(estimate_syllables("make"), 1);
        assert_eq!(estimate_syllables("code"), 1);
        assert_eq!(estimate_syllables("whale"), 1);
    }

    #[test]
    fn consonant_le_keeps_syllable() {
        assert_eq!(estimate_syllables("table"), 2);
        assert_eq!(estimate_syllables("little"), 2);
        assert_eq!(estimate_syllables("people"), 2);
    }

    #[test]
    fn syllables_have_a_floor_of_one() {
        assert_eq!(estimate_syllables(""), 1);
        assert_eq!(estimate_syllables("hmm"), 1);
        assert_eq!(estimate_syllables("42"), 1);
        assert_eq!(estimate_syllables("the"), 1);
    }

    #[test]
    fn syllable_bands() {
        let c = config();
        assert!(approx(syllable_factor(1, &c), 0.85));
        assert!(approx(syllable_factor(2, &c), 1.0));
        assert!(approx(syllable_factor(3, &c), 1.2));
        assert!(approx(syllable_factor(5, &c), 1.6));
    }

    #[test]
    fn sentence_punctuation_outweighs_comma() {
        let c = config();
        assert!(punctuation_pause_secs(".", &c) > punctuation_pause_secs(",", &c));
        assert!(punctuation_pause_secs("?", &c) > punctuation_pause_secs(";", &c));
    }

    #[test]
    fn ellipsis_is_heaviest() {
        let c = config();
        assert!(punctuation_pause_secs("...", &c) > punctuation_pause_secs(".", &c));
        assert!(approx(
            punctuation_pause_secs("…", &c),
            punctuation_pause_secs("...", &c)
        ));
    }

    #[test]
    fn cluster_counts_once() {
        let c = config();
        assert!(approx(
            punctuation_pause_secs("?!", &c),
            punctuation_pause_secs("?", &c)
        ));
        assert!(approx(
            punctuation_pause_secs(".\u{201d}", &c),
            punctuation_pause_secs(".", &c)
        ));
    }

    #[test]
    fn closing_quote_alone_has_no_pause() {
        assert!(approx(punctuation_pause_secs("\u{201d}", &config()), 0.0));
    }

    #[test]
    fn function_word_is_faster_than_content_word() {
        let c = config();
        let ctx = WordContext::default();
        assert!(
            duration_multiplier("the", None, ctx, &c) < duration_multiplier("dog", None, ctx, &c)
        );
    }

    #[test]
    fn emphasis_word_is_slower() {
        let c = config();
        let ctx = WordContext::default();
        // "never" and "river" are both two syllables
        assert!(
            duration_multiplier("never", None, ctx, &c)
                > duration_multiplier("river", None, ctx, &c)
        );
    }

    #[test]
    fn sentence_start_and_dialogue_adjust() {
        let c = config();
        let plain = duration_multiplier("river", None, WordContext::default(), &c);
        let start = duration_multiplier(
            "river",
            None,
            WordContext {
                is_sentence_start: true,
                ..Default::default()
            },
            &c,
        );
        let dialogue = duration_multiplier(
            "river",
            None,
            WordContext {
                in_dialogue: true,
                ..Default::default()
            },
            &c,
        );
        assert!(approx(start, plain * 1.1));
        assert!(approx(dialogue, plain * 0.92));
    }

    #[test]
    fn punctuation_adds_pause() {
        let c = config();
        let ctx = WordContext::default();
        let bare = duration_multiplier("river", None, ctx, &c);
        let period = duration_multiplier("river", Some("."), ctx, &c);
        let expected = bare + c.sentence_pause_secs / c.reference_word_secs;
        assert!(approx(period, expected));
    }

    #[test]
    fn paragraph_end_adds_fixed_pause() {
        let c = config();
        let bare = duration_multiplier("river", None, WordContext::default(), &c);
        let para = duration_multiplier(
            "river",
            None,
            WordContext {
                is_paragraph_end: true,
                ..Default::default()
            },
            &c,
        );
        assert!(approx(para - bare, c.paragraph_pause_secs / c.reference_word_secs));
    }

    #[test]
    fn multiplier_is_clamped() {
        let c = config();
        let huge = duration_multiplier(
            "incomprehensibilities",
            Some("..."),
            WordContext {
                is_sentence_start: true,
                is_paragraph_end: true,
                ..Default::default()
            },
            &c,
        );
        assert!(approx(huge, c.max_multiplier));

        let tiny_config = TokenizerConfig {
            min_multiplier: 0.9,
            ..c
        };
        let tiny = duration_multiplier(
            "a",
            None,
            WordContext {
                in_dialogue: true,
                ..Default::default()
            },
            &tiny_config,
        );
        assert!(approx(tiny, 0.9));
    }

    #[test]
    fn broken_bounds_never_panic() {
        let nan_config = TokenizerConfig {
            min_multiplier: f64::NAN,
            ..config()
        };
        let m = duration_multiplier("hello", None, WordContext::default(), &nan_config);
        assert!(approx(m, 1.0));

        let inverted = TokenizerConfig {
            min_multiplier: 3.0,
            max_multiplier: 1.0,
            ..config()
        };
        let m = duration_multiplier("hello", Some("."), WordContext::default(), &inverted);
        assert!(approx(m, 1.0));

        let all_nan = TokenizerConfig {
            reference_word_secs: f64::NAN,
            min_multiplier: f64::NAN,
            max_multiplier: f64::NAN,
            ..config()
        };
        let m = duration_multiplier("hello", Some("."), WordContext::default(), &all_nan);
        assert!(m.is_finite() && m >= 0.0);
    }
}
