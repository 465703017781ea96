//! Word lists behind the duration categories.

use std::collections::HashSet;
use std::sync::LazyLock;

/// Category of a word for pacing purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordCategory {
    /// Closed-class words the eye skims (articles, prepositions, pronouns).
    Function,
    /// Intensifiers and negations that deserve a beat longer.
    Emphasis,
    /// Subordinating conjunctions and connectives opening a clause.
    ClauseConjunction,
    Content,
}

const FUNCTION_WORDS: &[&str] = &[
    "a", "about", "after", "all", "also", "am", "an", "and", "any", "are", "as", "at", "be",
    "been", "being", "but", "by", "can", "could", "did", "do", "does", "for", "from", "had",
    "has", "have", "he", "her", "hers", "him", "his", "i", "if", "in", "into", "is", "it",
    "its", "me", "my", "nor", "of", "off", "on", "onto", "or", "our", "ours", "out", "over",
    "she", "should", "some", "than", "that", "the", "their", "them", "then", "there", "these",
    "they", "this", "those", "to", "up", "upon", "us", "was", "we", "were", "what", "which",
    "who", "whom", "will", "with", "would", "you", "your",
];

const EMPHASIS_WORDS: &[&str] = &[
    "absolutely", "always", "certainly", "completely", "critical", "definitely", "entirely",
    "essential", "every", "extremely", "forever", "highly", "important", "incredibly", "must",
    "never", "no", "none", "not", "nothing", "only", "really", "remarkably", "totally",
    "truly", "utterly", "very",
];

const CLAUSE_CONJUNCTIONS: &[&str] = &[
    "although", "because", "consequently", "furthermore", "hence", "however", "meanwhile",
    "moreover", "nevertheless", "nonetheless", "otherwise", "since", "therefore", "though",
    "thus", "unless", "until", "whereas", "whenever", "wherever", "whether", "while", "yet",
];

/// Lowercased abbreviations (without the final period) that do not end a sentence.
const ABBREVIATIONS: &[&str] = &[
    "al", "approx", "capt", "cf", "co", "col", "corp", "dept", "dr", "e.g", "est", "etc",
    "fig", "gen", "gov", "i.e", "inc", "jr", "lt", "ltd", "mr", "mrs", "ms", "mt", "pp",
    "prof", "rev", "sen", "sgt", "sr", "st", "vol", "vs",
];

static FUNCTION_SET: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| FUNCTION_WORDS.iter().copied().collect());
static EMPHASIS_SET: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| EMPHASIS_WORDS.iter().copied().collect());
static CONJUNCTION_SET: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| CLAUSE_CONJUNCTIONS.iter().copied().collect());
static ABBREVIATION_SET: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| ABBREVIATIONS.iter().copied().collect());

/// Classifies a normalized (lowercase, letters only) word.
pub fn classify(word: &str) -> WordCategory {
    if FUNCTION_SET.contains(word) {
        WordCategory::Function
    } else if EMPHASIS_SET.contains(word) {
        WordCategory::Emphasis
    } else if CONJUNCTION_SET.contains(word) {
        WordCategory::ClauseConjunction
    } else {
        WordCategory::Content
    }
}

/// True when a body followed by `.` is an abbreviation or a single initial.
///
/// `body` is the raw word body; leading punctuation is ignored. The pronoun
/// `I` is not an initial.
pub fn is_abbreviation(body: &str) -> bool {
    let trimmed = body.trim_start_matches(|c: char| !c.is_alphanumeric());
    let mut chars = trimmed.chars();
    if let (Some(first), None) = (chars.next(), chars.next())
        && first.is_uppercase()
        && first != 'I'
    {
        return true;
    }
    ABBREVIATION_SET.contains(trimmed.to_lowercase().as_str())
}
