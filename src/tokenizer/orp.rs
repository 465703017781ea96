//! Optical recognition point (ORP) placement.

/// Pivot index for a word body of `len` characters.
///
/// The pivot stops scaling past 10 characters; very long words keep the
/// anchor near the front where the eye lands.
pub fn pivot_index(len: usize) -> usize {
    match len {
        0 | 1 => 0,
        2..=5 => 1,
        6..=10 => 2,
        _ => 3,
    }
}

/// Splits a word body into `(left, center, right)` around its anchor.
///
/// Leading punctuation such as an opening quote is kept in `left` and does
/// not count towards the pivot, so `"Hello` anchors on the same letter as
/// `Hello`. Bodies made only of punctuation anchor on their first character.
pub fn split_at_pivot(body: &str) -> (String, String, String) {
    let chars: Vec<char> = body.chars().collect();
    if chars.is_empty() {
        return (String::new(), String::new(), String::new());
    }

    let prefix = chars
        .iter()
        .take_while(|c| !c.is_alphanumeric())
        .count();
    let core_len = chars.len() - prefix;
    let pivot = if core_len == 0 {
        0
    } else {
        prefix + pivot_index(core_len)
    };

    let left: String = chars[..pivot].iter().collect();
    let center = chars[pivot].to_string();
    let right: String = chars[pivot + 1..].iter().collect();
    (left, center, right)
}
