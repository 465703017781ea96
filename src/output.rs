//! Terminal rendering for the reader and the `tokens` command.

use crate::conductor::{EngineMode, EngineUpdate};
use crate::tokenizer::Token;
use owo_colors::OwoColorize;
use std::io::{self, Write};

/// Column the anchor character is pinned to.
pub const ANCHOR_COLUMN: usize = 14;

const BAR_WIDTH: usize = 24;

/// Clear the current terminal line.
pub fn clear_line() {
    eprint!("\r\x1b[2K");
}

/// Spaces needed so the anchor lands on [`ANCHOR_COLUMN`].
fn anchor_padding(left: &str) -> usize {
    ANCHOR_COLUMN.saturating_sub(left.chars().count())
}

/// Renders one token with its anchor highlighted at a fixed column.
pub fn render_word(token: &Token, color: bool) -> String {
    let pad = " ".repeat(anchor_padding(&token.left_segment));
    let punctuation = token.punctuation.as_deref().unwrap_or("");
    if color {
        format!(
            "{pad}{}{}{}{}",
            token.left_segment,
            token.center_character.red().bold(),
            token.right_segment,
            punctuation.dimmed()
        )
    } else {
        format!(
            "{pad}{}{}{}{}",
            token.left_segment, token.center_character, token.right_segment, punctuation
        )
    }
}

/// Text progress bar, e.g. `[######------]`.
pub fn progress_bar(index: usize, total: usize, width: usize) -> String {
    let filled = if total == 0 {
        0
    } else {
        ((index + 1) * width / total).min(width)
    };
    format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled))
}

fn mode_label(mode: EngineMode) -> &'static str {
    match mode {
        EngineMode::Idle => "idle",
        EngineMode::Paused => "paused",
        EngineMode::Playing => "playing",
        EngineMode::Finished => "finished",
    }
}

/// Full status line for one engine update.
pub fn render_frame(update: &EngineUpdate, wpm: u32, color: bool) -> String {
    let word = update
        .token
        .as_ref()
        .map(|t| render_word(t, color))
        .unwrap_or_default();
    let word_width = word_display_width(update.token.as_ref());
    let gap = " ".repeat((ANCHOR_COLUMN * 3).saturating_sub(word_width).max(2));
    let status = format!(
        "{} {}/{} {} wpm {}",
        progress_bar(update.index, update.total, BAR_WIDTH),
        update.index.saturating_add(1).min(update.total),
        update.total,
        wpm,
        mode_label(update.mode)
    );
    if color {
        format!("{word}{gap}{}", status.dimmed())
    } else {
        format!("{word}{gap}{status}")
    }
}

fn word_display_width(token: Option<&Token>) -> usize {
    token.map_or(0, |t| {
        anchor_padding(&t.left_segment)
            + t.left_segment.chars().count()
            + t.center_character.chars().count()
            + t.right_segment.chars().count()
            + t.punctuation.as_deref().map_or(0, |p| p.chars().count())
    })
}

/// Redraw the reader line in place on stderr.
pub fn draw(update: &EngineUpdate, wpm: u32, color: bool) {
    clear_line();
    eprint!("{}", render_frame(update, wpm, color));
    io::stderr().flush().ok();
}

/// One tab-separated row for `flow-rsvp tokens`.
pub fn format_token_row(token: &Token) -> String {
    let mut flags = String::new();
    if token.is_sentence_end {
        flags.push('S');
    }
    if token.is_paragraph_end {
        flags.push('P');
    }
    format!(
        "{}\t{}\t{}[{}]{}\t{:.2}\t{}",
        token.global_index,
        token.start_offset,
        token.left_segment,
        token.center_character,
        token.right_segment,
        token.duration_multiplier,
        if flags.is_empty() { "-" } else { flags.as_str() }
    )
}
