//! Real-time playback: the frame-driven heartbeat and its time source.

pub mod clock;
pub mod heartbeat;
pub mod notifier;

pub use clock::{Clock, ManualClock, SystemClock};
pub use heartbeat::{Heartbeat, TickOutcome};
pub use notifier::{Observers, Subscription};

use crate::defaults;
use serde::{Deserialize, Serialize};

/// Reading speed, pacing and session behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Words per minute.
    pub wpm: u32,
    /// Tokens per tokenizer batch.
    pub chunk_size: usize,
    /// Step back one token when pausing so the reader regains context.
    pub context_rewind: bool,
    /// Report the position every this many tokens while playing.
    pub progress_interval: usize,
    /// Tokenize on the calling thread instead of the worker.
    pub inline_tokenizer: bool,
    /// Slow-start multipliers for the first tokens after a cold start.
    pub ramp: Vec<f64>,
    /// Cap on the wall-clock time a single frame contributes.
    pub max_frame_delta_ms: u64,
    /// Sentence-end boost gained per 100 WPM.
    pub sentence_boost_per_100_wpm: f64,
    pub max_sentence_boost: f64,
    /// Fixed boost for tokens ending a clause.
    pub clause_boost: f64,
    pub min_wpm: u32,
    pub max_wpm: u32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            wpm: defaults::WPM,
            chunk_size: defaults::CHUNK_SIZE,
            context_rewind: true,
            progress_interval: defaults::PROGRESS_REPORT_INTERVAL,
            inline_tokenizer: false,
            ramp: defaults::RAMP.to_vec(),
            max_frame_delta_ms: defaults::MAX_FRAME_DELTA_MS,
            sentence_boost_per_100_wpm: 0.05,
            max_sentence_boost: 1.6,
            clause_boost: 1.1,
            min_wpm: defaults::MIN_WPM,
            max_wpm: defaults::MAX_WPM,
        }
    }
}

impl PlaybackConfig {
    /// Clamps a requested speed to the configured range.
    pub fn clamp_wpm(&self, wpm: u32) -> u32 {
        wpm.clamp(self.min_wpm, self.max_wpm.max(self.min_wpm))
    }
}
