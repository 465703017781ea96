//! Default configuration constants for flow-rsvp.
//!
//! This module provides shared constants used across the tokenizer, the
//! playback heartbeat and the conductor so every config type agrees on them.

/// Default reading speed in words per minute.
pub const WPM: u32 = 300;

/// Slowest accepted reading speed.
pub const MIN_WPM: u32 = 50;

/// Fastest accepted reading speed.
pub const MAX_WPM: u32 = 1500;

/// Number of tokens produced per tokenizer batch before yielding.
///
/// Each batch is delivered to the conductor as one ordered chunk, so a very
/// long text never holds the worker (or the inline fallback) for more than
/// one batch's worth of work between cancellation checks.
pub const CHUNK_SIZE: usize = 10_000;

/// Slow-start multipliers for the first tokens after a cold start.
pub const RAMP: [f64; 3] = [2.0, 1.5, 1.2];

/// Largest wall-clock delta a single frame may contribute, in milliseconds.
///
/// Absorbs stalls such as a suspended terminal or a backgrounded window
/// so playback never bursts through several words after resuming.
pub const MAX_FRAME_DELTA_MS: u64 = 100;

/// Emit a position report every this many advanced tokens during playback.
pub const PROGRESS_REPORT_INTERVAL: usize = 100;

/// Time after a book load during which an accidental zero position is rejected.
pub const ZERO_GUARD_WINDOW_MS: u64 = 5_000;

/// Prior progress above which a zero position counts as suspicious.
pub const ZERO_GUARD_MIN_PRIOR: usize = 10;

/// Frame period used by the terminal reader (roughly 60 Hz).
pub const FRAME_INTERVAL_MS: u64 = 16;

/// Name of the dedicated tokenizer thread.
pub const WORKER_THREAD_NAME: &str = "flow-rsvp-tokenizer";
