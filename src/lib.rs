//! flow-rsvp - RSVP speed-reading engine
//!
//! Splits text into display tokens with per-word pacing, streams them from a
//! background tokenizer, and plays them back one word at a time.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod conductor;
pub mod config;
pub mod defaults;
pub mod error;
pub mod playback;
pub mod store;
pub mod tokenizer;
pub mod worker;

// Terminal front-end
#[cfg(feature = "cli")]
pub mod app;
#[cfg(feature = "cli")]
pub mod cli;
#[cfg(feature = "cli")]
pub mod output;

// Engine
pub use conductor::{
    Conductor, EngineMode, EngineUpdate, GuardedProgressStore, NoWakeLock, NullProgressStore,
    PersistenceConfig, Prepare, PrepareOptions, ProgressStore, StartPosition, WakeLock,
};
pub use playback::{
    Clock, Heartbeat, ManualClock, PlaybackConfig, Subscription, SystemClock, TickOutcome,
};
pub use tokenizer::{Token, Tokenizer, TokenizerConfig, tokenize};
pub use worker::{ChannelMode, Delivery, Ticket, TokenizerChannel};

// Error handling
pub use error::{EngineError, Result};

// Config
pub use config::Config;
pub use store::FileProgressStore;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
