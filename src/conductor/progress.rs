//! Reading-position persistence seam.

use crate::defaults;
use crate::playback::{Clock, SystemClock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// External store for the reader's position.
///
/// `position` is a character offset into the source text when a token is
/// available, otherwise a raw token index.
pub trait ProgressStore: Send {
    /// Persist the position. `is_user_action` marks explicit seeks.
    fn save_progress(&mut self, position: usize, is_user_action: bool);

    /// The reader jumped to a fractional position (e.g. a chapter start).
    fn jump(&mut self, _progress: f64) {}
}

/// Discards every write.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgressStore;

impl ProgressStore for NullProgressStore {
    fn save_progress(&mut self, _position: usize, _is_user_action: bool) {}
}

impl<S: ProgressStore + ?Sized> ProgressStore for Box<S> {
    fn save_progress(&mut self, position: usize, is_user_action: bool) {
        (**self).save_progress(position, is_user_action);
    }

    fn jump(&mut self, progress: f64) {
        (**self).jump(progress);
    }
}

/// Zero-write guard settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// How long after a load an accidental zero is rejected.
    pub zero_guard_window_ms: u64,
    /// Prior position above which a zero looks accidental.
    pub zero_guard_min_prior: usize,
    /// Remember positions between runs of the CLI reader.
    pub resume: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            zero_guard_window_ms: defaults::ZERO_GUARD_WINDOW_MS,
            zero_guard_min_prior: defaults::ZERO_GUARD_MIN_PRIOR,
            resume: true,
        }
    }
}

/// Wraps a store and drops position-zero writes that look like a stale
/// default racing a fresh load.
///
/// A zero is suppressed when it is not a user action, it arrives within the
/// guard window after [`book_loaded`](Self::book_loaded), and the loaded
/// book had more than `zero_guard_min_prior` of progress.
pub struct GuardedProgressStore<S> {
    inner: S,
    config: PersistenceConfig,
    clock: Arc<dyn Clock>,
    loaded: Option<(Instant, usize)>,
}

impl<S: ProgressStore> GuardedProgressStore<S> {
    pub fn new(inner: S, config: PersistenceConfig) -> Self {
        Self {
            inner,
            config,
            clock: Arc::new(SystemClock),
            loaded: None,
        }
    }

    /// Sets a custom clock (for deterministic testing).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Records that a book with `prior_position` of saved progress was just
    /// loaded, opening the guard window.
    pub fn book_loaded(&mut self, prior_position: usize) {
        self.loaded = Some((self.clock.now(), prior_position));
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    fn suppresses(&self, position: usize, is_user_action: bool) -> bool {
        if position != 0 || is_user_action {
            return false;
        }
        let Some((loaded_at, prior)) = self.loaded else {
            return false;
        };
        let window = Duration::from_millis(self.config.zero_guard_window_ms);
        prior > self.config.zero_guard_min_prior
            && self.clock.now().saturating_duration_since(loaded_at) < window
    }
}

impl<S: ProgressStore> ProgressStore for GuardedProgressStore<S> {
    fn save_progress(&mut self, position: usize, is_user_action: bool) {
        if self.suppresses(position, is_user_action) {
            warn!("ignoring position 0 written right after loading saved progress");
            return;
        }
        debug!(position, is_user_action, "saving progress");
        self.inner.save_progress(position, is_user_action);
    }

    fn jump(&mut self, progress: f64) {
        self.inner.jump(progress);
    }
}
