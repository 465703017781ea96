//! The reading engine's control surface.
//!
//! A [`Conductor`] owns one reading session: the token sequence streamed in
//! from the [`TokenizerChannel`], the [`Heartbeat`] that walks it, and the
//! collaborators for persistence and power management. The host drives it by
//! calling [`Conductor::pump`] once per frame.
//!
//! ```text
//!   Idle ──prepare──▶ Paused ──play──▶ Playing ──end──▶ Finished
//!                       ▲                 │                │
//!                       └──────pause──────┘◀─────play──────┘
//! ```

pub mod progress;
pub mod wake_lock;

pub use progress::{GuardedProgressStore, NullProgressStore, PersistenceConfig, ProgressStore};
pub use wake_lock::{NoWakeLock, WakeLock};

use crate::config::Config;
use crate::error::{EngineError, Result};
use crate::playback::{
    Clock, Heartbeat, Observers, PlaybackConfig, Subscription, SystemClock, TickOutcome,
};
use crate::tokenizer::{Token, Tokenizer};
use crate::worker::{Delivery, Ticket, TokenizerChannel};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, info, trace, warn};

/// Settles once the text passed to [`Conductor::begin_prepare`] is fully
/// tokenized, or rejects when a newer prepare or a shutdown replaces it.
/// Its generation is the tokenizer channel generation of the request.
pub type Prepare = Ticket<()>;

/// Engine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineMode {
    Idle,
    Paused,
    Playing,
    Finished,
}

/// Snapshot sent to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineUpdate {
    pub index: usize,
    pub token: Option<Token>,
    pub is_playing: bool,
    pub mode: EngineMode,
    /// Tokens delivered so far.
    pub total: usize,
}

/// Where a freshly prepared text should start.
///
/// Resolved in priority order: token index, character offset, fractional
/// progress, then the beginning.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StartPosition {
    pub index: Option<usize>,
    /// Resolves to the first token whose `start_offset` is at least this.
    pub offset: Option<usize>,
    /// Fraction of the whole sequence, `0.0..=1.0`.
    pub progress: Option<f64>,
}

impl StartPosition {
    pub fn index(index: usize) -> Self {
        Self {
            index: Some(index),
            ..Self::default()
        }
    }

    pub fn offset(offset: usize) -> Self {
        Self {
            offset: Some(offset),
            ..Self::default()
        }
    }

    pub fn progress(progress: f64) -> Self {
        Self {
            progress: Some(progress),
            ..Self::default()
        }
    }

    /// Token index this directive points at, or `None` while the delivered
    /// prefix is too short to tell.
    pub fn resolve(&self, tokens: &[Token], complete: bool) -> Option<usize> {
        let last = tokens.len().saturating_sub(1);

        if let Some(index) = self.index {
            return (index < tokens.len() || complete).then(|| index.min(last));
        }

        if let Some(offset) = self.offset {
            let found = tokens.partition_point(|t| t.start_offset < offset);
            if found < tokens.len() {
                return Some(found);
            }
            return complete.then_some(last);
        }

        if let Some(progress) = self.progress {
            if !complete {
                return None;
            }
            let fraction = if progress.is_finite() {
                progress.clamp(0.0, 1.0)
            } else {
                0.0
            };
            let index = (fraction * tokens.len() as f64).floor() as usize;
            return Some(index.min(last));
        }

        Some(0)
    }
}

/// Per-call overrides for [`Conductor::prepare`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrepareOptions {
    pub wpm: Option<u32>,
    pub chunk_size: Option<usize>,
    pub start: StartPosition,
}

impl PrepareOptions {
    pub fn with_wpm(mut self, wpm: u32) -> Self {
        self.wpm = Some(wpm);
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }

    pub fn starting_at(mut self, start: StartPosition) -> Self {
        self.start = start;
        self
    }
}

struct Session {
    text: Arc<str>,
    tokens: Vec<Token>,
    /// Channel generation whose deliveries belong to this session.
    generation: u64,
    complete: bool,
    directive: Option<StartPosition>,
    pending: Option<oneshot::Sender<Result<()>>>,
}

impl Session {
    fn settle(&mut self, outcome: Result<()>) {
        if let Some(tx) = self.pending.take() {
            tx.send(outcome).ok();
        }
    }
}

/// Owns tokenization and playback for one reader.
pub struct Conductor {
    config: PlaybackConfig,
    channel: TokenizerChannel,
    heartbeat: Heartbeat,
    clock: Arc<dyn Clock>,
    store: Box<dyn ProgressStore>,
    wake_lock: Box<dyn WakeLock>,
    observers: Observers<EngineUpdate>,
    session: Option<Session>,
    mode: EngineMode,
    visible: bool,
    lock_held: bool,
    /// A coalesced update is owed to subscribers.
    dirty: bool,
    advanced_since_report: usize,
    last_report: Option<usize>,
}

impl Conductor {
    pub fn new(config: &Config) -> Self {
        let tokenizer = Tokenizer::new(config.tokenizer.clone());
        let channel = if config.playback.inline_tokenizer {
            TokenizerChannel::inline(tokenizer)
        } else {
            TokenizerChannel::spawn(tokenizer)
        };
        Self::with_channel(&config.playback, channel)
    }

    /// Builds a conductor around an existing channel.
    pub fn with_channel(config: &PlaybackConfig, channel: TokenizerChannel) -> Self {
        Self {
            config: config.clone(),
            channel,
            heartbeat: Heartbeat::new(config),
            clock: Arc::new(SystemClock),
            store: Box::new(NullProgressStore),
            wake_lock: Box::new(NoWakeLock),
            observers: Observers::new(),
            session: None,
            mode: EngineMode::Idle,
            visible: true,
            lock_held: false,
            dirty: false,
            advanced_since_report: 0,
            last_report: None,
        }
    }

    /// Sets a custom clock (for deterministic testing).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_progress_store(mut self, store: impl ProgressStore + 'static) -> Self {
        self.store = Box::new(store);
        self
    }

    pub fn with_wake_lock(mut self, wake_lock: impl WakeLock + 'static) -> Self {
        self.wake_lock = Box::new(wake_lock);
        self
    }

    /// Registers an observer for coalesced updates.
    pub fn subscribe(&self, callback: impl FnMut(&EngineUpdate) + Send + 'static) -> Subscription {
        self.observers.subscribe(callback)
    }

    // ------------------------------------------------------------------
    // Preparation
    // ------------------------------------------------------------------

    /// Tokenizes `text` and positions playback per `options.start`.
    ///
    /// Resolves once the whole text has been delivered. Tokens become
    /// playable as soon as the first chunk lands, which [`pump`](Self::pump)
    /// picks up while this future is pending elsewhere.
    pub async fn prepare(
        &mut self,
        text: impl Into<Arc<str>>,
        options: PrepareOptions,
    ) -> Result<()> {
        let prepare = self.begin_prepare(text, options);
        self.finish_prepare(prepare).await
    }

    /// Starts preparing `text` without waiting for it.
    ///
    /// Any earlier prepare still pending rejects with `Superseded`, and its
    /// late tokens are never observed.
    pub fn begin_prepare(&mut self, text: impl Into<Arc<str>>, options: PrepareOptions) -> Prepare {
        let text = text.into();

        if let Some(wpm) = options.wpm {
            self.heartbeat.set_wpm(wpm);
        }

        if let Some(session) = self.session.as_mut()
            && session.complete
            && *session.text == *text
        {
            debug!("text already prepared; reapplying start position");
            session.directive = Some(options.start);
            let generation = session.generation;
            self.resolve_directive();
            if self.mode == EngineMode::Finished {
                self.set_mode(EngineMode::Paused);
            }
            self.touch();
            return Ticket::settled(generation, Ok(()));
        }

        let chunk_size = options.chunk_size.unwrap_or(self.config.chunk_size);
        let ticket = self.channel.submit(text.clone(), chunk_size);
        self.abandon_session(ticket.generation());
        let (tx, rx) = oneshot::channel();
        self.session = Some(Session {
            text,
            tokens: Vec::new(),
            generation: ticket.generation(),
            complete: false,
            directive: Some(options.start),
            pending: Some(tx),
        });
        debug!(generation = ticket.generation(), "preparing text");
        Ticket::new(ticket.generation(), rx)
    }

    /// Drives deliveries until `prepare` settles.
    pub async fn finish_prepare(&mut self, mut prepare: Prepare) -> Result<()> {
        loop {
            if let Some(outcome) = prepare.try_outcome() {
                return outcome;
            }
            match self.channel.next().await {
                Some(delivery) => self.ingest(delivery),
                None => {
                    self.drain();
                    return prepare.try_outcome().unwrap_or(Err(EngineError::Cancelled));
                }
            }
        }
    }

    /// True once the current text is fully tokenized.
    pub fn is_fully_prepared(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.complete)
    }

    fn abandon_session(&mut self, superseded_by: u64) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        if !session.tokens.is_empty() {
            self.save_position(&session, false);
        }
        if let Some(tx) = session.pending.take() {
            debug!(
                generation = session.generation,
                superseded_by, "prepare superseded"
            );
            tx.send(Err(EngineError::Superseded {
                generation: session.generation,
            }))
            .ok();
        }
        self.heartbeat.reset();
        self.release_wake_lock();
        self.set_mode(EngineMode::Idle);
        self.dirty = false;
        self.advanced_since_report = 0;
        self.last_report = None;
    }

    fn drain(&mut self) {
        while let Some(delivery) = self.channel.try_next() {
            self.ingest(delivery);
        }
    }

    fn ingest(&mut self, delivery: Delivery) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if delivery.generation() != session.generation {
            trace!(generation = delivery.generation(), "ignoring stale delivery");
            return;
        }

        match delivery {
            Delivery::Chunk { tokens, .. } => {
                trace!(count = tokens.len(), "tokens delivered");
                session.tokens.extend(tokens);
                if self.mode == EngineMode::Idle {
                    self.set_mode(EngineMode::Paused);
                }
                self.resolve_directive();
                self.touch();
            }
            Delivery::Complete { total, .. } => {
                session.complete = true;
                info!(tokens = total, "text prepared");
                if self.mode == EngineMode::Idle {
                    self.set_mode(EngineMode::Paused);
                }
                self.resolve_directive();
                if let Some(session) = self.session.as_mut() {
                    session.settle(Ok(()));
                }
                self.touch();
            }
            Delivery::Failed {
                generation,
                message,
                delivered,
            } => {
                warn!(delivered, "tokenizer worker failed ({message}); continuing inline");
                if !self.channel.resume_inline(generation) {
                    session.settle(Err(EngineError::Tokenization { message }));
                }
            }
        }
    }

    fn resolve_directive(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let Some(directive) = session.directive else {
            return;
        };
        let Some(target) = directive.resolve(&session.tokens, session.complete) else {
            return;
        };
        session.directive = None;
        let index = self
            .heartbeat
            .seek(target, session.tokens.len(), self.clock.now());
        debug!(index, "start position resolved");
    }

    // ------------------------------------------------------------------
    // Playback control
    // ------------------------------------------------------------------

    /// Starts or resumes playback. No-op without playable tokens.
    pub fn play(&mut self) {
        self.drain();
        if matches!(self.mode, EngineMode::Idle | EngineMode::Playing) {
            return;
        }
        let Some(session) = self.session.as_ref() else {
            return;
        };
        if session.tokens.is_empty() || session.directive.is_some() {
            return;
        }

        let now = self.clock.now();
        if self.mode == EngineMode::Finished {
            self.heartbeat.seek(0, session.tokens.len(), now);
        }
        self.heartbeat.start(now);
        self.advanced_since_report = 0;
        self.set_mode(EngineMode::Playing);
        self.acquire_wake_lock();
        self.emit();
    }

    /// Pauses playback, stepping back one token unless
    /// `skip_context_rewind` is set or rewinding is disabled.
    pub fn pause(&mut self, skip_context_rewind: bool) {
        if self.mode != EngineMode::Playing {
            return;
        }
        self.heartbeat.stop();
        self.release_wake_lock();
        self.set_mode(EngineMode::Paused);

        let index = self.heartbeat.index();
        if self.config.context_rewind && !skip_context_rewind && index > 0 {
            let len = self.tokens().len();
            self.heartbeat.seek(index - 1, len, self.clock.now());
        }
        self.report_position(false);
        self.emit();
    }

    pub fn toggle_play(&mut self) {
        if self.mode == EngineMode::Playing {
            self.pause(false);
        } else {
            self.play();
        }
    }

    /// Jumps to `index`, clamped to the delivered tokens.
    pub fn seek(&mut self, index: i64) -> usize {
        self.drain();
        let len = self.tokens().len();
        if len == 0 {
            return self.heartbeat.index();
        }
        let target = usize::try_from(index.max(0)).unwrap_or(usize::MAX);
        let index = self.heartbeat.seek(target, len, self.clock.now());
        if let Some(session) = self.session.as_mut() {
            session.directive = None;
        }
        if self.mode == EngineMode::Finished {
            self.set_mode(EngineMode::Paused);
        }
        self.report_position(true);
        self.touch();
        index
    }

    pub fn seek_relative(&mut self, delta: i64) -> usize {
        let current = i64::try_from(self.heartbeat.index()).unwrap_or(i64::MAX);
        self.seek(current.saturating_add(delta))
    }

    /// Seeks to a fraction of the text and tells the store about the jump.
    pub fn jump_to_progress(&mut self, progress: f64) -> usize {
        self.drain();
        let len = self.tokens().len();
        let fraction = if progress.is_finite() {
            progress.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let target = (fraction * len as f64).floor() as i64;
        let index = self.seek(target);
        self.store.jump(fraction);
        index
    }

    /// Changes speed for future token durations. Returns the applied WPM.
    pub fn update_wpm(&mut self, wpm: u32) -> u32 {
        let applied = self.heartbeat.set_wpm(wpm);
        debug!(wpm = applied, "reading speed changed");
        applied
    }

    /// Host visibility changed (tab hidden, terminal suspended, ...).
    pub fn on_visibility_change(&mut self, visible: bool) {
        self.visible = visible;
        if !visible {
            self.release_wake_lock();
        } else if self.mode == EngineMode::Playing {
            self.acquire_wake_lock();
        }
    }

    /// Ends the session and returns to `Idle`.
    pub fn shutdown(&mut self, flush_position: bool) {
        if flush_position && !self.tokens().is_empty() {
            self.report_position(false);
        }
        self.heartbeat.reset();
        self.release_wake_lock();
        self.channel.cancel();
        if let Some(mut session) = self.session.take() {
            session.settle(Err(EngineError::Cancelled));
        }
        self.set_mode(EngineMode::Idle);
        self.advanced_since_report = 0;
        self.last_report = None;
        self.emit();
    }

    /// Frame callback: ingests tokens, advances playback, notifies.
    pub fn pump(&mut self) -> EngineMode {
        self.drain();

        if self.mode == EngineMode::Playing
            && let Some(session) = self.session.as_ref()
        {
            let outcome = self
                .heartbeat
                .tick(&session.tokens, session.complete, self.clock.now());
            match outcome {
                TickOutcome::Advanced { from, to } => {
                    self.dirty = true;
                    self.advanced_since_report += to - from;
                    if self.advanced_since_report >= self.config.progress_interval.max(1) {
                        self.advanced_since_report = 0;
                        self.report_position(false);
                    }
                }
                TickOutcome::Finished { from, at } => {
                    if at != from {
                        self.dirty = true;
                    }
                    info!(index = at, "reached end of text");
                    self.release_wake_lock();
                    self.set_mode(EngineMode::Finished);
                    self.report_position(false);
                    self.dirty = true;
                }
                TickOutcome::Stalled { at } => {
                    trace!(at, "waiting for more tokens");
                }
                TickOutcome::Idle | TickOutcome::Waiting => {}
            }
        }

        if self.dirty {
            self.emit();
        }
        self.mode
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn mode(&self) -> EngineMode {
        self.mode
    }

    pub fn is_playing(&self) -> bool {
        self.mode == EngineMode::Playing
    }

    pub fn current_index(&self) -> usize {
        self.heartbeat.index()
    }

    pub fn current_token(&self) -> Option<&Token> {
        self.tokens().get(self.heartbeat.index())
    }

    /// Tokens delivered so far.
    pub fn tokens(&self) -> &[Token] {
        self.session.as_ref().map_or(&[], |s| s.tokens.as_slice())
    }

    pub fn wpm(&self) -> u32 {
        self.heartbeat.wpm()
    }

    /// Current state as sent to subscribers.
    pub fn snapshot(&self) -> EngineUpdate {
        EngineUpdate {
            index: self.current_index(),
            token: self.current_token().cloned(),
            is_playing: self.is_playing(),
            mode: self.mode,
            total: self.tokens().len(),
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn set_mode(&mut self, mode: EngineMode) {
        if self.mode != mode {
            debug!(from = ?self.mode, to = ?mode, "mode change");
            self.mode = mode;
        }
    }

    /// Coalesce while playing, notify right away otherwise.
    fn touch(&mut self) {
        if self.mode == EngineMode::Playing {
            self.dirty = true;
        } else {
            self.emit();
        }
    }

    fn emit(&mut self) {
        self.dirty = false;
        let update = self.snapshot();
        self.observers.notify(&update);
    }

    fn acquire_wake_lock(&mut self) {
        if self.visible && !self.lock_held {
            self.lock_held = self.wake_lock.acquire();
            if !self.lock_held {
                debug!("wake lock unavailable");
            }
        }
    }

    fn release_wake_lock(&mut self) {
        if self.lock_held {
            self.wake_lock.release();
            self.lock_held = false;
        }
    }

    fn report_position(&mut self, is_user_action: bool) {
        let Some(session) = self.session.take() else {
            return;
        };
        self.save_position(&session, is_user_action);
        self.session = Some(session);
    }

    /// Reports the token's offset, or the raw index without a token.
    fn save_position(&mut self, session: &Session, is_user_action: bool) {
        let index = self.heartbeat.index();
        let position = session
            .tokens
            .get(index)
            .map_or(index, |token| token.start_offset);
        if !is_user_action && self.last_report == Some(position) {
            return;
        }
        self.last_report = Some(position);
        self.store.save_progress(position, is_user_action);
    }
}
