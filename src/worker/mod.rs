//! Background tokenization channel.
//!
//! Hosts the tokenizer on a dedicated thread and streams its output back as
//! ordered chunks tagged with a generation id. Requests travel over a
//! bounded crossbeam channel; deliveries come back over an unbounded tokio
//! channel so the consumer can poll them from a frame loop or await them.
//!
//! Only the newest request is authoritative. Superseded requests are dropped
//! by the worker between batches and filtered again at delivery time, so a
//! late chunk from an older generation is never observed.

pub mod protocol;
pub mod ticket;

pub use protocol::{Delivery, TokenizeRequest};
pub use ticket::Ticket;

use crate::defaults;
use crate::error::{EngineError, Result};
use crate::tokenizer::Tokenizer;
use crossbeam_channel::{Receiver, Sender, bounded};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// Where tokenization currently runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMode {
    Worker,
    Inline,
}

/// The request currently considered authoritative.
struct InFlight {
    generation: u64,
    text: Arc<str>,
    chunk_size: usize,
    delivered: usize,
    failed: bool,
    outcome: Option<oneshot::Sender<Result<usize>>>,
}

impl InFlight {
    fn settle(&mut self, outcome: Result<usize>) {
        if let Some(tx) = self.outcome.take() {
            // The ticket may have been dropped; nobody is waiting then.
            tx.send(outcome).ok();
        }
    }
}

/// Why a streaming run stopped early.
enum StreamStop {
    Superseded,
    Disconnected,
}

/// Tokenizes `request.text` in batches, handing each to `deliver`.
///
/// Stops between batches once `is_current` reports the request stale.
/// `delivered` is kept current so a panic can report how far it got.
fn stream_request(
    tokenizer: &Tokenizer,
    request: &TokenizeRequest,
    delivered: &mut usize,
    is_current: impl Fn() -> bool,
    mut deliver: impl FnMut(Delivery) -> bool,
) -> std::result::Result<(), StreamStop> {
    let mut job = tokenizer.job(&request.text);
    let chunk_size = request.chunk_size.max(1);

    while !job.is_done() {
        if !is_current() {
            return Err(StreamStop::Superseded);
        }
        let mut batch = job.next_batch(chunk_size);
        batch.retain(|t| t.global_index >= request.skip);
        if batch.is_empty() {
            continue;
        }
        let count = batch.len();
        if !deliver(Delivery::Chunk {
            generation: request.generation,
            tokens: batch,
        }) {
            return Err(StreamStop::Disconnected);
        }
        *delivered += count;
    }

    let total = job.produced();
    if !deliver(Delivery::Complete {
        generation: request.generation,
        total,
    }) {
        return Err(StreamStop::Disconnected);
    }
    Ok(())
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Worker thread main loop.
fn run_worker(
    tokenizer: Tokenizer,
    requests: Receiver<TokenizeRequest>,
    deliveries: mpsc::UnboundedSender<Delivery>,
    latest: Arc<AtomicU64>,
) {
    while let Ok(mut request) = requests.recv() {
        // Only the newest queued request matters.
        while let Ok(newer) = requests.try_recv() {
            request = newer;
        }
        if request.generation != latest.load(Ordering::SeqCst) {
            debug!(generation = request.generation, "skipping superseded request");
            continue;
        }

        let mut delivered = request.skip;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            stream_request(
                &tokenizer,
                &request,
                &mut delivered,
                || latest.load(Ordering::SeqCst) == request.generation,
                |delivery| deliveries.send(delivery).is_ok(),
            )
        }));

        match outcome {
            Ok(Ok(())) => {
                debug!(generation = request.generation, "tokenization delivered");
            }
            Ok(Err(StreamStop::Superseded)) => {
                debug!(generation = request.generation, "tokenization abandoned");
            }
            Ok(Err(StreamStop::Disconnected)) => break,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                if deliveries
                    .send(Delivery::Failed {
                        generation: request.generation,
                        message,
                        delivered,
                    })
                    .is_err()
                {
                    break;
                }
            }
        }
    }
    debug!("tokenizer worker exiting");
}

/// Message-passing front-end to the tokenizer.
pub struct TokenizerChannel {
    tokenizer: Tokenizer,
    requests: Option<Sender<TokenizeRequest>>,
    worker: Option<JoinHandle<()>>,
    delivery_tx: mpsc::UnboundedSender<Delivery>,
    delivery_rx: mpsc::UnboundedReceiver<Delivery>,
    latest: Arc<AtomicU64>,
    in_flight: Option<InFlight>,
}

impl TokenizerChannel {
    /// Spawns the worker thread, falling back to inline tokenization when
    /// the platform refuses a new thread.
    pub fn spawn(tokenizer: Tokenizer) -> Self {
        match Self::try_spawn(tokenizer.clone()) {
            Ok(channel) => channel,
            Err(e) => {
                warn!("{e}; tokenizing inline");
                Self::inline(tokenizer)
            }
        }
    }

    /// Spawns the worker thread.
    pub fn try_spawn(tokenizer: Tokenizer) -> Result<Self> {
        let mut channel = Self::inline(tokenizer.clone());
        let (request_tx, request_rx) = bounded(8);
        let deliveries = channel.delivery_tx.clone();
        let latest = channel.latest.clone();

        let handle = thread::Builder::new()
            .name(defaults::WORKER_THREAD_NAME.to_string())
            .spawn(move || run_worker(tokenizer, request_rx, deliveries, latest))
            .map_err(|e| EngineError::WorkerUnavailable {
                message: e.to_string(),
            })?;

        channel.requests = Some(request_tx);
        channel.worker = Some(handle);
        Ok(channel)
    }

    /// A channel that tokenizes on the caller's thread.
    pub fn inline(tokenizer: Tokenizer) -> Self {
        let (delivery_tx, delivery_rx) = mpsc::unbounded_channel();
        Self {
            tokenizer,
            requests: None,
            worker: None,
            delivery_tx,
            delivery_rx,
            latest: Arc::new(AtomicU64::new(0)),
            in_flight: None,
        }
    }

    pub fn mode(&self) -> ChannelMode {
        if self.requests.is_some() {
            ChannelMode::Worker
        } else {
            ChannelMode::Inline
        }
    }

    /// Generation of the authoritative request, if one is in flight.
    pub fn current_generation(&self) -> Option<u64> {
        self.in_flight.as_ref().map(|f| f.generation)
    }

    /// Submits a new request, superseding any request still in flight.
    ///
    /// The returned ticket resolves with the token count once every chunk of
    /// this request has been handed out by [`try_next`](Self::try_next) or
    /// [`next`](Self::next).
    pub fn submit(&mut self, text: Arc<str>, chunk_size: usize) -> Ticket<usize> {
        let generation = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(mut previous) = self.in_flight.take() {
            debug!(
                previous = previous.generation,
                generation, "superseding tokenization"
            );
            previous.settle(Err(EngineError::Superseded {
                generation: previous.generation,
            }));
        }

        let (tx, rx) = oneshot::channel();
        self.in_flight = Some(InFlight {
            generation,
            text: text.clone(),
            chunk_size: chunk_size.max(1),
            delivered: 0,
            failed: false,
            outcome: Some(tx),
        });

        self.dispatch(TokenizeRequest {
            generation,
            text,
            chunk_size: chunk_size.max(1),
            skip: 0,
        });
        Ticket::new(generation, rx)
    }

    /// Drops the in-flight request; its ticket rejects with `Cancelled`.
    pub fn cancel(&mut self) {
        // Bumping the generation makes the worker abandon the job.
        self.latest.fetch_add(1, Ordering::SeqCst);
        if let Some(mut flight) = self.in_flight.take() {
            debug!(generation = flight.generation, "tokenization cancelled");
            flight.settle(Err(EngineError::Cancelled));
        }
    }

    /// Re-runs a failed request inline, continuing after the tokens that
    /// already arrived. Returns false when `generation` is not the failed
    /// authoritative request.
    pub fn resume_inline(&mut self, generation: u64) -> bool {
        let Some(flight) = self.in_flight.as_mut() else {
            return false;
        };
        if flight.generation != generation || !flight.failed {
            return false;
        }
        flight.failed = false;
        let request = TokenizeRequest {
            generation,
            text: flight.text.clone(),
            chunk_size: flight.chunk_size,
            skip: flight.delivered,
        };
        self.run_inline(&request);
        true
    }

    /// Next delivery for the authoritative request, without blocking.
    pub fn try_next(&mut self) -> Option<Delivery> {
        while let Ok(delivery) = self.delivery_rx.try_recv() {
            if let Some(accepted) = self.accept(delivery) {
                return Some(accepted);
            }
        }
        None
    }

    /// Waits for the next delivery of the authoritative request.
    ///
    /// Returns `None` when nothing is in flight (or the request failed and
    /// awaits [`resume_inline`](Self::resume_inline)).
    pub async fn next(&mut self) -> Option<Delivery> {
        loop {
            if let Some(delivery) = self.try_next() {
                return Some(delivery);
            }
            match &self.in_flight {
                Some(flight) if !flight.failed => {}
                _ => return None,
            }
            let delivery = self.delivery_rx.recv().await?;
            if let Some(accepted) = self.accept(delivery) {
                return Some(accepted);
            }
        }
    }

    fn dispatch(&mut self, request: TokenizeRequest) {
        if let Some(requests) = &self.requests {
            match requests.send(request) {
                Ok(()) => return,
                Err(crossbeam_channel::SendError(request)) => {
                    warn!("tokenizer worker is gone; tokenizing inline");
                    self.requests = None;
                    self.run_inline(&request);
                }
            }
        } else {
            self.run_inline(&request);
        }
    }

    fn run_inline(&mut self, request: &TokenizeRequest) {
        let mut delivered = request.skip;
        let tx = self.delivery_tx.clone();
        // Inline runs are never superseded mid-way: the caller's thread is busy.
        // The receiver lives in `self`, so the run cannot disconnect either.
        stream_request(
            &self.tokenizer,
            request,
            &mut delivered,
            || true,
            |delivery| tx.send(delivery).is_ok(),
        )
        .ok();
    }

    /// Replaces everything queued after the first chunk with a worker
    /// failure report, as if the tokenizer thread had panicked there.
    #[cfg(test)]
    pub(crate) fn fail_after_first_chunk(&mut self, message: &str) {
        let mut queued = Vec::new();
        while let Ok(delivery) = self.delivery_rx.try_recv() {
            queued.push(delivery);
        }
        if let Some(Delivery::Chunk { generation, tokens }) = queued.into_iter().next() {
            let delivered = tokens.len();
            self.delivery_tx
                .send(Delivery::Chunk { generation, tokens })
                .ok();
            self.delivery_tx
                .send(Delivery::Failed {
                    generation,
                    message: message.to_string(),
                    delivered,
                })
                .ok();
        }
    }

    /// Filters stale deliveries and settles tickets.
    fn accept(&mut self, delivery: Delivery) -> Option<Delivery> {
        let Some(flight) = self.in_flight.as_mut() else {
            debug!(
                generation = delivery.generation(),
                "dropping delivery with nothing in flight"
            );
            return None;
        };
        if delivery.generation() != flight.generation {
            debug!(
                generation = delivery.generation(),
                current = flight.generation,
                "dropping stale delivery"
            );
            return None;
        }

        match &delivery {
            Delivery::Chunk { tokens, .. } => {
                flight.delivered += tokens.len();
            }
            Delivery::Complete { total, .. } => {
                let total = *total;
                flight.settle(Ok(total));
                self.in_flight = None;
            }
            Delivery::Failed { message, .. } => {
                warn!(generation = flight.generation, "tokenizer failed: {message}");
                flight.failed = true;
                flight.settle(Err(EngineError::Tokenization {
                    message: message.clone(),
                }));
            }
        }
        Some(delivery)
    }
}

impl Drop for TokenizerChannel {
    fn drop(&mut self) {
        self.latest.fetch_add(1, Ordering::SeqCst);
        // Closing the request channel ends the worker loop.
        self.requests = None;
        if let Some(handle) = self.worker.take()
            && handle.join().is_err()
        {
            warn!("tokenizer worker panicked during shutdown");
        }
    }
}
