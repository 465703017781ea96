//! Awaitable outcome of a tokenization or prepare request.

use crate::error::{EngineError, Result};
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use tokio::sync::oneshot;

/// Settles once the request it was issued for completes, fails, or is
/// superseded by a newer one.
#[derive(Debug)]
pub struct Ticket<T = usize> {
    generation: u64,
    outcome: oneshot::Receiver<Result<T>>,
}

impl<T> Ticket<T> {
    pub(crate) fn new(generation: u64, outcome: oneshot::Receiver<Result<T>>) -> Self {
        Self {
            generation,
            outcome,
        }
    }

    /// A ticket that has already settled.
    pub(crate) fn settled(generation: u64, value: Result<T>) -> Self {
        let (tx, rx) = oneshot::channel();
        // The receiver is alive on the line below.
        tx.send(value).ok();
        Self::new(generation, rx)
    }

    /// Generation this ticket belongs to.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Takes the outcome if the request has settled.
    ///
    /// A settled outcome can be taken once; later calls report `Cancelled`.
    pub fn try_outcome(&mut self) -> Option<Result<T>> {
        match self.outcome.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(EngineError::Cancelled)),
        }
    }
}

impl<T: Send + 'static> IntoFuture for Ticket<T> {
    type Output = Result<T>;
    type IntoFuture = Pin<Box<dyn Future<Output = Result<T>> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move { self.outcome.await.unwrap_or(Err(EngineError::Cancelled)) })
    }
}
