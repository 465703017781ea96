//! Screen wake lock seam.

/// Keeps the display awake while playing where the platform supports it.
pub trait WakeLock: Send {
    /// Requests the lock. Returns false when the platform declined.
    fn acquire(&mut self) -> bool;

    fn release(&mut self);
}

/// Platform without a wake lock.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoWakeLock;

impl WakeLock for NoWakeLock {
    fn acquire(&mut self) -> bool {
        false
    }

    fn release(&mut self) {}
}
