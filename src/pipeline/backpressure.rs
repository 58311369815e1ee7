//! Backpressure for the prefetch buffer
//!
//! Bounds the number of batches produced but not yet delivered to the
//! consumer, so a stalled training loop cannot pile up decoded batches.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;

/// Permit-based bound on undelivered batches
///
/// The producer acquires one slot per batch before sending; the consumer
/// releases it on receipt.
#[derive(Clone, Debug)]
pub struct BackpressureController {
    semaphore: Arc<Semaphore>,
    pending: Arc<AtomicUsize>,
    consumed: Arc<AtomicU64>,
}

impl BackpressureController {
    /// Create a controller allowing `max_pending` undelivered batches
    pub fn new(max_pending: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_pending.max(1))),
            pending: Arc::new(AtomicUsize::new(0)),
            consumed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Acquire a slot for one batch, waiting while the buffer is full
    pub async fn acquire(&self) {
        let permit = self
            .semaphore
            .acquire()
            .await
            .expect("backpressure semaphore closed");
        permit.forget();
        self.pending.fetch_add(1, Ordering::Relaxed);
    }

    /// Try to acquire a slot without waiting
    pub fn try_acquire(&self) -> bool {
        match self.semaphore.try_acquire() {
            Ok(permit) => {
                permit.forget();
                self.pending.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(_) => false,
        }
    }

    /// Release one slot after the consumer takes a batch
    pub fn record_consumption(&self) {
        self.consumed.fetch_add(1, Ordering::Relaxed);
        self.pending.fetch_sub(1, Ordering::Relaxed);
        self.semaphore.add_permits(1);
    }

    /// Batches currently produced but not delivered
    pub fn pending_count(&self) -> usize {
        self.pending.load(Ordering::Relaxed)
    }

    /// Batches delivered so far
    pub fn consumed_count(&self) -> u64 {
        self.consumed.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_acquire_release_cycle() {
        let controller = BackpressureController::new(2);

        controller.acquire().await;
        controller.acquire().await;
        assert_eq!(controller.pending_count(), 2);

        // Buffer full
        assert!(!controller.try_acquire());

        controller.record_consumption();
        assert_eq!(controller.pending_count(), 1);
        assert_eq!(controller.consumed_count(), 1);

        // Slot freed
        assert!(controller.try_acquire());
        assert_eq!(controller.pending_count(), 2);
    }

    #[tokio::test]
    async fn test_clone_shares_slots() {
        let a = BackpressureController::new(1);
        let b = a.clone();
        a.acquire().await;
        assert!(!b.try_acquire());
        b.record_consumption();
        assert!(a.try_acquire());
    }
}
