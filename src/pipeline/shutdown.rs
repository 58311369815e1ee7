//! Graceful shutdown signaling
//!
//! Broadcast-based stop signal for the upstream stages (feeder, readers);
//! downstream stages drain out through channel closure.

use tokio::sync::broadcast;

/// Shutdown signal broadcaster
///
/// Clone freely; every listener sees the trigger.
#[derive(Clone, Debug)]
pub struct ShutdownSignal {
    sender: broadcast::Sender<()>,
}

impl ShutdownSignal {
    /// Create a new, untriggered signal
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self { sender }
    }

    /// Trigger shutdown for all listeners
    pub fn trigger(&self) {
        let _ = self.sender.send(());
    }

    /// Create a listener for this signal
    pub fn listen(&self) -> ShutdownListener {
        ShutdownListener {
            receiver: self.sender.subscribe(),
        }
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// One stage's view of the shutdown signal
pub struct ShutdownListener {
    receiver: broadcast::Receiver<()>,
}

impl ShutdownListener {
    /// Resolve once shutdown is triggered
    ///
    /// A dropped signal counts as triggered; a stage with no owner left
    /// has nothing to run for.
    pub async fn triggered(&mut self) {
        let _ = self.receiver.recv().await;
    }

    /// Non-blocking check
    pub fn is_triggered(&mut self) -> bool {
        use broadcast::error::TryRecvError;
        match self.receiver.try_recv() {
            Ok(()) => true,
            Err(TryRecvError::Empty) => false,
            Err(TryRecvError::Closed) | Err(TryRecvError::Lagged(_)) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_trigger_reaches_listener() {
        let signal = ShutdownSignal::new();
        let mut listener = signal.listen();
        assert!(!listener.is_triggered());
        signal.trigger();
        listener.triggered().await;
    }

    #[tokio::test]
    async fn test_dropped_signal_counts_as_triggered() {
        let signal = ShutdownSignal::new();
        let mut listener = signal.listen();
        drop(signal);
        assert!(listener.is_triggered());
    }

    #[tokio::test]
    async fn test_clone_shares_trigger() {
        let signal = ShutdownSignal::new();
        let clone = signal.clone();
        let mut listener = signal.listen();
        clone.trigger();
        listener.triggered().await;
    }
}
