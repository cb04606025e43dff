use std::sync::Arc;

use tokio::sync::watch;

/// A cooperative cancellation signal shared by the dispatcher and the workers.
///
/// Once triggered it stays triggered; every clone observes it.
#[derive(Clone, Debug)]
pub struct Cancellation {
    sender: Arc<watch::Sender<bool>>,
}

impl Cancellation {
    /// Creates a new, untriggered `Cancellation`.
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);

        Self {
            sender: Arc::new(sender),
        }
    }

    /// Triggers the cancellation.
    ///
    /// Returns `true` only for the call that triggered it first.
    pub fn cancel(&self) -> bool {
        !self.sender.send_replace(true)
    }

    /// Checks whether the cancellation has been triggered.
    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }

    /// Completes once the cancellation is triggered.
    pub async fn cancelled(&self) {
        let mut receiver = self.sender.subscribe();
        // The sender outlives `self`, so the channel can not close while waiting.
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for Cancellation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;

    #[test]
    fn only_first_cancel_call_reports_trigger() {
        let cancellation = Cancellation::new();

        assert!(!cancellation.is_cancelled());
        assert!(cancellation.cancel());
        assert!(!cancellation.cancel());
        assert!(cancellation.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_completes_immediately_when_already_triggered() {
        let cancellation = Cancellation::new();
        cancellation.cancel();

        timeout(Duration::from_millis(100), cancellation.cancelled())
            .await
            .expect("Cancelled future should complete");
    }

    #[tokio::test]
    async fn clones_observe_cancellation() {
        let cancellation = Cancellation::new();
        let observer = cancellation.clone();
        let handle = tokio::spawn(async move { observer.cancelled().await });

        cancellation.cancel();

        timeout(Duration::from_secs(1), handle)
            .await
            .expect("Observer should be notified")
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_stays_pending_until_triggered() {
        let cancellation = Cancellation::new();

        timeout(Duration::from_secs(60), cancellation.cancelled())
            .await
            .expect_err("Cancelled future should stay pending");
    }
}
