//! Cooperative cancellation shared between a caller and the contexts it uses.

use std::sync::Arc;

use tokio::sync::watch;

/// A cloneable, one-way cancellation flag.
///
/// Every clone observes the same flag. Once cancelled it stays cancelled.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    flag: Arc<watch::Sender<bool>>,
}

impl CancelSignal {
    /// Creates a signal that has not been cancelled.
    pub fn new() -> Self {
        let (flag, _) = watch::channel(false);
        Self {
            flag: Arc::new(flag),
        }
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        if !self.flag.send_replace(true) {
            tracing::debug!("cancellation requested");
        }
    }

    /// Returns `true` once [`cancel`](Self::cancel) has been called on any clone.
    pub fn is_cancelled(&self) -> bool {
        *self.flag.borrow()
    }

    /// Resolves when the signal is cancelled. Never resolves otherwise.
    pub async fn cancelled(&self) {
        let mut rx = self.flag.subscribe();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            // The sender lives as long as `self`, so this is unreachable in
            // practice; stay pending rather than report a false cancellation.
            std::future::pending::<()>().await;
        }
    }

    /// Returns a guard that cancels this signal when dropped.
    ///
    /// Transports hold the guard inside their request future so that a
    /// dropped request (client disconnect, timeout) cancels in-flight work.
    pub fn drop_guard(&self) -> CancelGuard {
        CancelGuard {
            signal: Some(self.clone()),
        }
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Cancels its signal on drop unless [`disarm`](Self::disarm)ed.
#[derive(Debug)]
pub struct CancelGuard {
    signal: Option<CancelSignal>,
}

impl CancelGuard {
    /// Consumes the guard without cancelling.
    pub fn disarm(mut self) {
        self.signal = None;
    }
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        if let Some(signal) = self.signal.take() {
            signal.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn clones_share_the_flag() {
        let signal = CancelSignal::new();
        let clone = signal.clone();
        assert!(!clone.is_cancelled());
        signal.cancel();
        assert!(clone.is_cancelled());
        signal.cancel();
        assert!(clone.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_resolves_after_cancel() {
        let signal = CancelSignal::new();
        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.cancelled().await })
        };
        signal.cancel();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("cancelled() should resolve")
            .expect("waiter task should not panic");
    }

    #[tokio::test]
    async fn cancelled_stays_pending_without_cancel() {
        let signal = CancelSignal::new();
        let res = tokio::time::timeout(Duration::from_millis(20), signal.cancelled()).await;
        assert!(res.is_err());
    }

    #[test]
    fn guard_cancels_on_drop_unless_disarmed() {
        let signal = CancelSignal::new();
        signal.drop_guard().disarm();
        assert!(!signal.is_cancelled());

        drop(signal.drop_guard());
        assert!(signal.is_cancelled());
    }
}
