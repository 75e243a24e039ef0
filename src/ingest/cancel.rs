use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Why an in-flight refresh was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// [`CancelHandle::cancel`] was called.
    Cancelled,
    /// The overall deadline passed.
    DeadlineExceeded,
}

/// Cancellation signal shared by every task of a batch refresh, with an
/// optional overall deadline. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Cancellation {
    rx: watch::Receiver<bool>,
    deadline: Option<Instant>,
}

/// Triggers the paired [`Cancellation`].
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl Cancellation {
    pub fn new() -> (CancelHandle, Cancellation) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle { tx }, Cancellation { rx, deadline: None })
    }

    /// A signal that is never cancelled and has no deadline.
    pub fn never() -> Cancellation {
        Self::new().1
    }

    /// Adds a deadline `timeout` from now. An earlier existing deadline wins.
    pub fn with_timeout(self, timeout: Duration) -> Cancellation {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Cancellation {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    pub fn reason(&self) -> Option<CancelReason> {
        if *self.rx.borrow() {
            Some(CancelReason::Cancelled)
        } else if self.deadline.is_some_and(|d| Instant::now() >= d) {
            Some(CancelReason::DeadlineExceeded)
        } else {
            None
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.reason().is_some()
    }

    /// Resolves once cancelled or past the deadline. Resolves immediately if
    /// that already happened.
    pub async fn cancelled(&self) -> CancelReason {
        let mut rx = self.rx.clone();
        let signal = async move {
            // Handle dropped without cancelling: the signal can never fire.
            let closed = rx.wait_for(|cancelled| *cancelled).await.is_err();
            if closed {
                std::future::pending::<()>().await;
            }
        };

        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                _ = signal => CancelReason::Cancelled,
                _ = tokio::time::sleep_until(deadline) => CancelReason::DeadlineExceeded,
            },
            None => {
                signal.await;
                CancelReason::Cancelled
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cancel_wakes_waiters() {
        let (handle, cancel) = Cancellation::new();
        let waiter = {
            let cancel = cancel.clone();
            tokio::spawn(async move { cancel.cancelled().await })
        };

        assert!(!cancel.is_cancelled());
        handle.cancel();
        assert_eq!(waiter.await.unwrap(), CancelReason::Cancelled);
        assert_eq!(cancel.reason(), Some(CancelReason::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_fires() {
        let cancel = Cancellation::never().with_timeout(Duration::from_secs(30));
        assert!(!cancel.is_cancelled());

        assert_eq!(cancel.cancelled().await, CancelReason::DeadlineExceeded);
        assert_eq!(cancel.reason(), Some(CancelReason::DeadlineExceeded));
    }

    #[tokio::test(start_paused = true)]
    async fn test_earlier_deadline_wins() {
        let cancel = Cancellation::never()
            .with_timeout(Duration::from_secs(5))
            .with_timeout(Duration::from_secs(60));

        let start = Instant::now();
        cancel.cancelled().await;
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(5) && elapsed < Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_does_not_fire() {
        let cancel = Cancellation::never();
        let fired = tokio::time::timeout(Duration::from_secs(3600), cancel.cancelled()).await;
        assert!(fired.is_err());
    }
}
