//! Progress events published by the runner and the cancellation signal it observes.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

use super::aggregator::TestStatus;
use super::catalog::Category;

/// Progress notification emitted by a running benchmark
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    RunStarted {
        run_id: Uuid,
        total: usize,
    },
    TestStarted {
        test_id: u32,
        category: Category,
        name: String,
    },
    TestFinished {
        test_id: u32,
        category: Category,
        status: TestStatus,
        latency_seconds: f64,
        excerpt: String,
    },
    /// The in-flight request was cut short by cancellation and not recorded
    TestAborted {
        test_id: u32,
    },
    RunFinished {
        completed: usize,
        total: usize,
        cancelled: bool,
    },
}

/// Shared, idempotent cancellation flag.
///
/// Clones observe the same flag. Waiters blocked in [`CancelToken::cancelled`]
/// wake as soon as any clone calls [`CancelToken::cancel`].
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Raise the flag. Calling this more than once has no further effect.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once the flag is raised (immediately if it already is).
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so this only errors if it is dropped mid-wait.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_cancel_is_idempotent() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());

        token.cancel();
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_clones_share_flag() {
        let token = CancelToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_resolves_after_cancel() {
        let token = CancelToken::new();
        let waiter = token.clone();

        let handle = tokio::spawn(async move { waiter.cancelled().await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!handle.is_finished());

        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("waiter should wake")
            .unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_resolves_immediately_when_already_set() {
        let token = CancelToken::new();
        token.cancel();
        tokio::time::timeout(Duration::from_millis(100), token.cancelled())
            .await
            .expect("already-cancelled token should resolve immediately");
    }

    #[test]
    fn test_event_serialization() {
        let event = ProgressEvent::TestFinished {
            test_id: 3,
            category: Category::Logic,
            status: TestStatus::Success,
            latency_seconds: 1.25,
            excerpt: "a spiral".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "test_finished");
        assert_eq!(json["test_id"], 3);
        assert_eq!(json["status"], "Success");
    }
}
