//! Per-operation deadlines and cancellation.
//!
//! Every reconciler operation runs inside an [`OperationContext`]. Exceeding
//! the deadline or firing the [`Canceller`] aborts the in-flight remote wait;
//! whatever the remote did in the meantime is only learned by a later read.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::warn;

use crate::error::{Error, Result};

/// Default deadlines per operation kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeouts {
    #[serde(default = "default_create_secs")]
    pub create_secs: u64,

    #[serde(default = "default_read_secs")]
    pub read_secs: u64,

    #[serde(default = "default_update_secs")]
    pub update_secs: u64,

    #[serde(default = "default_delete_secs")]
    pub delete_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            create_secs: default_create_secs(),
            read_secs: default_read_secs(),
            update_secs: default_update_secs(),
            delete_secs: default_delete_secs(),
        }
    }
}

impl Timeouts {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns error if any deadline is zero.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("timeouts.create_secs", self.create_secs),
            ("timeouts.read_secs", self.read_secs),
            ("timeouts.update_secs", self.update_secs),
            ("timeouts.delete_secs", self.delete_secs),
        ];
        match fields.iter().find(|(_, secs)| *secs == 0) {
            Some((field, _)) => Err(Error::invalid_config(*field, "must be greater than 0")),
            None => Ok(()),
        }
    }

    #[must_use]
    pub const fn create(&self) -> Duration {
        Duration::from_secs(self.create_secs)
    }

    #[must_use]
    pub const fn read(&self) -> Duration {
        Duration::from_secs(self.read_secs)
    }

    #[must_use]
    pub const fn update(&self) -> Duration {
        Duration::from_secs(self.update_secs)
    }

    #[must_use]
    pub const fn delete(&self) -> Duration {
        Duration::from_secs(self.delete_secs)
    }
}

const fn default_create_secs() -> u64 {
    30 * 60
}

const fn default_read_secs() -> u64 {
    5 * 60
}

const fn default_update_secs() -> u64 {
    30 * 60
}

const fn default_delete_secs() -> u64 {
    30 * 60
}

/// Fires cancellation for every context created from it.
#[derive(Debug)]
pub struct Canceller {
    tx: watch::Sender<bool>,
}

impl Canceller {
    /// Create a canceller that has not fired.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// Cancel all contexts created from this canceller.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Whether [`Canceller::cancel`] has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// A context with the given deadline tied to this canceller.
    #[must_use]
    pub fn context(&self, deadline: Duration) -> OperationContext {
        OperationContext {
            deadline,
            cancelled: Some(self.tx.subscribe()),
        }
    }
}

impl Default for Canceller {
    fn default() -> Self {
        Self::new()
    }
}

/// Deadline and cancellation for one operation.
#[derive(Debug, Clone)]
pub struct OperationContext {
    deadline: Duration,
    cancelled: Option<watch::Receiver<bool>>,
}

impl OperationContext {
    /// A context that can only time out.
    #[must_use]
    pub const fn with_deadline(deadline: Duration) -> Self {
        Self {
            deadline,
            cancelled: None,
        }
    }

    /// Run `operation` to completion unless the deadline passes or the
    /// context is cancelled first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] or [`Error::Cancelled`], or whatever
    /// `operation` itself returns.
    pub async fn run<T, F>(&self, name: &'static str, operation: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let cancelled = wait_for_cancel(self.cancelled.clone());

        tokio::select! {
            outcome = tokio::time::timeout(self.deadline, operation) => match outcome {
                Ok(result) => result,
                Err(_) => {
                    warn!(operation = name, deadline = ?self.deadline, "Operation timed out");
                    Err(Error::Timeout {
                        operation: name,
                        timeout: self.deadline,
                    })
                }
            },
            () = cancelled => {
                warn!(operation = name, "Operation cancelled");
                Err(Error::Cancelled { operation: name })
            }
        }
    }
}

/// Resolves once cancellation fires; never resolves without a receiver or
/// once the sender is gone.
async fn wait_for_cancel(receiver: Option<watch::Receiver<bool>>) {
    match receiver {
        Some(mut rx) => {
            if rx.wait_for(|cancelled| *cancelled).await.is_err() {
                std::future::pending::<()>().await;
            }
        }
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_default_timeouts() {
        let timeouts = Timeouts::default();
        assert_eq!(timeouts.create(), Duration::from_secs(1800));
        assert_eq!(timeouts.read(), Duration::from_secs(300));
        assert!(timeouts.validate().is_ok());
    }

    #[test]
    fn test_zero_timeout_is_invalid() {
        let timeouts = Timeouts {
            read_secs: 0,
            ..Timeouts::default()
        };
        assert_eq!(
            timeouts.validate().err().map(|e| e.kind()),
            Some(ErrorKind::InvalidConfig)
        );
    }

    #[tokio::test]
    async fn test_run_completes() {
        let ctx = OperationContext::with_deadline(Duration::from_secs(1));
        let result = ctx.run("test", async { Ok(7) }).await;
        assert_eq!(result.ok(), Some(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_times_out() {
        let ctx = OperationContext::with_deadline(Duration::from_secs(1));
        let result: Result<()> = ctx
            .run("test", async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        assert_eq!(result.err().map(|e| e.kind()), Some(ErrorKind::Timeout));
    }

    #[tokio::test]
    async fn test_run_is_cancelled() {
        let canceller = Canceller::new();
        let ctx = canceller.context(Duration::from_secs(60));
        canceller.cancel();
        assert!(canceller.is_cancelled());

        let result: Result<()> = ctx
            .run("test", std::future::pending::<Result<()>>())
            .await;
        assert_eq!(result.err().map(|e| e.kind()), Some(ErrorKind::Cancelled));
    }
}
