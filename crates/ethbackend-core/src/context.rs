//! Per-call cancellation and deadlines.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::TransportError;

/// Cancellation scope passed to every backend call.
///
/// Cloning shares the same scope. [`child`](Self::child) and the `with_*`
/// constructors derive a scope that is cancelled together with its parent
/// but can also be cancelled on its own.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// Derive a context that also expires after `timeout`.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derive a context that also expires at `deadline`.
    ///
    /// The earlier of the parent's deadline and `deadline` applies.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(parent) if parent < deadline => parent,
            _ => deadline,
        };
        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    /// Derive a context that can be cancelled without cancelling this one.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The error this context currently reports, if it is already done.
    pub fn err(&self) -> Option<TransportError> {
        if self.token.is_cancelled() {
            return Some(TransportError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(TransportError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once the context is cancelled or its deadline passes.
    pub async fn done(&self) -> TransportError {
        match self.deadline {
            Some(deadline) => tokio::select! {
                _ = self.token.cancelled() => TransportError::Cancelled,
                _ = tokio::time::sleep_until(deadline) => TransportError::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                TransportError::Cancelled
            }
        }
    }

    /// Drive `fut` until it completes or the context ends.
    ///
    /// A result that is ready in the same poll as the cancellation wins.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, TransportError>
    where
        F: Future<Output = Result<T, TransportError>>,
    {
        if let Some(err) = self.err() {
            return Err(err);
        }
        tokio::select! {
            biased;
            res = fut => res,
            err = self.done() => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_returns_future_result() {
        let ctx = CallContext::background();
        let out = ctx.run(async { Ok::<_, TransportError>(7u64) }).await.unwrap();
        assert_eq!(out, 7);
    }

    #[tokio::test]
    async fn run_fails_fast_when_already_cancelled() {
        let ctx = CallContext::background();
        ctx.cancel();
        let err = ctx
            .run(async { Ok::<_, TransportError>(()) })
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Cancelled));
    }

    #[tokio::test]
    async fn cancel_unblocks_pending_future() {
        let ctx = CallContext::background();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });
        let err = ctx
            .run(futures::future::pending::<Result<(), TransportError>>())
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Cancelled));
    }

    #[tokio::test]
    async fn deadline_expires() {
        let ctx = CallContext::background().with_timeout(Duration::from_millis(20));
        let err = ctx
            .run(futures::future::pending::<Result<(), TransportError>>())
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::DeadlineExceeded));
    }

    #[test]
    fn child_cancelled_with_parent_only() {
        let parent = CallContext::background();
        let child = parent.child();
        child.cancel();
        assert!(!parent.is_cancelled());

        let child = parent.child();
        parent.cancel();
        assert!(child.is_cancelled());
    }

    #[tokio::test]
    async fn earlier_parent_deadline_wins() {
        let parent = CallContext::background().with_timeout(Duration::from_secs(1));
        let child = parent.with_timeout(Duration::from_secs(60));
        assert_eq!(child.deadline(), parent.deadline());
    }
}
