//! Cancellation and deadline signal shared by the probes of one validation pass

use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::ProviderError;

/// Why a context stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CancelReason {
    /// Explicitly cancelled by the caller
    Cancelled,
    /// The deadline attached to the context passed
    DeadlineExceeded,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::Cancelled => write!(f, "context canceled"),
            CancelReason::DeadlineExceeded => write!(f, "context deadline exceeded"),
        }
    }
}

/// A cloneable cancellation + deadline handle
///
/// Clones observe the same cancellation. A child context is cancelled when its
/// parent is, but cancelling the child leaves the parent untouched.
#[derive(Debug, Clone)]
pub struct ProbeContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl ProbeContext {
    /// A context that is never cancelled unless `cancel` is called
    pub fn background() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
        }
    }

    /// A context that expires after `timeout`
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::background().child_with_timeout(timeout)
    }

    /// Derive a child context that also expires after `timeout`
    ///
    /// The earlier of the parent's and the child's deadline wins. A timeout too
    /// large to represent as an instant leaves the parent's deadline in place.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let deadline = match (self.deadline, Instant::now().checked_add(timeout)) {
            (Some(existing), Some(candidate)) => Some(existing.min(candidate)),
            (existing, None) => existing,
            (None, candidate) => candidate,
        };
        Self {
            token: self.token.child_token(),
            deadline,
        }
    }

    /// Derive a child context sharing this context's deadline
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Cancel this context and all of its children
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// The deadline, if any
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, if any
    pub fn remaining(&self) -> Option<Duration> {
        let now = Instant::now();
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    /// The reason this context has stopped, or `None` while it is still live
    pub fn stop_reason(&self) -> Option<CancelReason> {
        if self.token.is_cancelled() {
            return Some(CancelReason::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(CancelReason::DeadlineExceeded),
            _ => None,
        }
    }

    /// Whether the context has been cancelled or has expired
    pub fn is_done(&self) -> bool {
        self.stop_reason().is_some()
    }

    /// Resolves once the context is cancelled or its deadline passes
    pub async fn done(&self) -> CancelReason {
        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                _ = self.token.cancelled() => CancelReason::Cancelled,
                _ = tokio::time::sleep_until(deadline) => CancelReason::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                CancelReason::Cancelled
            }
        }
    }

    /// Run `fut` until it completes or the context stops, whichever comes first
    ///
    /// Cancellation wins when both are ready at once.
    pub async fn run<T, F>(&self, fut: F) -> Result<T, ProviderError>
    where
        F: Future<Output = Result<T, ProviderError>>,
    {
        tokio::select! {
            biased;
            reason = self.done() => Err(ProviderError::Cancelled(reason)),
            result = fut => result,
        }
    }
}

impl Default for ProbeContext {
    fn default() -> Self {
        Self::background()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_background_context_is_live() {
        let ctx = ProbeContext::background();
        assert!(!ctx.is_done());
        assert!(ctx.deadline().is_none());
        assert!(ctx.remaining().is_none());
    }

    #[tokio::test]
    async fn test_cancel_propagates_to_clones_and_children() {
        let ctx = ProbeContext::background();
        let clone = ctx.clone();
        let child = ctx.child();

        ctx.cancel();

        assert_eq!(clone.stop_reason(), Some(CancelReason::Cancelled));
        assert_eq!(child.done().await, CancelReason::Cancelled);
    }

    #[tokio::test]
    async fn test_cancelling_child_leaves_parent_live() {
        let parent = ProbeContext::background();
        let child = parent.child();
        child.cancel();
        assert!(child.is_done());
        assert!(!parent.is_done());
    }

    #[tokio::test]
    async fn test_deadline_expires() {
        let ctx = ProbeContext::with_timeout(Duration::from_millis(10));
        assert_eq!(ctx.done().await, CancelReason::DeadlineExceeded);
        assert_eq!(ctx.stop_reason(), Some(CancelReason::DeadlineExceeded));
    }

    #[tokio::test]
    async fn test_child_keeps_earlier_parent_deadline() {
        let parent = ProbeContext::with_timeout(Duration::from_millis(20));
        let child = parent.child_with_timeout(Duration::from_secs(60));
        assert_eq!(child.deadline(), parent.deadline());
    }

    #[tokio::test]
    async fn test_unrepresentable_timeout_keeps_parent_deadline() {
        let unbounded = ProbeContext::background().child_with_timeout(Duration::MAX);
        assert!(unbounded.deadline().is_none());
        assert!(!unbounded.is_done());

        let parent = ProbeContext::with_timeout(Duration::from_secs(5));
        let child = parent.child_with_timeout(Duration::from_secs(u64::MAX));
        assert_eq!(child.deadline(), parent.deadline());
    }

    #[tokio::test]
    async fn test_run_returns_future_result_when_live() {
        let ctx = ProbeContext::background();
        let value = ctx.run(async { Ok::<_, ProviderError>(7) }).await;
        assert_eq!(value, Ok(7));
    }

    #[tokio::test]
    async fn test_run_fails_fast_when_cancelled() {
        let ctx = ProbeContext::background();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let started = std::time::Instant::now();
        let result = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok::<_, ProviderError>(())
            })
            .await;

        assert_eq!(
            result,
            Err(ProviderError::Cancelled(CancelReason::Cancelled))
        );
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
