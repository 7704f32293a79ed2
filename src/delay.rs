//! Cancellable waits used for pacing and inter-batch cooldowns
//!
//! Every suspension point inside a dispatch run goes through [`Delay`], so a pause or cancel
//! issued while the run is waiting preempts the wait instead of being noticed afterwards.

use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// How a wait ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The full duration elapsed
    Elapsed,
    /// The token was cancelled first
    Cancelled,
}

/// A timer that can be preempted by a cancellation token
#[async_trait]
pub trait Delay: Send + Sync {
    /// Wait for `duration`, returning early if `cancel` fires
    async fn wait(&self, duration: Duration, cancel: &CancellationToken) -> WaitOutcome;
}

/// [`Delay`] backed by `tokio::time::sleep`
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioDelay;

#[async_trait]
impl Delay for TokioDelay {
    async fn wait(&self, duration: Duration, cancel: &CancellationToken) -> WaitOutcome {
        if cancel.is_cancelled() {
            return WaitOutcome::Cancelled;
        }
        if duration.is_zero() {
            return WaitOutcome::Elapsed;
        }

        tokio::select! {
            _ = tokio::time::sleep(duration) => WaitOutcome::Elapsed,
            _ = cancel.cancelled() => WaitOutcome::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn elapses_when_not_cancelled() {
        let token = CancellationToken::new();
        let outcome = TokioDelay.wait(Duration::from_millis(10), &token).await;
        assert_eq!(outcome, WaitOutcome::Elapsed);
    }

    #[tokio::test]
    async fn cancel_preempts_a_long_wait() {
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let start = Instant::now();
        let outcome = TokioDelay.wait(Duration::from_secs(300), &token).await;

        assert_eq!(outcome, WaitOutcome::Cancelled);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn already_cancelled_token_returns_immediately() {
        let token = CancellationToken::new();
        token.cancel();
        let outcome = TokioDelay.wait(Duration::from_secs(300), &token).await;
        assert_eq!(outcome, WaitOutcome::Cancelled);
    }
}
