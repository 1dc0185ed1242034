//! Time source used by the poller between attempts.
//!
//! Production code sleeps on the Tokio timer via [`TokioClock`]; tests
//! substitute a clock that records requested sleeps and returns at once.

use std::time::Duration;

use async_trait::async_trait;

/// Suspends the current task for a given duration.
#[async_trait]
pub trait Clock: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// [`Clock`] backed by [`tokio::time::sleep`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
