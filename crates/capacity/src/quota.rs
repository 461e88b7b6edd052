//! Global quota refresh.

use capclaim_core::{BalanceOracle, CollaboratorResult, SchedulerConfig, SchedulerContext};
use capclaim_types::Amount;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Keeps [`SchedulerContext::quota`] fresh on a fixed cadence.
///
/// A failed read keeps the previous value; before the first successful read
/// the quota stays unknown and only the per-transaction cap applies.
pub struct QuotaTracker {
    ctx: Arc<SchedulerContext>,
    balance: Arc<dyn BalanceOracle>,
    config: SchedulerConfig,
}

impl QuotaTracker {
    pub fn new(
        ctx: Arc<SchedulerContext>,
        balance: Arc<dyn BalanceOracle>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            ctx,
            balance,
            config,
        }
    }

    /// Read the quota once and store it.
    pub async fn poll_once(&self) -> CollaboratorResult<Amount> {
        let quota = self.balance.remaining_quota().await?;
        let previous = self.ctx.quota();
        self.ctx.set_quota(quota);
        if previous != Some(quota) {
            debug!(%quota, "Global quota updated");
        }
        Ok(quota)
    }

    /// Refresh forever.
    pub async fn run(self) {
        info!(interval = ?self.config.quota_poll_interval, "Quota tracker started");
        loop {
            if let Err(e) = self.poll_once().await {
                warn!(error = %e, "Quota read failed, keeping previous value");
            }
            tokio::time::sleep(self.config.quota_poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capclaim_core::CollaboratorError;
    use capclaim_test_helpers::{amount, MockChain};
    use std::time::Duration;

    #[tokio::test]
    async fn test_failed_read_keeps_previous_quota() {
        let chain = Arc::new(MockChain::new().with_quota(amount("0.4")));
        let ctx = Arc::new(SchedulerContext::new());
        let tracker = QuotaTracker::new(Arc::clone(&ctx), chain.clone(), SchedulerConfig::default());
        assert_eq!(ctx.quota(), None);

        tracker.poll_once().await.unwrap();
        assert_eq!(ctx.quota(), Some(amount("0.4")));

        chain.set_quota(Err(CollaboratorError::Unavailable("rpc down".into())));
        assert!(tracker.poll_once().await.is_err());
        assert_eq!(ctx.quota(), Some(amount("0.4")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_refreshes_on_cadence() {
        let chain = Arc::new(MockChain::new().with_quota(amount("0.4")));
        let ctx = Arc::new(SchedulerContext::new());
        let handle = tokio::spawn(
            QuotaTracker::new(Arc::clone(&ctx), chain.clone(), SchedulerConfig::default()).run(),
        );

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(ctx.quota(), Some(amount("0.4")));

        chain.set_quota(Ok(Amount::ZERO));
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(ctx.quota(), Some(amount("0.4")));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(ctx.quota(), Some(Amount::ZERO));
        handle.abort();
    }
}
