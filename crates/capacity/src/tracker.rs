//! Per-provider capacity tracker.

use capclaim_core::{
    CapacityOracle, CollaboratorError, SchedulerConfig, SchedulerContext, SchedulerError, Session,
};
use capclaim_execution::{AuctionSubmitter, CycleOutcome};
use capclaim_types::{Amount, ProviderId};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Why a tracker stopped for good.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The session lost its signer.
    NotAuthenticated,
    /// The provider has no backing collateral left.
    NoCollateral,
}

/// Result of one tracker iteration.
#[derive(Debug)]
pub enum TrackerStep {
    /// Capacity is at or below dust; nothing to claim.
    Idle(Amount),
    /// A claim cycle ran.
    Cycled(CycleOutcome),
    /// The provider could not be read; its capacity entry was dropped.
    Unreachable(CollaboratorError),
    /// The claim cycle failed after the capacity read.
    CycleFailed(SchedulerError),
    /// The tracker must exit.
    Stopped(StopReason),
}

/// Watches one provider's issuable capacity and runs claim cycles while it is
/// above dust.
pub struct CapacityTracker {
    provider: ProviderId,
    ctx: Arc<SchedulerContext>,
    oracle: Arc<dyn CapacityOracle>,
    session: Arc<dyn Session>,
    submitter: AuctionSubmitter,
    config: SchedulerConfig,
}

impl CapacityTracker {
    pub fn new(
        provider: ProviderId,
        ctx: Arc<SchedulerContext>,
        oracle: Arc<dyn CapacityOracle>,
        session: Arc<dyn Session>,
        submitter: AuctionSubmitter,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            provider,
            ctx,
            oracle,
            session,
            submitter,
            config,
        }
    }

    /// Provider this tracker watches.
    pub fn provider(&self) -> &ProviderId {
        &self.provider
    }

    /// Run one iteration without the trailing wait.
    ///
    /// Collateral is re-read every time; a provider whose collateral drops to
    /// zero is removed from the capacity table and the tracker stops.
    pub async fn step(&self) -> TrackerStep {
        if !self.session.is_authenticated() {
            self.ctx.remove_provider(&self.provider, self.config.dust_threshold);
            return TrackerStep::Stopped(StopReason::NotAuthenticated);
        }

        let collateral = match self.oracle.backing_collateral(&self.provider).await {
            Ok(collateral) => collateral,
            Err(e) => return self.unreachable(e),
        };
        if collateral.is_zero() {
            self.ctx.remove_provider(&self.provider, self.config.dust_threshold);
            return TrackerStep::Stopped(StopReason::NoCollateral);
        }

        let capacity = match self.oracle.issuable_capacity(&self.provider).await {
            Ok(capacity) => capacity,
            Err(e) => return self.unreachable(e),
        };
        let full_speed = self
            .ctx
            .record_capacity(&self.provider, capacity, self.config.dust_threshold);

        if capacity <= self.config.dust_threshold {
            return TrackerStep::Idle(capacity);
        }

        debug!(provider = %self.provider, %capacity, full_speed, "Capacity available");
        match self.submitter.run_cycle().await {
            Ok(outcome) => TrackerStep::Cycled(outcome),
            Err(e) => TrackerStep::CycleFailed(e),
        }
    }

    /// A provider that cannot be read has no known capacity: drop it from the
    /// table until the next successful read re-records it.
    fn unreachable(&self, error: CollaboratorError) -> TrackerStep {
        self.ctx.remove_provider(&self.provider, self.config.dust_threshold);
        TrackerStep::Unreachable(error)
    }

    /// Loop until the provider loses its collateral or the session ends.
    pub async fn run(self) -> StopReason {
        info!(provider = %self.provider, "Capacity tracker started");
        loop {
            match self.step().await {
                TrackerStep::Idle(_) => {
                    tokio::time::sleep(self.config.capacity_poll_interval).await;
                }
                TrackerStep::Cycled(_) => {}
                TrackerStep::Unreachable(e) => {
                    warn!(
                        provider = %self.provider,
                        error = %e,
                        backoff = ?self.config.unreachable_backoff,
                        "Provider unreachable, backing off"
                    );
                    tokio::time::sleep(self.config.unreachable_backoff).await;
                }
                TrackerStep::CycleFailed(e) => {
                    error!(provider = %self.provider, error = %e, "Claim cycle failed");
                    tokio::task::yield_now().await;
                }
                TrackerStep::Stopped(reason) => {
                    info!(provider = %self.provider, ?reason, "Capacity tracker stopped");
                    return reason;
                }
            }
        }
    }
}
