//! Competing-bid tracker.
//!
//! Polls the settlement queue for everyone else's pending bids and keeps a
//! running max, sum and escalation counter in the shared context.

use capclaim_core::{
    CollaboratorResult, SchedulerConfig, SchedulerContext, SchedulerError, SettlementQueue,
    Session,
};
use capclaim_types::{AccountAddress, BidValue, CompetingBidState, CompetingBids};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Fold one successful poll into the contention state.
///
/// The escalation counter grows each time the max bid rises and resets when
/// the queue holds no competing bids.
pub fn observe_bids(state: &mut CompetingBidState, bids: CompetingBids) {
    if bids.max == BidValue::ZERO {
        state.escalation_count = 0;
    } else if bids.max > state.max_bid {
        state.escalation_count = state.escalation_count.saturating_add(1);
    }
    state.max_bid = bids.max;
    state.sum_bid = bids.sum;
}

/// Fold a failed poll into the contention state: assume no contention, keep
/// the escalation counter.
pub fn observe_failure(state: &mut CompetingBidState) {
    state.max_bid = BidValue::ZERO;
    state.sum_bid = BidValue::ZERO;
}

/// Loop maintaining [`CompetingBidState`].
pub struct BidTracker {
    ctx: Arc<SchedulerContext>,
    settlement: Arc<dyn SettlementQueue>,
    session: Arc<dyn Session>,
    config: SchedulerConfig,
}

impl BidTracker {
    /// Create a tracker writing into `ctx`.
    pub fn new(
        ctx: Arc<SchedulerContext>,
        settlement: Arc<dyn SettlementQueue>,
        session: Arc<dyn Session>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            ctx,
            settlement,
            session,
            config,
        }
    }

    /// Run one poll, excluding `own` from the competitors.
    ///
    /// Failures are folded into the state as "no contention" and returned.
    pub async fn poll_once(&self, own: &AccountAddress) -> CollaboratorResult<CompetingBidState> {
        match self.settlement.competing_bids(own).await {
            Ok(bids) => {
                let state = self.ctx.update_bid_state(|state| {
                    let previous = state.max_bid;
                    observe_bids(state, bids);
                    if state.max_bid > previous {
                        debug!(
                            max = %state.max_bid,
                            sum = %state.sum_bid,
                            escalation = state.escalation_count,
                            "Competing max bid rose"
                        );
                    }
                    *state
                });
                Ok(state)
            }
            Err(e) => {
                self.ctx.update_bid_state(observe_failure);
                Err(e)
            }
        }
    }

    /// Poll forever: on the fixed cadence normally, back-to-back in full-speed
    /// mode.
    ///
    /// Returns only if no signer is authenticated at start.
    pub async fn run(self) -> Result<(), SchedulerError> {
        let Some(own) = self.session.signer_address() else {
            error!("Bid tracker needs an authenticated signer");
            return Err(SchedulerError::NotAuthenticated);
        };
        info!(address = %own, "Bid tracker started");

        loop {
            if let Err(e) = self.poll_once(&own).await {
                warn!(error = %e, "Competing bid query failed");
            }

            if self.ctx.is_full_speed() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(self.config.bid_poll_interval).await;
            }
        }
    }
}
