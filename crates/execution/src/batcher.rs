//! Batch request building.
//!
//! Turns a snapshot of the capacity table into at most one claim per cycle.
//!
//! # Design
//!
//! Every tracked provider above dust contributes a *cappable* amount, the
//! smallest of its capacity, the per-transaction cap and the global quota.
//! The cappable amounts are summed into a total that sizes the bid, but only
//! the single largest cappable provider is actually claimed from. Providers
//! are visited in first-tracked order and ties keep the earlier provider.
//!
//! A running remaining-quota counter is drawn down as providers are visited;
//! once it reaches zero the remaining providers are skipped. The counter
//! saturates at zero and never bounds an individual provider's amount.
//!
//! The builder is pure: callers hand it the state they read from the shared
//! context and apply the result themselves.

use capclaim_core::{SchedulerConfig, SkipReason};
use capclaim_types::{
    Amount, BidValue, ClaimCandidate, CompetingBidState, ProviderId, AMOUNT_SCALE,
};
use indexmap::IndexMap;

/// Bid added per escalation step, in claimed-amount base units (0.2 of a
/// whole unit).
const ESCALATION_STEP_UNITS: u128 = AMOUNT_SCALE as u128 / 5;

/// Builds the single claim for a cycle from the current capacity table.
#[derive(Debug, Clone)]
pub struct BatchRequestBuilder {
    /// Per-transaction claim cap.
    max_claim_per_tx: Amount,

    /// Capacities at or below this are ignored.
    dust_threshold: Amount,

    /// Priority increment per whole claimed unit.
    bid_unit: BidValue,
}

impl BatchRequestBuilder {
    /// Create a builder using the sizing constants from `config`.
    pub fn new(config: &SchedulerConfig) -> Self {
        Self {
            max_claim_per_tx: config.max_claim_per_tx,
            dust_threshold: config.dust_threshold,
            bid_unit: config.bid_unit,
        }
    }

    /// Largest amount any single provider may contribute given `quota`.
    ///
    /// An unread quota leaves only the per-transaction cap.
    pub fn global_cap(&self, quota: Option<Amount>) -> Amount {
        match quota {
            Some(quota) => self.max_claim_per_tx.min(quota),
            None => self.max_claim_per_tx,
        }
    }

    /// Pick the claim for this cycle.
    ///
    /// `in_flight_bid` is the bid of the submission currently holding the
    /// slot; the candidate must strictly outbid it.
    pub fn build(
        &self,
        capacities: &IndexMap<ProviderId, Amount>,
        quota: Option<Amount>,
        bids: &CompetingBidState,
        in_flight_bid: Option<BidValue>,
    ) -> Result<ClaimCandidate, SkipReason> {
        if quota.is_some_and(Amount::is_zero) {
            return Err(SkipReason::QuotaExhausted);
        }

        let global_cap = self.global_cap(quota);
        let mut remaining = quota.unwrap_or(Amount::from_base_units(u64::MAX));
        let mut total = Amount::ZERO;
        let mut best: Option<(&ProviderId, Amount)> = None;

        for (provider, capacity) in capacities {
            if *capacity <= self.dust_threshold {
                continue;
            }
            if remaining.is_zero() {
                break;
            }

            let cappable = global_cap.min(*capacity);
            remaining = remaining.saturating_sub(cappable);
            total = total.saturating_add(cappable);

            if best.map_or(true, |(_, amount)| cappable > amount) {
                best = Some((provider, cappable));
            }
        }

        let Some((provider, amount)) = best else {
            return Err(SkipReason::NoEligibleProvider);
        };

        let bid = self.bid_for(total, bids);
        if let Some(in_flight) = in_flight_bid {
            if bid <= in_flight {
                return Err(SkipReason::NotOutbid {
                    candidate: bid,
                    in_flight,
                });
            }
        }

        Ok(ClaimCandidate {
            provider: provider.clone(),
            amount,
            total_amount: total,
            bid,
        })
    }

    /// Bid for a claim totalling `total`:
    /// `sum_bid + floor((1 + total + escalation / 5) * bid_unit)`.
    pub fn bid_for(&self, total: Amount, bids: &CompetingBidState) -> BidValue {
        let scale = AMOUNT_SCALE as u128;
        let multiplier = scale
            + total.base_units() as u128
            + bids.escalation_count as u128 * ESCALATION_STEP_UNITS;
        let own = multiplier.saturating_mul(self.bid_unit.get()) / scale;
        bids.sum_bid.saturating_add(BidValue(own))
    }
}
