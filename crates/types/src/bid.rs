//! Competing-bid observations.

use crate::BidValue;
use serde::{Deserialize, Serialize};

/// Aggregate of the bids currently pending in the settlement queue,
/// excluding our own submissions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetingBids {
    /// Highest competing bid (zero when there are no competitors).
    pub max: BidValue,
    /// Sum of all competing bids.
    pub sum: BidValue,
}

impl CompetingBids {
    /// Aggregate a set of individual bids. An empty set yields zero/zero.
    pub fn from_bids(bids: impl IntoIterator<Item = BidValue>) -> Self {
        bids.into_iter().fold(Self::default(), |acc, bid| Self {
            max: acc.max.max(bid),
            sum: acc.sum.saturating_add(bid),
        })
    }
}

/// Contention state maintained by the bid tracker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompetingBidState {
    /// Highest competing bid seen on the last poll.
    pub max_bid: BidValue,
    /// Sum of competing bids seen on the last poll.
    pub sum_bid: BidValue,
    /// Number of consecutive polls on which the max bid rose, reset when the
    /// queue is clear of competitors.
    pub escalation_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_bids_aggregates_max_and_sum() {
        let bids = CompetingBids::from_bids([BidValue(5), BidValue(12), BidValue(3)]);
        assert_eq!(bids.max, BidValue(12));
        assert_eq!(bids.sum, BidValue(20));
    }

    #[test]
    fn test_from_bids_empty_is_zero() {
        assert_eq!(CompetingBids::from_bids([]), CompetingBids::default());
    }
}
