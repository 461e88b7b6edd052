//! Competing-bid tracking over the settlement queue.
//!
//! The [`BidTracker`] is the only writer of the shared
//! [`CompetingBidState`](capclaim_types::CompetingBidState). It polls the
//! pending pool for bids signed by anyone but us and maintains:
//!
//! - `max_bid` / `sum_bid` over the current competitors
//! - `escalation_count`, a contention signal that grows while competitors keep
//!   raising their bids and resets once the pool is clear
//!
//! A failed poll is treated as "no contention" so a flaky endpoint never
//! inflates our bids.

mod tracker;

pub use tracker::{observe_bids, observe_failure, BidTracker};
