//! Configuration for the claim scheduler.

use capclaim_types::{Amount, BidValue, Collateral};
use std::time::Duration;

/// Tuning knobs shared by every scheduler component.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Largest amount a single claim may draw.
    pub max_claim_per_tx: Amount,

    /// Capacity at or below this is ignored.
    pub dust_threshold: Amount,

    /// Base priority increment; one whole claimed unit adds one `bid_unit`.
    pub bid_unit: BidValue,

    /// Providers must have strictly more collateral than this to be monitored.
    pub min_collateral: Collateral,

    /// Cadence of provider discovery.
    pub directory_poll_interval: Duration,

    /// Cadence of competing-bid polls outside full-speed mode.
    pub bid_poll_interval: Duration,

    /// Cadence of global quota refreshes.
    pub quota_poll_interval: Duration,

    /// Delay between capacity polls while a provider sits at dust.
    pub capacity_poll_interval: Duration,

    /// Backoff for a provider whose capacity could not be read.
    pub unreachable_backoff: Duration,

    /// Longest the in-flight slot is held waiting for a settlement status.
    pub max_submission_wait: Duration,

    /// Minimum duration of a claim cycle that reached the submitter.
    pub min_cycle: Duration,

    /// How long the submission consumer waits for a new job before escalating
    /// the pending one.
    pub consumer_poll_interval: Duration,

    /// Consumer wait in full-speed mode.
    pub consumer_full_speed_poll_interval: Duration,

    /// Bid increase per elapsed second applied to a still-pending submission.
    /// Zero disables escalation.
    pub escalation_per_sec: BidValue,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_claim_per_tx: Amount::from_base_units(10_000_000), // 0.1
            dust_threshold: Amount::from_base_units(50_000),       // 0.0005
            bid_unit: BidValue(1_000_000),
            // One whole collateral token (10 decimals).
            min_collateral: Collateral(10_000_000_000),
            directory_poll_interval: Duration::from_secs(3),
            bid_poll_interval: Duration::from_secs(1),
            quota_poll_interval: Duration::from_secs(3),
            capacity_poll_interval: Duration::from_millis(100),
            unreachable_backoff: Duration::from_secs(30),
            max_submission_wait: Duration::from_secs(1),
            min_cycle: Duration::from_millis(100),
            consumer_poll_interval: Duration::from_millis(250),
            consumer_full_speed_poll_interval: Duration::from_millis(50),
            escalation_per_sec: BidValue(100_000),
        }
    }
}

impl SchedulerConfig {
    /// Set the per-transaction claim cap.
    pub fn with_max_claim_per_tx(mut self, cap: Amount) -> Self {
        self.max_claim_per_tx = cap;
        self
    }

    /// Set the dust threshold.
    pub fn with_dust_threshold(mut self, dust: Amount) -> Self {
        self.dust_threshold = dust;
        self
    }

    /// Set the bid unit.
    pub fn with_bid_unit(mut self, unit: BidValue) -> Self {
        self.bid_unit = unit;
        self
    }

    /// Set the minimum collateral for discovery.
    pub fn with_min_collateral(mut self, min: Collateral) -> Self {
        self.min_collateral = min;
        self
    }

    /// Set the directory poll cadence.
    pub fn with_directory_poll_interval(mut self, interval: Duration) -> Self {
        self.directory_poll_interval = interval;
        self
    }

    /// Set the competing-bid poll cadence.
    pub fn with_bid_poll_interval(mut self, interval: Duration) -> Self {
        self.bid_poll_interval = interval;
        self
    }

    /// Set the quota poll cadence.
    pub fn with_quota_poll_interval(mut self, interval: Duration) -> Self {
        self.quota_poll_interval = interval;
        self
    }

    /// Set the dust-level capacity poll delay.
    pub fn with_capacity_poll_interval(mut self, interval: Duration) -> Self {
        self.capacity_poll_interval = interval;
        self
    }

    /// Set the unreachable-provider backoff.
    pub fn with_unreachable_backoff(mut self, backoff: Duration) -> Self {
        self.unreachable_backoff = backoff;
        self
    }

    /// Set the maximum settlement wait.
    pub fn with_max_submission_wait(mut self, wait: Duration) -> Self {
        self.max_submission_wait = wait;
        self
    }

    /// Set the minimum claim cycle.
    pub fn with_min_cycle(mut self, min_cycle: Duration) -> Self {
        self.min_cycle = min_cycle;
        self
    }

    /// Set both consumer poll cadences.
    pub fn with_consumer_poll_intervals(mut self, normal: Duration, full_speed: Duration) -> Self {
        self.consumer_poll_interval = normal;
        self.consumer_full_speed_poll_interval = full_speed;
        self
    }

    /// Set the per-second escalation rate (zero disables it).
    pub fn with_escalation_per_sec(mut self, rate: BidValue) -> Self {
        self.escalation_per_sec = rate;
        self
    }

    /// Consumer wait for the current mode.
    pub fn consumer_poll(&self, full_speed: bool) -> Duration {
        if full_speed {
            self.consumer_full_speed_poll_interval
        } else {
            self.consumer_poll_interval
        }
    }
}
