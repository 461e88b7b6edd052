//! Configuration for a simulated world.

use capclaim_types::{Amount, BidValue, Collateral};
use std::time::Duration;

/// Parameters of a simulated world.
#[derive(Clone, Debug)]
pub struct SimulationConfig {
    /// Random seed.
    pub seed: u64,

    /// Number of providers listed at start.
    pub providers: usize,

    /// Collateral each provider starts with.
    pub initial_collateral: Collateral,

    /// Capacity each provider starts with.
    pub initial_capacity: Amount,

    /// Global quota at start.
    pub initial_quota: Amount,

    /// Interval between world ticks.
    pub tick: Duration,

    /// Chance per tick that a provider's capacity refills.
    pub refill_probability: f64,

    /// Largest single refill.
    pub max_refill: Amount,

    /// Chance per tick that a provider is liquidated.
    pub liquidation_probability: f64,

    /// Chance per tick that a new competing bid appears.
    pub competitor_probability: f64,

    /// Largest competing bid.
    pub max_competitor_bid: BidValue,

    /// Ticks a claim may stay pending before it is dropped.
    pub pending_ttl_ticks: u32,

    /// Address of the simulated signer.
    pub signer: String,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self::new(12345)
    }
}

impl SimulationConfig {
    /// Create a configuration with the given seed and moderate churn.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            providers: 4,
            initial_collateral: Collateral(100_000_000_000),
            initial_capacity: Amount::from_base_units(5_000_000),
            initial_quota: Amount::from_parts(2, 0),
            tick: Duration::from_millis(500),
            refill_probability: 0.2,
            max_refill: Amount::from_base_units(8_000_000),
            liquidation_probability: 0.01,
            competitor_probability: 0.3,
            max_competitor_bid: BidValue(1_500_000),
            pending_ttl_ticks: 3,
            signer: "sim-signer".to_string(),
        }
    }

    /// Set the number of providers.
    pub fn with_providers(mut self, providers: usize) -> Self {
        self.providers = providers;
        self
    }

    /// Set the starting capacity per provider.
    pub fn with_initial_capacity(mut self, capacity: Amount) -> Self {
        self.initial_capacity = capacity;
        self
    }

    /// Set the starting global quota.
    pub fn with_initial_quota(mut self, quota: Amount) -> Self {
        self.initial_quota = quota;
        self
    }

    /// Set the tick interval.
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Set the per-tick refill chance.
    pub fn with_refill_probability(mut self, p: f64) -> Self {
        self.refill_probability = p;
        self
    }

    /// Set the per-tick liquidation chance.
    pub fn with_liquidation_probability(mut self, p: f64) -> Self {
        self.liquidation_probability = p;
        self
    }

    /// Set the per-tick chance of a new competitor.
    pub fn with_competitor_probability(mut self, p: f64) -> Self {
        self.competitor_probability = p;
        self
    }
}
