//! Runs a real scheduler against a [`SimulatedChain`].

use crate::chain::{SimulatedChain, SimulationStats};
use crate::config::SimulationConfig;
use capclaim_core::{Collaborators, SchedulerConfig};
use capclaim_node::Scheduler;
use capclaim_types::{Amount, ProviderId};
use indexmap::IndexMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// What a simulation run observed.
#[derive(Debug, Clone)]
pub struct SimulationReport {
    /// Chain-side counters.
    pub stats: SimulationStats,
    /// Quota left on the chain.
    pub remaining_quota: Amount,
    /// Providers liquidated during the run.
    pub liquidated: Vec<ProviderId>,
    /// The scheduler's capacity table at the end of the run.
    pub tracked: IndexMap<ProviderId, Amount>,
    /// Providers the scheduler ever started monitoring.
    pub seen: usize,
}

/// Drives one simulation.
pub struct SimulationRunner {
    config: SimulationConfig,
    scheduler_config: SchedulerConfig,
    chain: Arc<SimulatedChain>,
}

impl SimulationRunner {
    pub fn new(config: SimulationConfig, scheduler_config: SchedulerConfig) -> Self {
        Self {
            chain: Arc::new(SimulatedChain::new(config.clone())),
            config,
            scheduler_config,
        }
    }

    /// The simulated chain.
    pub fn chain(&self) -> &Arc<SimulatedChain> {
        &self.chain
    }

    fn drain_period(&self) -> Duration {
        let c = &self.scheduler_config;
        c.max_submission_wait * 2 + c.capacity_poll_interval * 2 + c.min_cycle
    }

    /// Run the scheduler against the chain for `duration`, then stop both.
    pub async fn run_for(&self, duration: Duration) -> SimulationReport {
        info!(
            seed = self.config.seed,
            providers = self.config.providers,
            ?duration,
            "Starting simulation"
        );

        let scheduler = Arc::new(Scheduler::new(
            self.scheduler_config.clone(),
            Collaborators::from_single(self.chain.clone()),
        ));

        let ticker = tokio::spawn({
            let chain = Arc::clone(&self.chain);
            let tick = self.config.tick;
            async move {
                loop {
                    tokio::time::sleep(tick).await;
                    chain.tick();
                }
            }
        });
        let driver = tokio::spawn({
            let scheduler = Arc::clone(&scheduler);
            async move { scheduler.run().await }
        });

        tokio::time::sleep(duration).await;

        // Freeze the world, then give every tracker time to finish its
        // current cycle and observe the final state.
        ticker.abort();
        tokio::time::sleep(self.drain_period()).await;

        scheduler.shutdown();
        driver.abort();

        let ctx = scheduler.context();
        let report = SimulationReport {
            stats: self.chain.stats(),
            remaining_quota: self.chain.quota(),
            liquidated: self.chain.liquidated(),
            tracked: ctx.capacity_snapshot(),
            seen: ctx.seen_count(),
        };
        info!(stats = ?report.stats, "Simulation finished");
        report
    }
}
