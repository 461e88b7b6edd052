//! End-to-end runs of the scheduler against the simulated chain.

use capclaim_core::SchedulerConfig;
use capclaim_simulation::{SimulationConfig, SimulationRunner};
use capclaim_types::{Amount, BidValue};
use std::time::Duration;

/// Scheduler cadences scaled down so a run fits in a couple of seconds.
fn fast_scheduler() -> SchedulerConfig {
    SchedulerConfig::default()
        .with_directory_poll_interval(Duration::from_millis(50))
        .with_bid_poll_interval(Duration::from_millis(20))
        .with_quota_poll_interval(Duration::from_millis(50))
        .with_capacity_poll_interval(Duration::from_millis(10))
        .with_unreachable_backoff(Duration::from_millis(200))
        .with_max_submission_wait(Duration::from_millis(100))
        .with_min_cycle(Duration::from_millis(10))
        .with_consumer_poll_intervals(Duration::from_millis(25), Duration::from_millis(5))
        .with_escalation_per_sec(BidValue(1_000_000))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_claims_stay_within_cap_and_quota() {
    let config = SimulationConfig::new(7)
        .with_tick(Duration::from_millis(20))
        .with_initial_quota(Amount::from_base_units(30_000_000))
        .with_liquidation_probability(0.0);
    let scheduler = fast_scheduler();
    let runner = SimulationRunner::new(config.clone(), scheduler.clone());

    let report = runner.run_for(Duration::from_secs(2)).await;

    assert!(report.stats.submissions > 0, "nothing was submitted");
    assert!(report.stats.included > 0, "nothing was included");
    assert!(report.stats.largest_claim <= scheduler.max_claim_per_tx);
    assert_eq!(
        report.stats.claimed.saturating_add(report.remaining_quota),
        config.initial_quota
    );
    assert_eq!(report.seen, config.providers);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_liquidated_providers_leave_the_capacity_table() {
    let config = SimulationConfig::new(11)
        .with_tick(Duration::from_millis(20))
        .with_providers(6)
        .with_liquidation_probability(0.05);
    let runner = SimulationRunner::new(config.clone(), fast_scheduler());

    let report = runner.run_for(Duration::from_secs(2)).await;

    assert!(!report.liquidated.is_empty(), "seed produced no liquidation");
    for provider in &report.liquidated {
        assert!(
            !report.tracked.contains_key(provider),
            "{provider} still tracked after liquidation"
        );
    }
    // Providers liquidated before the first directory poll are never started.
    assert!(report.seen <= config.providers);
    assert!(report.seen >= config.providers - report.liquidated.len());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dry_world_submits_nothing() {
    let config = SimulationConfig::new(3)
        .with_tick(Duration::from_millis(20))
        .with_initial_capacity(Amount::from_base_units(10_000))
        .with_refill_probability(0.0)
        .with_liquidation_probability(0.0);
    let runner = SimulationRunner::new(config, fast_scheduler());

    let report = runner.run_for(Duration::from_millis(500)).await;

    assert_eq!(report.stats.submissions, 0);
    assert_eq!(report.tracked.len(), 4);
    assert!(report
        .tracked
        .values()
        .all(|c| *c == Amount::from_base_units(10_000)));
}
