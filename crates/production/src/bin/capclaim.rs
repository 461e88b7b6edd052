//! Capacity claim scheduler CLI
//!
//! Runs the scheduler against a settlement gateway, or against a simulated
//! chain for a fixed duration.

use anyhow::Context;
use capclaim_core::{Collaborators, SettlementQueue};
use capclaim_node::Scheduler;
use capclaim_production::config::CapclaimConfig;
use capclaim_production::gateway::GatewayClient;
use capclaim_production::logging;
use capclaim_simulation::{SimulationConfig, SimulationRunner};
use capclaim_types::AccountAddress;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "capclaim")]
#[command(about = "Capacity claim scheduler")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults apply if it does not exist)
    #[arg(short, long, global = true, default_value = "capclaim.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler against the configured gateway until interrupted
    Run,

    /// Run the scheduler against a simulated chain
    Simulate {
        /// Random seed
        #[arg(long, default_value = "12345")]
        seed: u64,

        /// Duration to run (e.g., "30s", "5m")
        #[arg(short, long, default_value = "30s")]
        duration: humantime::Duration,

        /// Number of providers
        #[arg(long, default_value = "4")]
        providers: usize,
    },

    /// Print the competing bids currently pending on the gateway
    Bids,
}

async fn run(config: CapclaimConfig) -> anyhow::Result<()> {
    let gateway = Arc::new(GatewayClient::new(&config.gateway)?);
    let scheduler = Arc::new(Scheduler::new(
        config.scheduler_config(),
        Collaborators::from_single(gateway),
    ));

    info!(gateway = %config.gateway.url, "Starting scheduler");
    let result = tokio::select! {
        result = scheduler.run() => result.context("scheduler stopped"),
        signal = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
            signal.context("failed to listen for ctrl-c")
        }
    };
    scheduler.shutdown();
    result
}

async fn simulate(
    config: CapclaimConfig,
    seed: u64,
    duration: humantime::Duration,
    providers: usize,
) -> anyhow::Result<()> {
    let world = SimulationConfig::new(seed).with_providers(providers);
    let runner = SimulationRunner::new(world, config.scheduler_config());
    let report = runner.run_for(*duration).await;

    println!("Simulation (seed {seed}, {duration})");
    println!("  ticks:        {}", report.stats.ticks);
    println!("  submissions:  {}", report.stats.submissions);
    println!("  included:     {}", report.stats.included);
    println!("  dropped:      {}", report.stats.dropped);
    println!("  invalid:      {}", report.stats.invalid);
    println!("  claimed:      {}", report.stats.claimed);
    println!("  largest:      {}", report.stats.largest_claim);
    println!("  liquidations: {}", report.stats.liquidations);
    println!("  quota left:   {}", report.remaining_quota);
    println!("  tracked:      {} of {} seen", report.tracked.len(), report.seen);
    Ok(())
}

async fn bids(config: CapclaimConfig) -> anyhow::Result<()> {
    let signer = config
        .gateway
        .signer
        .clone()
        .context("gateway.signer is not configured")?;
    let gateway = GatewayClient::new(&config.gateway)?;
    let bids = gateway
        .competing_bids(&AccountAddress::new(signer))
        .await
        .context("failed to fetch competing bids")?;
    println!("max: {}", bids.max);
    println!("sum: {}", bids.sum);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = CapclaimConfig::load_or_default(&cli.config)?;

    match cli.command {
        // No logging: output goes to stdout.
        Commands::Bids => bids(config).await,

        Commands::Run => {
            let guard = logging::init(&config.logging)?;
            let result = run(config).await;
            guard.flush().await;
            result
        }

        Commands::Simulate {
            seed,
            duration,
            providers,
        } => {
            let guard = logging::init(&config.logging)?;
            let result = simulate(config, seed, duration, providers).await;
            guard.flush().await;
            result
        }
    }
}
