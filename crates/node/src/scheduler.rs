//! Scheduler: provider discovery and task wiring.
//!
//! `start` launches the single-instance services (bid tracker, quota tracker,
//! submission consumer). The directory loop then spawns one capacity tracker
//! per newly discovered provider. A provider is only ever started once; after
//! its tracker exits it is not restarted even if it becomes eligible again.

use capclaim_capacity::{CapacityTracker, QuotaTracker};
use capclaim_core::{Collaborators, SchedulerConfig, SchedulerContext, SchedulerError};
use capclaim_execution::AuctionSubmitter;
use capclaim_mempool::BidTracker;
use capclaim_types::ProviderId;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// The claim scheduler.
pub struct Scheduler {
    config: SchedulerConfig,
    collaborators: Collaborators,
    ctx: Arc<SchedulerContext>,
    submitter: AuctionSubmitter,
    started: AtomicBool,
    services: Mutex<Vec<JoinHandle<()>>>,
}

impl Scheduler {
    /// Create a scheduler. Nothing runs until [`Scheduler::start`].
    pub fn new(config: SchedulerConfig, collaborators: Collaborators) -> Self {
        let ctx = Arc::new(SchedulerContext::new());
        let submitter = AuctionSubmitter::new(
            Arc::clone(&ctx),
            Arc::clone(&collaborators.claims),
            config.clone(),
        );
        Self {
            config,
            collaborators,
            ctx,
            submitter,
            started: AtomicBool::new(false),
            services: Mutex::new(Vec::new()),
        }
    }

    /// Shared state, for inspection.
    pub fn context(&self) -> &Arc<SchedulerContext> {
        &self.ctx
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Start the bid tracker, quota tracker and submission consumer.
    ///
    /// Returns `Ok(false)` if they were already started. Fails without
    /// starting anything if no signer is authenticated.
    pub fn start(&self) -> Result<bool, SchedulerError> {
        if !self.collaborators.session.is_authenticated() {
            return Err(SchedulerError::NotAuthenticated);
        }
        if self.started.swap(true, Ordering::AcqRel) {
            return Ok(false);
        }

        let bids = BidTracker::new(
            Arc::clone(&self.ctx),
            Arc::clone(&self.collaborators.settlement),
            Arc::clone(&self.collaborators.session),
            self.config.clone(),
        );
        let quota = QuotaTracker::new(
            Arc::clone(&self.ctx),
            Arc::clone(&self.collaborators.balance),
            self.config.clone(),
        );
        let consumer = self
            .submitter
            .consumer(Arc::clone(&self.collaborators.signer));

        let mut services = self.services.lock();
        services.push(tokio::spawn(async move {
            if let Err(e) = bids.run().await {
                error!(error = %e, "Bid tracker exited");
            }
        }));
        services.push(tokio::spawn(quota.run()));
        services.push(tokio::spawn(consumer.run()));

        info!("Scheduler services started");
        Ok(true)
    }

    /// List the directory once and start a capacity tracker for every
    /// eligible provider never seen before. Returns the providers started.
    pub async fn poll_directory_once(&self) -> Result<Vec<ProviderId>, SchedulerError> {
        if !self.collaborators.session.is_authenticated() {
            return Err(SchedulerError::NotAuthenticated);
        }

        let providers = self.collaborators.directory.list_providers().await?;
        let mut started = Vec::new();
        for info in providers {
            if !info.is_claimable(self.config.min_collateral) {
                continue;
            }
            if !self.ctx.mark_seen(&info.id) {
                continue;
            }
            info!(provider = %info.id, collateral = %info.collateral, "Starting capacity tracker");
            self.spawn_tracker(info.id.clone());
            started.push(info.id);
        }
        Ok(started)
    }

    fn spawn_tracker(&self, provider: ProviderId) {
        let tracker = CapacityTracker::new(
            provider.clone(),
            Arc::clone(&self.ctx),
            Arc::clone(&self.collaborators.capacity),
            Arc::clone(&self.collaborators.session),
            self.submitter.clone(),
            self.config.clone(),
        );
        let handle = tokio::spawn(async move {
            tracker.run().await;
        });
        self.ctx.track_monitor(provider, handle);
    }

    /// Start services, then poll the directory forever.
    pub async fn run(&self) -> Result<(), SchedulerError> {
        self.start()?;
        loop {
            if let Err(e) = self.poll_directory_once().await {
                warn!(error = %e, "Directory poll failed");
            }
            tokio::time::sleep(self.config.directory_poll_interval).await;
        }
    }

    /// Stop every task: close the submission channel, abort the monitors and
    /// services.
    pub fn shutdown(&self) {
        self.submitter.channel().close();
        self.ctx.abort_monitors();
        for handle in self.services.lock().drain(..) {
            handle.abort();
        }
        info!("Scheduler shut down");
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.ctx.abort_monitors();
        for handle in self.services.get_mut().drain(..) {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capclaim_core::CollaboratorError;
    use capclaim_test_helpers::{amount, MockChain};
    use capclaim_types::{Collateral, ProviderStatus};
    use std::time::Duration;
    use tracing::Instrument;
    use tracing_test::traced_test;

    const RICH: Collateral = Collateral(50_000_000_000);

    fn scheduler(chain: &Arc<MockChain>) -> Scheduler {
        Scheduler::new(
            SchedulerConfig::default(),
            Collaborators::from_single(chain.clone()),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_requires_signer() {
        let chain = Arc::new(MockChain::new());
        let scheduler = scheduler(&chain);

        assert!(matches!(
            scheduler.start(),
            Err(SchedulerError::NotAuthenticated)
        ));
        assert!(matches!(
            scheduler.poll_directory_once().await,
            Err(SchedulerError::NotAuthenticated)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_services_start_once() {
        let chain = Arc::new(MockChain::new().with_signer("me"));
        let scheduler = scheduler(&chain);

        assert!(scheduler.start().unwrap());
        assert!(!scheduler.start().unwrap());
        assert_eq!(scheduler.services.lock().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_eligible_providers_are_started() {
        let chain = Arc::new(
            MockChain::new()
                .with_signer("me")
                .with_provider("rich", RICH, amount("0.0001"))
                .with_provider("poor", Collateral(10_000_000_000), amount("0.0001"))
                .with_provider("banned", RICH, amount("0.0001")),
        );
        chain.set_status("banned", ProviderStatus::Liquidated);
        let scheduler = scheduler(&chain);

        let started = scheduler.poll_directory_once().await.unwrap();

        assert_eq!(started, vec![ProviderId::new("rich")]);
        assert_eq!(scheduler.context().running_monitors(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_provider_is_never_restarted() {
        let chain = Arc::new(
            MockChain::new()
                .with_signer("me")
                .with_provider("vault", RICH, amount("0.0001")),
        );
        let scheduler = scheduler(&chain);

        assert_eq!(scheduler.poll_directory_once().await.unwrap().len(), 1);
        assert!(scheduler.poll_directory_once().await.unwrap().is_empty());

        // Collateral drains: the tracker drops the provider and exits.
        chain.set_collateral("vault", Collateral::ZERO);
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(!scheduler.context().is_tracked(&ProviderId::new("vault")));
        assert_eq!(scheduler.context().running_monitors(), 0);

        // Refunded and eligible again, but it was already seen.
        chain.set_collateral("vault", RICH);
        assert!(scheduler.poll_directory_once().await.unwrap().is_empty());
        assert_eq!(scheduler.context().seen_count(), 1);
        assert!(!scheduler.context().is_tracked(&ProviderId::new("vault")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_directory_failure_is_reported() {
        let chain = Arc::new(MockChain::new().with_signer("me"));
        chain.set_directory_error(Some(CollaboratorError::Unavailable("down".into())));
        let scheduler = scheduler(&chain);

        assert!(matches!(
            scheduler.poll_directory_once().await,
            Err(SchedulerError::Collaborator(CollaboratorError::Unavailable(_)))
        ));
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn test_run_survives_directory_failure() {
        let chain = Arc::new(
            MockChain::new()
                .with_signer("me")
                .with_provider("vault", RICH, amount("0.0001")),
        );
        chain.set_directory_error(Some(CollaboratorError::Unavailable("down".into())));
        let scheduler = Arc::new(scheduler(&chain));
        let handle = tokio::spawn(
            {
                let scheduler = Arc::clone(&scheduler);
                async move { scheduler.run().await }
            }
            .in_current_span(),
        );

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(logs_contain("Directory poll failed"));
        assert_eq!(scheduler.context().seen_count(), 0);

        // Recovered on the next poll.
        chain.set_directory_error(None);
        tokio::time::sleep(scheduler.config().directory_poll_interval).await;
        assert_eq!(scheduler.context().seen_count(), 1);

        scheduler.shutdown();
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_claims_from_discovered_provider() {
        let chain = Arc::new(
            MockChain::new()
                .with_signer("me")
                .with_quota(amount("1"))
                .with_provider("vault", RICH, amount("0.05")),
        );
        let scheduler = Arc::new(scheduler(&chain));
        let handle = tokio::spawn({
            let scheduler = Arc::clone(&scheduler);
            async move { scheduler.run().await }
        });

        chain.wait_for_submissions(1).await;
        let submitted = &chain.submissions()[0];
        assert_eq!(submitted.claim.provider, ProviderId::new("vault"));
        assert_eq!(submitted.claim.amount, amount("0.05"));

        scheduler.shutdown();
        handle.abort();
    }
}
