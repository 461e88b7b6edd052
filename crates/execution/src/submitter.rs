//! Auction submission: one claim cycle and the single consumer behind it.
//!
//! ```text
//! CapacityTracker ──run_cycle──► AuctionSubmitter ──job──► Channel
//!                                      ▲                      │
//!                                      │ latch                ▼
//!                                      └─────────── SubmissionConsumer ──► Signer
//! ```
//!
//! A cycle takes the in-flight slot, queues a [`SubmissionJob`] and then
//! races the job's settlement latch against `max_submission_wait`. Whichever
//! finishes first ends the cycle and the slot is released, unless a newer
//! submission has taken it in the meantime.

use capclaim_core::{
    Channel, ChannelError, ClaimBuilder, SchedulerConfig, SchedulerContext, SchedulerError,
    Signer, SkipReason, StatusSubscription,
};
use capclaim_types::{BidValue, ClaimCandidate, ClaimRequest, SettlementStatus, SubmissionTicket};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::batcher::BatchRequestBuilder;

// ═══════════════════════════════════════════════════════════════════════════
// Settlement latch
// ═══════════════════════════════════════════════════════════════════════════

/// What ended a submission's wait early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatchSignal {
    /// A status that releases the slot was reported.
    Settled(SettlementStatus),
    /// The job was dropped in favour of a newer one.
    Superseded,
}

/// Resolve-once handle shared between a submission's waiter and whoever
/// reports on it. Later resolutions are ignored.
#[derive(Debug, Clone)]
pub struct SettlementLatch {
    tx: Arc<Mutex<Option<oneshot::Sender<LatchSignal>>>>,
}

impl SettlementLatch {
    /// Create a latch and the receiver its waiter listens on.
    pub fn new() -> (Self, oneshot::Receiver<LatchSignal>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                tx: Arc::new(Mutex::new(Some(tx))),
            },
            rx,
        )
    }

    /// Resolve the latch. Returns true only for the first call.
    pub fn resolve(&self, signal: LatchSignal) -> bool {
        match self.tx.lock().take() {
            Some(tx) => {
                // The waiter may already have given up; the latch is resolved
                // either way.
                let _ = tx.send(signal);
                true
            }
            None => false,
        }
    }

    /// Whether the latch was resolved.
    pub fn is_resolved(&self) -> bool {
        self.tx.lock().is_none()
    }
}

/// A claim queued for the consumer.
#[derive(Debug)]
pub struct SubmissionJob {
    /// Ticket of the slot this job was queued under.
    pub ticket: SubmissionTicket,
    /// The built claim.
    pub claim: ClaimRequest,
    /// Bid the claim was queued with.
    pub bid: BidValue,
    latch: SettlementLatch,
}

// ═══════════════════════════════════════════════════════════════════════════
// Cycle results
// ═══════════════════════════════════════════════════════════════════════════

/// How a submitted claim's wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// A slot-releasing status arrived.
    Settled(SettlementStatus),
    /// Nothing conclusive within `max_submission_wait`.
    TimedOut,
    /// A newer job replaced this one before it was signed.
    Superseded,
}

/// Result of a cycle that reached the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReport {
    /// Ticket the cycle held.
    pub ticket: SubmissionTicket,
    /// What was claimed.
    pub candidate: ClaimCandidate,
    /// How the wait ended.
    pub outcome: SubmissionOutcome,
    /// Whether this cycle freed the slot (false when a newer one owns it).
    pub released_slot: bool,
}

/// Result of one claim cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Nothing was submitted.
    Skipped(SkipReason),
    /// A claim was queued and its wait has ended.
    Submitted(SubmissionReport),
}

// ═══════════════════════════════════════════════════════════════════════════
// Submitter
// ═══════════════════════════════════════════════════════════════════════════

/// Runs claim cycles. Cheap to clone; every capacity tracker holds one.
#[derive(Clone)]
pub struct AuctionSubmitter {
    ctx: Arc<SchedulerContext>,
    claims: Arc<dyn ClaimBuilder>,
    channel: Channel<SubmissionJob>,
    builder: BatchRequestBuilder,
    config: SchedulerConfig,
}

impl AuctionSubmitter {
    /// Create a submitter with a fresh submission channel.
    pub fn new(
        ctx: Arc<SchedulerContext>,
        claims: Arc<dyn ClaimBuilder>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            builder: BatchRequestBuilder::new(&config),
            ctx,
            claims,
            channel: Channel::new(),
            config,
        }
    }

    /// Create the consumer for this submitter's channel. Only one consumer
    /// should ever run.
    pub fn consumer(&self, signer: Arc<dyn Signer>) -> SubmissionConsumer {
        SubmissionConsumer {
            ctx: Arc::clone(&self.ctx),
            channel: self.channel.clone(),
            signer,
            config: self.config.clone(),
        }
    }

    /// The submission channel.
    pub fn channel(&self) -> &Channel<SubmissionJob> {
        &self.channel
    }

    /// Build this cycle's candidate from the shared state.
    pub fn evaluate(&self) -> Result<ClaimCandidate, SkipReason> {
        let capacities = self.ctx.capacity_snapshot();
        self.builder.build(
            &capacities,
            self.ctx.quota(),
            &self.ctx.bid_state(),
            self.ctx.in_flight_bid(),
        )
    }

    /// Run one full cycle. Lasts at least `min_cycle`, whatever the outcome.
    pub async fn run_cycle(&self) -> Result<CycleOutcome, SchedulerError> {
        let (result, _) = tokio::join!(
            self.evaluate_and_submit(),
            tokio::time::sleep(self.config.min_cycle)
        );
        result
    }

    async fn evaluate_and_submit(&self) -> Result<CycleOutcome, SchedulerError> {
        match self.evaluate() {
            Ok(candidate) => self.submit(candidate).await,
            Err(reason) => {
                debug!(%reason, "Claim cycle skipped");
                Ok(CycleOutcome::Skipped(reason))
            }
        }
    }

    /// Take the slot for `candidate`, queue it and wait for the settlement
    /// race.
    pub async fn submit(&self, candidate: ClaimCandidate) -> Result<CycleOutcome, SchedulerError> {
        if !self.ctx.is_tracked(&candidate.provider) {
            return Ok(CycleOutcome::Skipped(SkipReason::ProviderGone(
                candidate.provider,
            )));
        }

        let ticket = match self.ctx.try_take_slot(candidate.total_amount, candidate.bid) {
            Ok(ticket) => ticket,
            Err(reason) => {
                debug!(%reason, "Claim cycle lost the slot race");
                return Ok(CycleOutcome::Skipped(reason));
            }
        };

        let claim = match self.claims.build_claim(&candidate.provider, candidate.amount) {
            Ok(claim) => claim,
            Err(e) => {
                self.ctx.release_slot(ticket);
                return Err(e.into());
            }
        };

        let (latch, settled) = SettlementLatch::new();
        let job = SubmissionJob {
            ticket,
            claim,
            bid: candidate.bid,
            latch,
        };
        if let Err(e) = self.channel.produce(job) {
            self.ctx.release_slot(ticket);
            return Err(e.into());
        }

        info!(
            %ticket,
            provider = %candidate.provider,
            amount = %candidate.amount,
            total = %candidate.total_amount,
            bid = %candidate.bid,
            "Claim queued"
        );

        // A latch dropped unresolved (failed submission) leaves only the timer.
        let outcome = tokio::select! {
            Ok(signal) = settled => match signal {
                LatchSignal::Settled(status) => SubmissionOutcome::Settled(status),
                LatchSignal::Superseded => SubmissionOutcome::Superseded,
            },
            _ = tokio::time::sleep(self.config.max_submission_wait) => SubmissionOutcome::TimedOut,
        };

        let released_slot = self.ctx.release_slot(ticket);
        debug!(%ticket, ?outcome, released_slot, "Claim wait finished");

        Ok(CycleOutcome::Submitted(SubmissionReport {
            ticket,
            candidate,
            outcome,
            released_slot,
        }))
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Consumer
// ═══════════════════════════════════════════════════════════════════════════

struct Pending {
    job: SubmissionJob,
    sent_at: Instant,
    bid: BidValue,
}

/// The single task that signs and sends queued claims.
///
/// Each wake-up drains the channel and submits only the job that still owns
/// the slot. While idle it escalates the bid of the pending submission.
pub struct SubmissionConsumer {
    ctx: Arc<SchedulerContext>,
    channel: Channel<SubmissionJob>,
    signer: Arc<dyn Signer>,
    config: SchedulerConfig,
}

impl SubmissionConsumer {
    /// Consume until the channel is closed.
    pub async fn run(self) {
        info!("Submission consumer started");
        let mut pending: Option<Pending> = None;

        loop {
            let idle = self.config.consumer_poll(self.ctx.is_full_speed());
            tokio::select! {
                batch = self.channel.consume_batch() => match batch {
                    Ok(jobs) => {
                        if let Some(job) = self.collapse(jobs) {
                            if let Some(old) = pending.take() {
                                debug!(ticket = %old.job.ticket, "Sent claim superseded");
                                old.job.latch.resolve(LatchSignal::Superseded);
                            }
                            pending = self.send(job).await;
                        }
                    }
                    Err(ChannelError::Closed) => {
                        info!("Submission channel closed, consumer exiting");
                        return;
                    }
                },
                _ = tokio::time::sleep(idle) => {
                    if let Some(p) = pending.as_mut() {
                        self.escalate(p).await;
                    }
                }
            }

            if let Some(p) = &pending {
                if !self.ctx.owns_slot(p.job.ticket) {
                    p.job.latch.resolve(LatchSignal::Superseded);
                    pending = None;
                }
            }
        }
    }

    /// Keep the job that owns the slot; every other job is superseded.
    fn collapse(&self, jobs: Vec<SubmissionJob>) -> Option<SubmissionJob> {
        let mut latest = None;
        for job in jobs {
            if self.ctx.owns_slot(job.ticket) {
                latest = Some(job);
            } else {
                debug!(ticket = %job.ticket, "Queued claim superseded before signing");
                job.latch.resolve(LatchSignal::Superseded);
            }
        }
        latest
    }

    async fn send(&self, job: SubmissionJob) -> Option<Pending> {
        match self.signer.submit(&job.claim, job.bid).await {
            Ok(subscription) => {
                info!(
                    ticket = %job.ticket,
                    provider = %job.claim.provider,
                    amount = %job.claim.amount,
                    bid = %job.bid,
                    "Claim submitted"
                );
                forward_statuses(job.ticket, subscription, job.latch.clone());
                Some(Pending {
                    bid: job.bid,
                    sent_at: Instant::now(),
                    job,
                })
            }
            Err(e) => {
                // The waiter falls back to its timer.
                error!(ticket = %job.ticket, error = %e, "Claim submission failed");
                None
            }
        }
    }

    /// Resubmit the pending claim with its bid raised by
    /// `escalation_per_sec` times the time since it was first sent.
    async fn escalate(&self, pending: &mut Pending) {
        let rate = self.config.escalation_per_sec;
        if rate == BidValue::ZERO {
            return;
        }

        let elapsed_ms = pending.sent_at.elapsed().as_millis();
        let raise = BidValue(rate.get().saturating_mul(elapsed_ms) / 1_000);
        let bid = pending.job.bid.saturating_add(raise);
        if bid <= pending.bid || !self.ctx.raise_slot_bid(pending.job.ticket, bid) {
            return;
        }

        match self.signer.submit(&pending.job.claim, bid).await {
            Ok(subscription) => {
                info!(
                    ticket = %pending.job.ticket,
                    from = %pending.bid,
                    to = %bid,
                    "Escalated pending claim"
                );
                pending.bid = bid;
                forward_statuses(pending.job.ticket, subscription, pending.job.latch.clone());
            }
            Err(e) => {
                warn!(ticket = %pending.job.ticket, error = %e, "Escalated resubmission failed");
            }
        }
    }
}

fn forward_statuses(
    ticket: SubmissionTicket,
    mut subscription: StatusSubscription,
    latch: SettlementLatch,
) {
    tokio::spawn(async move {
        while let Some(status) = subscription.next().await {
            debug!(%ticket, %status, "Settlement status");
            if status.releases_slot() {
                latch.resolve(LatchSignal::Settled(status));
                return;
            }
            if latch.is_resolved() {
                return;
            }
        }
    });
}
