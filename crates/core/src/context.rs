//! Shared scheduler state.
//!
//! Every piece of state the loops share lives here, behind one `Arc`:
//!
//! ```text
//! CapacityTracker (per provider) ──► capacities ──┐
//! QuotaTracker ─────────────────────► quota ──────┼──► BatchRequestBuilder
//! BidTracker ───────────────────────► bids ───────┘            │
//!                                                              ▼
//!                                        in_flight ◄── AuctionSubmitter
//! ```
//!
//! Locks are `parking_lot` and are never held across an `.await`.

use crate::error::SkipReason;
use capclaim_types::{
    Amount, BidValue, CompetingBidState, InFlightSubmission, ProviderId, SubmissionTicket,
    TicketCounter,
};
use dashmap::DashSet;
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::task::JoinHandle;

/// Handle of a spawned per-provider monitor.
#[derive(Debug)]
pub struct MonitorHandle {
    /// Provider being monitored.
    pub provider: ProviderId,
    /// The monitor task.
    pub handle: JoinHandle<()>,
}

/// State shared by every scheduler component.
#[derive(Debug, Default)]
pub struct SchedulerContext {
    /// Last observed capacity per tracked provider, in first-tracked order.
    capacities: RwLock<IndexMap<ProviderId, Amount>>,

    /// Remaining global quota; `None` until the first successful read.
    quota: RwLock<Option<Amount>>,

    /// Competing-bid state, written only by the bid tracker.
    bids: Mutex<CompetingBidState>,

    /// The single in-flight submission.
    in_flight: Mutex<Option<InFlightSubmission>>,

    /// Providers that ever had a monitor started. Append-only.
    seen: DashSet<ProviderId>,

    /// Any tracked provider currently above the dust threshold.
    full_speed: AtomicBool,

    tickets: TicketCounter,

    monitors: Mutex<Vec<MonitorHandle>>,
}

impl SchedulerContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Capacity table
    // ═══════════════════════════════════════════════════════════════════════

    /// Record a provider's capacity and recompute full-speed mode.
    ///
    /// Returns the new full-speed flag.
    pub fn record_capacity(&self, provider: &ProviderId, capacity: Amount, dust: Amount) -> bool {
        let mut capacities = self.capacities.write();
        match capacities.get_mut(provider) {
            Some(slot) => *slot = capacity,
            None => {
                capacities.insert(provider.clone(), capacity);
            }
        }
        self.refresh_full_speed(&capacities, dust)
    }

    /// Drop a provider from the table and recompute full-speed mode.
    pub fn remove_provider(&self, provider: &ProviderId, dust: Amount) -> bool {
        let mut capacities = self.capacities.write();
        capacities.shift_remove(provider);
        self.refresh_full_speed(&capacities, dust)
    }

    fn refresh_full_speed(&self, capacities: &IndexMap<ProviderId, Amount>, dust: Amount) -> bool {
        let full_speed = capacities.values().any(|c| *c > dust);
        self.full_speed.store(full_speed, Ordering::Release);
        full_speed
    }

    /// Copy of the capacity table.
    pub fn capacity_snapshot(&self) -> IndexMap<ProviderId, Amount> {
        self.capacities.read().clone()
    }

    /// Last capacity recorded for a provider.
    pub fn capacity_of(&self, provider: &ProviderId) -> Option<Amount> {
        self.capacities.read().get(provider).copied()
    }

    /// Whether a provider is in the capacity table.
    pub fn is_tracked(&self, provider: &ProviderId) -> bool {
        self.capacities.read().contains_key(provider)
    }

    /// Whether usable capacity was seen on the last update.
    pub fn is_full_speed(&self) -> bool {
        self.full_speed.load(Ordering::Acquire)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Quota and bids
    // ═══════════════════════════════════════════════════════════════════════

    /// Store the latest global quota.
    pub fn set_quota(&self, quota: Amount) {
        *self.quota.write() = Some(quota);
    }

    /// Latest global quota, if it was ever read.
    pub fn quota(&self) -> Option<Amount> {
        *self.quota.read()
    }

    /// Copy of the competing-bid state.
    pub fn bid_state(&self) -> CompetingBidState {
        *self.bids.lock()
    }

    /// Mutate the competing-bid state in place.
    pub fn update_bid_state<R>(&self, f: impl FnOnce(&mut CompetingBidState) -> R) -> R {
        f(&mut self.bids.lock())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // In-flight slot
    // ═══════════════════════════════════════════════════════════════════════

    /// Copy of the in-flight record.
    pub fn in_flight(&self) -> Option<InFlightSubmission> {
        self.in_flight.lock().clone()
    }

    /// Bid currently in flight, if any.
    pub fn in_flight_bid(&self) -> Option<BidValue> {
        self.in_flight.lock().as_ref().map(|f| f.bid)
    }

    /// Take the slot for a new submission if `bid` strictly outbids the
    /// current occupant.
    pub fn try_take_slot(
        &self,
        total_amount: Amount,
        bid: BidValue,
    ) -> Result<SubmissionTicket, SkipReason> {
        let mut slot = self.in_flight.lock();
        if let Some(current) = slot.as_ref() {
            if bid <= current.bid {
                return Err(SkipReason::NotOutbid {
                    candidate: bid,
                    in_flight: current.bid,
                });
            }
        }
        let ticket = self.tickets.next();
        *slot = Some(InFlightSubmission {
            ticket,
            total_amount,
            bid,
        });
        Ok(ticket)
    }

    /// Free the slot if `ticket` still owns it. Returns whether it did.
    pub fn release_slot(&self, ticket: SubmissionTicket) -> bool {
        let mut slot = self.in_flight.lock();
        if slot.as_ref().is_some_and(|f| f.ticket == ticket) {
            *slot = None;
            true
        } else {
            false
        }
    }

    /// Whether `ticket` currently owns the slot.
    pub fn owns_slot(&self, ticket: SubmissionTicket) -> bool {
        self.in_flight
            .lock()
            .as_ref()
            .is_some_and(|f| f.ticket == ticket)
    }

    /// Raise the in-flight bid of `ticket`. Fails if the ticket lost the slot
    /// or `bid` is not higher.
    pub fn raise_slot_bid(&self, ticket: SubmissionTicket, bid: BidValue) -> bool {
        let mut slot = self.in_flight.lock();
        match slot.as_mut() {
            Some(current) if current.ticket == ticket && bid > current.bid => {
                current.bid = bid;
                true
            }
            _ => false,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Provider seen-set and monitor handles
    // ═══════════════════════════════════════════════════════════════════════

    /// Add a provider to the seen-set. Returns true the first time only.
    pub fn mark_seen(&self, provider: &ProviderId) -> bool {
        self.seen.insert(provider.clone())
    }

    /// Whether a monitor was ever started for the provider.
    pub fn was_seen(&self, provider: &ProviderId) -> bool {
        self.seen.contains(provider)
    }

    /// Number of providers ever monitored.
    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    /// Keep a monitor's handle so it can be joined later.
    pub fn track_monitor(&self, provider: ProviderId, handle: JoinHandle<()>) {
        self.monitors.lock().push(MonitorHandle { provider, handle });
    }

    /// Take every tracked monitor handle.
    pub fn take_monitors(&self) -> Vec<MonitorHandle> {
        std::mem::take(&mut *self.monitors.lock())
    }

    /// Number of monitors whose tasks are still running.
    pub fn running_monitors(&self) -> usize {
        self.monitors
            .lock()
            .iter()
            .filter(|m| !m.handle.is_finished())
            .count()
    }

    /// Abort every tracked monitor.
    pub fn abort_monitors(&self) {
        for monitor in self.monitors.lock().iter() {
            monitor.handle.abort();
        }
    }
}
