//! Collaborator traits consumed by the scheduler.
//!
//! Everything that talks to the settlement layer sits behind one of these
//! traits so the scheduler can run against a live gateway, the simulated chain
//! or scripted test doubles.
//!
//! # Example
//!
//! ```ignore
//! let collaborators = Collaborators {
//!     directory: Arc::new(gateway.clone()),
//!     capacity: Arc::new(gateway.clone()),
//!     balance: Arc::new(gateway.clone()),
//!     settlement: Arc::new(gateway.clone()),
//!     claims: Arc::new(gateway.clone()),
//!     signer: Arc::new(gateway.clone()),
//!     session: Arc::new(gateway),
//! };
//! let scheduler = Scheduler::new(SchedulerConfig::default(), collaborators);
//! ```

use crate::error::CollaboratorResult;
use async_trait::async_trait;
use capclaim_types::{
    AccountAddress, Amount, BidValue, ClaimRequest, Collateral, CompetingBids, ProviderId,
    ProviderInfo, SettlementStatus,
};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Lists registered providers.
#[async_trait]
pub trait Directory: Send + Sync {
    /// All providers with their status and collateral.
    async fn list_providers(&self) -> CollaboratorResult<Vec<ProviderInfo>>;
}

/// Per-provider capacity queries.
#[async_trait]
pub trait CapacityOracle: Send + Sync {
    /// Amount currently claimable from the provider.
    async fn issuable_capacity(&self, provider: &ProviderId) -> CollaboratorResult<Amount>;

    /// Collateral currently backing the provider.
    async fn backing_collateral(&self, provider: &ProviderId) -> CollaboratorResult<Collateral>;
}

/// Global quota query.
#[async_trait]
pub trait BalanceOracle: Send + Sync {
    /// Amount we can still claim across all providers.
    async fn remaining_quota(&self) -> CollaboratorResult<Amount>;
}

/// View of the pending-submission pool.
#[async_trait]
pub trait SettlementQueue: Send + Sync {
    /// Max and sum of pending, unsettled bids not signed by `exclude`.
    async fn competing_bids(&self, exclude: &AccountAddress) -> CollaboratorResult<CompetingBids>;
}

/// Builds the opaque claim call.
pub trait ClaimBuilder: Send + Sync {
    /// Build a claim of `amount` against `provider`.
    fn build_claim(&self, provider: &ProviderId, amount: Amount)
        -> CollaboratorResult<ClaimRequest>;
}

/// Signs and broadcasts claims.
#[async_trait]
pub trait Signer: Send + Sync {
    /// Submit `claim` with priority `bid`.
    ///
    /// Returns a subscription delivering status updates in order. The
    /// subscription ends when the signer stops reporting.
    async fn submit(
        &self,
        claim: &ClaimRequest,
        bid: BidValue,
    ) -> CollaboratorResult<StatusSubscription>;
}

/// Authentication state.
pub trait Session: Send + Sync {
    /// Address of the authenticated signer, if any.
    fn signer_address(&self) -> Option<AccountAddress>;

    /// Whether a signer is authenticated.
    fn is_authenticated(&self) -> bool {
        self.signer_address().is_some()
    }
}

/// Sending half of a status subscription, held by the signer implementation.
#[derive(Debug, Clone)]
pub struct StatusSender(mpsc::UnboundedSender<SettlementStatus>);

impl StatusSender {
    /// Report a status. Returns false when nobody is listening any more.
    pub fn send(&self, status: SettlementStatus) -> bool {
        self.0.send(status).is_ok()
    }

    /// Whether the subscriber has gone away.
    pub fn is_closed(&self) -> bool {
        self.0.is_closed()
    }
}

/// Stream of settlement statuses for one submission.
#[derive(Debug)]
pub struct StatusSubscription(mpsc::UnboundedReceiver<SettlementStatus>);

impl StatusSubscription {
    /// Create a connected sender/subscription pair.
    pub fn channel() -> (StatusSender, StatusSubscription) {
        let (tx, rx) = mpsc::unbounded_channel();
        (StatusSender(tx), StatusSubscription(rx))
    }

    /// Next status, or `None` once the signer stops reporting.
    pub async fn next(&mut self) -> Option<SettlementStatus> {
        self.0.recv().await
    }
}

/// Every collaborator the scheduler needs, shared behind `Arc`.
#[derive(Clone)]
pub struct Collaborators {
    /// Provider directory.
    pub directory: Arc<dyn Directory>,
    /// Capacity and collateral queries.
    pub capacity: Arc<dyn CapacityOracle>,
    /// Global quota.
    pub balance: Arc<dyn BalanceOracle>,
    /// Competing bids.
    pub settlement: Arc<dyn SettlementQueue>,
    /// Claim call builder.
    pub claims: Arc<dyn ClaimBuilder>,
    /// Signer.
    pub signer: Arc<dyn Signer>,
    /// Session state.
    pub session: Arc<dyn Session>,
}

impl Collaborators {
    /// Use one object for every role.
    pub fn from_single<C>(collaborator: Arc<C>) -> Self
    where
        C: Directory
            + CapacityOracle
            + BalanceOracle
            + SettlementQueue
            + ClaimBuilder
            + Signer
            + Session
            + 'static,
    {
        Self {
            directory: collaborator.clone(),
            capacity: collaborator.clone(),
            balance: collaborator.clone(),
            settlement: collaborator.clone(),
            claims: collaborator.clone(),
            signer: collaborator.clone(),
            session: collaborator,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_status_subscription_delivers_in_order() {
        let (tx, mut sub) = StatusSubscription::channel();
        assert!(tx.send(SettlementStatus::Ready));
        assert!(tx.send(SettlementStatus::Broadcast));
        drop(tx);

        assert_eq!(sub.next().await, Some(SettlementStatus::Ready));
        assert_eq!(sub.next().await, Some(SettlementStatus::Broadcast));
        assert_eq!(sub.next().await, None);
    }

    #[tokio::test]
    async fn test_sender_notices_dropped_subscription() {
        let (tx, sub) = StatusSubscription::channel();
        drop(sub);
        assert!(tx.is_closed());
        assert!(!tx.send(SettlementStatus::Dropped));
    }
}
