//! Test helpers for capclaim.
//!
//! [`MockChain`] implements every collaborator trait over in-memory state
//! that tests script up front or mutate while the scheduler runs.
//!
//! # Example
//!
//! ```rust,ignore
//! let chain = Arc::new(
//!     MockChain::new()
//!         .with_signer("me")
//!         .with_provider("vault-a", Collateral(1_000), amount("0.02")),
//! );
//! let collaborators = Collaborators::from_single(chain.clone());
//! ```

use async_trait::async_trait;
use capclaim_core::{
    BalanceOracle, CapacityOracle, ClaimBuilder, CollaboratorError, CollaboratorResult,
    Directory, SettlementQueue, Session, Signer, StatusSender, StatusSubscription,
};
use capclaim_types::{
    AccountAddress, Amount, BidValue, ClaimRequest, Collateral, CompetingBids, ProviderId,
    ProviderInfo, ProviderStatus, SettlementStatus,
};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

/// Parse a decimal amount, panicking on bad input.
pub fn amount(s: &str) -> Amount {
    s.parse().expect("valid amount literal")
}

/// A claim the mock signer received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedClaim {
    /// The claim.
    pub claim: ClaimRequest,
    /// Attached bid.
    pub bid: BidValue,
}

#[derive(Default)]
struct ProviderState {
    info: Option<ProviderInfo>,
    capacity: Option<Amount>,
    scripted_capacity: VecDeque<CollaboratorResult<Amount>>,
    collateral: Option<Collateral>,
    capacity_calls: usize,
}

struct State {
    order: Vec<ProviderId>,
    providers: HashMap<ProviderId, ProviderState>,
    directory_error: Option<CollaboratorError>,
    quota: CollaboratorResult<Amount>,
    steady_bids: CompetingBids,
    scripted_bids: VecDeque<CollaboratorResult<CompetingBids>>,
    bid_queries: Vec<AccountAddress>,
    address: Option<AccountAddress>,
    status_script: Vec<SettlementStatus>,
    submit_error: Option<CollaboratorError>,
    submissions: Vec<SubmittedClaim>,
    open_subscriptions: Vec<StatusSender>,
}

/// Scriptable in-memory implementation of every collaborator.
pub struct MockChain {
    state: Mutex<State>,
}

impl Default for MockChain {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChain {
    /// Empty chain: no providers, no signer, zero quota, no competitors, and
    /// every submission reports `Ready` then `Broadcast`.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                order: Vec::new(),
                providers: HashMap::new(),
                directory_error: None,
                quota: Ok(Amount::ZERO),
                steady_bids: CompetingBids::default(),
                scripted_bids: VecDeque::new(),
                bid_queries: Vec::new(),
                address: None,
                status_script: vec![SettlementStatus::Ready, SettlementStatus::Broadcast],
                submit_error: None,
                submissions: Vec::new(),
                open_subscriptions: Vec::new(),
            }),
        }
    }

    /// Authenticate a signer.
    pub fn with_signer(self, address: &str) -> Self {
        self.set_signer(Some(address));
        self
    }

    /// List an active provider with the given collateral and steady capacity.
    pub fn with_provider(self, id: &str, collateral: Collateral, capacity: Amount) -> Self {
        self.list_provider(ProviderInfo::new(id, ProviderStatus::Active, collateral));
        self.set_capacity(id, capacity);
        self
    }

    /// Set the global quota.
    pub fn with_quota(self, quota: Amount) -> Self {
        self.set_quota(Ok(quota));
        self
    }

    /// Statuses reported for every submission.
    pub fn with_status_script(self, script: Vec<SettlementStatus>) -> Self {
        self.state.lock().status_script = script;
        self
    }

    /// Add or replace a directory entry. Collateral queries follow the entry
    /// unless overridden with [`MockChain::set_collateral`].
    pub fn list_provider(&self, info: ProviderInfo) {
        let mut state = self.state.lock();
        if !state.providers.contains_key(&info.id) {
            state.order.push(info.id.clone());
        }
        let id = info.id.clone();
        state.providers.entry(id).or_default().info = Some(info);
    }

    /// Change a listed provider's status.
    pub fn set_status(&self, id: &str, status: ProviderStatus) {
        let mut state = self.state.lock();
        if let Some(info) = state
            .providers
            .get_mut(&ProviderId::new(id))
            .and_then(|p| p.info.as_mut())
        {
            info.status = status;
        }
    }

    /// Steady capacity returned once scripted results run out.
    pub fn set_capacity(&self, id: &str, capacity: Amount) {
        self.provider_mut(id, |p| p.capacity = Some(capacity));
    }

    /// Queue one capacity result ahead of the steady value.
    pub fn push_capacity(&self, id: &str, result: CollaboratorResult<Amount>) {
        self.provider_mut(id, |p| p.scripted_capacity.push_back(result));
    }

    /// Override the collateral reported for a provider.
    pub fn set_collateral(&self, id: &str, collateral: Collateral) {
        self.provider_mut(id, |p| {
            p.collateral = Some(collateral);
            if let Some(info) = p.info.as_mut() {
                info.collateral = collateral;
            }
        });
    }

    /// Make directory listings fail (or succeed again with `None`).
    pub fn set_directory_error(&self, error: Option<CollaboratorError>) {
        self.state.lock().directory_error = error;
    }

    /// Set the quota query result.
    pub fn set_quota(&self, quota: CollaboratorResult<Amount>) {
        self.state.lock().quota = quota;
    }

    /// Steady competing bids returned once scripted results run out.
    pub fn set_bids(&self, bids: CompetingBids) {
        self.state.lock().steady_bids = bids;
    }

    /// Queue one competing-bid result ahead of the steady value.
    pub fn push_bids(&self, result: CollaboratorResult<CompetingBids>) {
        self.state.lock().scripted_bids.push_back(result);
    }

    /// Authenticate or log out.
    pub fn set_signer(&self, address: Option<&str>) {
        self.state.lock().address = address.map(AccountAddress::new);
    }

    /// Make submissions fail (or succeed again with `None`).
    pub fn set_submit_error(&self, error: Option<CollaboratorError>) {
        self.state.lock().submit_error = error;
    }

    /// Every claim submitted so far.
    pub fn submissions(&self) -> Vec<SubmittedClaim> {
        self.state.lock().submissions.clone()
    }

    /// Number of claims submitted so far.
    pub fn submission_count(&self) -> usize {
        self.state.lock().submissions.len()
    }

    /// Number of capacity queries made for a provider.
    pub fn capacity_calls(&self, id: &str) -> usize {
        self.state
            .lock()
            .providers
            .get(&ProviderId::new(id))
            .map(|p| p.capacity_calls)
            .unwrap_or(0)
    }

    /// Addresses passed to competing-bid queries.
    pub fn bid_queries(&self) -> Vec<AccountAddress> {
        self.state.lock().bid_queries.clone()
    }

    /// Report a status on every open subscription.
    pub fn emit_status(&self, status: SettlementStatus) {
        let mut state = self.state.lock();
        state.open_subscriptions.retain(|tx| tx.send(status));
    }

    /// Poll until at least `n` submissions arrived. Use with paused time.
    pub async fn wait_for_submissions(&self, n: usize) {
        while self.submission_count() < n {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    fn provider_mut(&self, id: &str, f: impl FnOnce(&mut ProviderState)) {
        let mut state = self.state.lock();
        let id = ProviderId::new(id);
        if !state.providers.contains_key(&id) {
            state.order.push(id.clone());
        }
        f(state.providers.entry(id).or_default());
    }
}

#[async_trait]
impl Directory for MockChain {
    async fn list_providers(&self) -> CollaboratorResult<Vec<ProviderInfo>> {
        let state = self.state.lock();
        if let Some(err) = &state.directory_error {
            return Err(err.clone());
        }
        Ok(state
            .order
            .iter()
            .filter_map(|id| state.providers.get(id).and_then(|p| p.info.clone()))
            .collect())
    }
}

#[async_trait]
impl CapacityOracle for MockChain {
    async fn issuable_capacity(&self, provider: &ProviderId) -> CollaboratorResult<Amount> {
        let mut state = self.state.lock();
        let Some(p) = state.providers.get_mut(provider) else {
            return Err(CollaboratorError::Unavailable(format!(
                "unknown provider {provider}"
            )));
        };
        p.capacity_calls += 1;
        if let Some(result) = p.scripted_capacity.pop_front() {
            return result;
        }
        p.capacity
            .ok_or_else(|| CollaboratorError::Unavailable(format!("no capacity for {provider}")))
    }

    async fn backing_collateral(&self, provider: &ProviderId) -> CollaboratorResult<Collateral> {
        let state = self.state.lock();
        let p = state
            .providers
            .get(provider)
            .ok_or_else(|| CollaboratorError::Unavailable(format!("unknown provider {provider}")))?;
        Ok(p
            .collateral
            .or_else(|| p.info.as_ref().map(|i| i.collateral))
            .unwrap_or(Collateral::ZERO))
    }
}

#[async_trait]
impl BalanceOracle for MockChain {
    async fn remaining_quota(&self) -> CollaboratorResult<Amount> {
        self.state.lock().quota.clone()
    }
}

#[async_trait]
impl SettlementQueue for MockChain {
    async fn competing_bids(&self, exclude: &AccountAddress) -> CollaboratorResult<CompetingBids> {
        let mut state = self.state.lock();
        state.bid_queries.push(exclude.clone());
        match state.scripted_bids.pop_front() {
            Some(result) => result,
            None => Ok(state.steady_bids),
        }
    }
}

impl ClaimBuilder for MockChain {
    fn build_claim(&self, provider: &ProviderId, amount: Amount) -> CollaboratorResult<ClaimRequest> {
        Ok(ClaimRequest {
            provider: provider.clone(),
            amount,
            payload: format!("issue:{provider}:{amount}").into_bytes(),
        })
    }
}

#[async_trait]
impl Signer for MockChain {
    async fn submit(
        &self,
        claim: &ClaimRequest,
        bid: BidValue,
    ) -> CollaboratorResult<StatusSubscription> {
        let mut state = self.state.lock();
        if let Some(err) = &state.submit_error {
            return Err(err.clone());
        }
        state.submissions.push(SubmittedClaim {
            claim: claim.clone(),
            bid,
        });
        let (tx, subscription) = StatusSubscription::channel();
        for status in &state.status_script {
            tx.send(*status);
        }
        state.open_subscriptions.push(tx);
        Ok(subscription)
    }
}

impl Session for MockChain {
    fn signer_address(&self) -> Option<AccountAddress> {
        self.state.lock().address.clone()
    }
}
