//! Seeded in-process chain.

use crate::config::SimulationConfig;
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
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

/// Counters collected while the world runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulationStats {
    /// World ticks elapsed.
    pub ticks: u64,
    /// Claims received from the signer, escalated resubmissions included.
    pub submissions: u64,
    /// Claims included and applied.
    pub included: u64,
    /// Claims dropped after waiting too long.
    pub dropped: u64,
    /// Claims rejected because the provider could not cover them.
    pub invalid: u64,
    /// Total amount claimed by included claims.
    pub claimed: Amount,
    /// Largest single included claim.
    pub largest_claim: Amount,
    /// Providers liquidated.
    pub liquidations: u64,
}

struct Provider {
    id: ProviderId,
    status: ProviderStatus,
    collateral: Collateral,
    capacity: Amount,
}

struct PendingClaim {
    claim: ClaimRequest,
    bid: BidValue,
    age: u32,
    status: StatusSender,
}

struct World {
    rng: ChaCha8Rng,
    providers: Vec<Provider>,
    quota: Amount,
    competitors: Vec<BidValue>,
    pending: Vec<PendingClaim>,
    stats: SimulationStats,
}

/// In-process chain implementing every collaborator trait.
pub struct SimulatedChain {
    config: SimulationConfig,
    signer: AccountAddress,
    world: Mutex<World>,
}

impl SimulatedChain {
    /// Create a world from `config`.
    pub fn new(config: SimulationConfig) -> Self {
        let providers = (0..config.providers)
            .map(|i| Provider {
                id: ProviderId::new(format!("vault-{i}")),
                status: ProviderStatus::Active,
                collateral: config.initial_collateral,
                capacity: config.initial_capacity,
            })
            .collect();
        let world = World {
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            providers,
            quota: config.initial_quota,
            competitors: Vec::new(),
            pending: Vec::new(),
            stats: SimulationStats::default(),
        };
        Self {
            signer: AccountAddress::new(config.signer.clone()),
            config,
            world: Mutex::new(world),
        }
    }

    /// Copy of the counters.
    pub fn stats(&self) -> SimulationStats {
        self.world.lock().stats.clone()
    }

    /// Remaining global quota.
    pub fn quota(&self) -> Amount {
        self.world.lock().quota
    }

    /// Providers whose collateral is gone.
    pub fn liquidated(&self) -> Vec<ProviderId> {
        self.world
            .lock()
            .providers
            .iter()
            .filter(|p| p.collateral.is_zero())
            .map(|p| p.id.clone())
            .collect()
    }

    /// Advance the world by one tick: churn competitors and capacity, then
    /// settle pending claims.
    pub fn tick(&self) {
        let mut guard = self.world.lock();
        let world = &mut *guard;
        world.stats.ticks += 1;

        let rng = &mut world.rng;
        world.competitors.retain(|_| rng.gen_bool(0.5));
        if rng.gen_bool(self.config.competitor_probability) {
            let bid = rng.gen_range(1..=self.config.max_competitor_bid.get().max(1));
            world.competitors.push(BidValue(bid));
        }

        for provider in &mut world.providers {
            if provider.status != ProviderStatus::Active {
                continue;
            }
            if rng.gen_bool(self.config.refill_probability) {
                let refill = rng.gen_range(0..=self.config.max_refill.base_units());
                provider.capacity = provider
                    .capacity
                    .saturating_add(Amount::from_base_units(refill));
            }
            if rng.gen_bool(self.config.liquidation_probability) {
                info!(provider = %provider.id, "Provider liquidated");
                provider.status = ProviderStatus::Liquidated;
                provider.collateral = Collateral::ZERO;
                provider.capacity = Amount::ZERO;
                world.stats.liquidations += 1;
            }
        }

        self.settle_pending(world);
    }

    /// Include at most one pending claim per tick: the highest bid, if it
    /// beats every competitor. The rest age and are eventually dropped.
    fn settle_pending(&self, world: &mut World) {
        let competing_max = world.competitors.iter().copied().max().unwrap_or_default();
        let mut pending = std::mem::take(&mut world.pending);
        pending.sort_by(|a, b| b.bid.cmp(&a.bid));

        let mut included = false;
        for mut tx in pending {
            if !included && tx.bid > competing_max {
                included = true;
                self.include(world, tx);
                continue;
            }
            tx.age += 1;
            if tx.age >= self.config.pending_ttl_ticks {
                tx.status.send(SettlementStatus::Dropped);
                world.stats.dropped += 1;
            } else {
                world.pending.push(tx);
            }
        }
    }

    fn include(&self, world: &mut World, tx: PendingClaim) {
        let amount = tx.claim.amount;
        let covered = world
            .providers
            .iter_mut()
            .find(|p| p.id == tx.claim.provider && p.status == ProviderStatus::Active)
            .filter(|p| p.capacity >= amount && world.quota >= amount);

        let Some(provider) = covered else {
            tx.status.send(SettlementStatus::Invalid);
            world.stats.invalid += 1;
            return;
        };

        provider.capacity = provider.capacity.saturating_sub(amount);
        world.quota = world.quota.saturating_sub(amount);
        world.stats.included += 1;
        world.stats.claimed = world.stats.claimed.saturating_add(amount);
        world.stats.largest_claim = world.stats.largest_claim.max(amount);
        debug!(provider = %tx.claim.provider, %amount, bid = %tx.bid, "Claim included");

        for status in [
            SettlementStatus::Broadcast,
            SettlementStatus::InBlock,
            SettlementStatus::Finalized,
        ] {
            tx.status.send(status);
        }
    }

    fn provider<T>(
        &self,
        id: &ProviderId,
        f: impl FnOnce(&Provider) -> T,
    ) -> CollaboratorResult<T> {
        self.world
            .lock()
            .providers
            .iter()
            .find(|p| &p.id == id)
            .map(f)
            .ok_or_else(|| CollaboratorError::Rejected(format!("unknown provider {id}")))
    }
}

#[async_trait]
impl Directory for SimulatedChain {
    async fn list_providers(&self) -> CollaboratorResult<Vec<ProviderInfo>> {
        Ok(self
            .world
            .lock()
            .providers
            .iter()
            .map(|p| ProviderInfo::new(p.id.clone(), p.status, p.collateral))
            .collect())
    }
}

#[async_trait]
impl CapacityOracle for SimulatedChain {
    async fn issuable_capacity(&self, provider: &ProviderId) -> CollaboratorResult<Amount> {
        self.provider(provider, |p| p.capacity)
    }

    async fn backing_collateral(&self, provider: &ProviderId) -> CollaboratorResult<Collateral> {
        self.provider(provider, |p| p.collateral)
    }
}

#[async_trait]
impl BalanceOracle for SimulatedChain {
    async fn remaining_quota(&self) -> CollaboratorResult<Amount> {
        Ok(self.world.lock().quota)
    }
}

#[async_trait]
impl SettlementQueue for SimulatedChain {
    async fn competing_bids(&self, exclude: &AccountAddress) -> CollaboratorResult<CompetingBids> {
        debug_assert_eq!(exclude, &self.signer);
        Ok(CompetingBids::from_bids(
            self.world.lock().competitors.iter().copied(),
        ))
    }
}

impl ClaimBuilder for SimulatedChain {
    fn build_claim(&self, provider: &ProviderId, amount: Amount) -> CollaboratorResult<ClaimRequest> {
        let payload = serde_json::to_vec(&(provider, amount))
            .map_err(|e| CollaboratorError::Decode(e.to_string()))?;
        Ok(ClaimRequest {
            provider: provider.clone(),
            amount,
            payload,
        })
    }
}

#[async_trait]
impl Signer for SimulatedChain {
    async fn submit(
        &self,
        claim: &ClaimRequest,
        bid: BidValue,
    ) -> CollaboratorResult<StatusSubscription> {
        let (status, subscription) = StatusSubscription::channel();
        status.send(SettlementStatus::Ready);

        let mut world = self.world.lock();
        world.stats.submissions += 1;
        world.pending.push(PendingClaim {
            claim: claim.clone(),
            bid,
            age: 0,
            status,
        });
        Ok(subscription)
    }
}

impl Session for SimulatedChain {
    fn signer_address(&self) -> Option<AccountAddress> {
        Some(self.signer.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet(seed: u64) -> SimulationConfig {
        SimulationConfig::new(seed)
            .with_refill_probability(0.0)
            .with_liquidation_probability(0.0)
            .with_competitor_probability(0.0)
    }

    fn claim(chain: &SimulatedChain, provider: &str, amount: u64) -> ClaimRequest {
        chain
            .build_claim(&ProviderId::new(provider), Amount::from_base_units(amount))
            .unwrap()
    }

    #[test]
    fn test_same_seed_same_world() {
        let a = SimulatedChain::new(SimulationConfig::new(9).with_liquidation_probability(0.2));
        let b = SimulatedChain::new(SimulationConfig::new(9).with_liquidation_probability(0.2));
        for _ in 0..50 {
            a.tick();
            b.tick();
        }
        assert_eq!(a.stats(), b.stats());
        assert_eq!(a.liquidated(), b.liquidated());
    }

    #[tokio::test]
    async fn test_highest_bid_is_included_first() {
        let chain = SimulatedChain::new(quiet(1));
        let low = chain
            .submit(&claim(&chain, "vault-0", 1_000_000), BidValue(10))
            .await
            .unwrap();
        let mut high = chain
            .submit(&claim(&chain, "vault-1", 2_000_000), BidValue(20))
            .await
            .unwrap();
        drop(low);

        chain.tick();

        assert_eq!(high.next().await, Some(SettlementStatus::Ready));
        assert_eq!(high.next().await, Some(SettlementStatus::Broadcast));
        let stats = chain.stats();
        assert_eq!(stats.included, 1);
        assert_eq!(stats.claimed, Amount::from_base_units(2_000_000));
        assert_eq!(
            chain.issuable_capacity(&ProviderId::new("vault-1")).await.unwrap(),
            Amount::from_base_units(3_000_000)
        );
    }

    #[tokio::test]
    async fn test_uncovered_claim_is_invalid() {
        let chain = SimulatedChain::new(quiet(1));
        let mut sub = chain
            .submit(&claim(&chain, "vault-0", 9_000_000), BidValue(5))
            .await
            .unwrap();

        chain.tick();

        assert_eq!(sub.next().await, Some(SettlementStatus::Ready));
        assert_eq!(sub.next().await, Some(SettlementStatus::Invalid));
        assert_eq!(chain.stats().invalid, 1);
    }

    #[tokio::test]
    async fn test_stale_claims_are_dropped() {
        let chain = SimulatedChain::new(quiet(1));
        let mut first = chain
            .submit(&claim(&chain, "vault-0", 1_000), BidValue(50))
            .await
            .unwrap();
        let mut second = chain
            .submit(&claim(&chain, "vault-0", 1_000), BidValue(40))
            .await
            .unwrap();

        for _ in 0..3 {
            chain.tick();
        }

        assert_eq!(first.next().await, Some(SettlementStatus::Ready));
        assert_eq!(first.next().await, Some(SettlementStatus::Broadcast));
        assert_eq!(second.next().await, Some(SettlementStatus::Ready));
        // Included on the second tick once the higher bid was gone.
        assert_eq!(second.next().await, Some(SettlementStatus::Broadcast));
        assert_eq!(chain.stats().dropped, 0);

        // A zero bid never beats an empty queue.
        let mut third = chain
            .submit(&claim(&chain, "vault-0", 1_000), BidValue::ZERO)
            .await
            .unwrap();
        for _ in 0..3 {
            chain.tick();
        }
        assert_eq!(third.next().await, Some(SettlementStatus::Ready));
        assert_eq!(third.next().await, Some(SettlementStatus::Dropped));
        assert_eq!(chain.stats().dropped, 1);
    }
}
