//! reqwest-backed implementation of the collaborator traits.

use super::types::{
    BalanceResponse, BidsResponse, CapacityResponse, ClaimCall, ClaimStatusResponse,
    CollateralResponse, ProviderEntry, SubmitClaimRequest, SubmitClaimResponse,
};
use crate::config::GatewayConfig;
use async_trait::async_trait;
use capclaim_core::{
    BalanceOracle, CapacityOracle, ClaimBuilder, CollaboratorError, CollaboratorResult,
    Directory, SettlementQueue, Session, Signer, StatusSender, StatusSubscription,
};
use capclaim_types::{
    AccountAddress, Amount, BidValue, ClaimRequest, Collateral, CompetingBids, ProviderId,
    ProviderInfo, ProviderStatus, SettlementStatus,
};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Decimal places kept when converting a balance into quota.
const QUOTA_DECIMALS: u32 = 4;

/// Method name encoded into every claim payload.
const CLAIM_METHOD: &str = "claim_capacity";

/// Errors constructing a [`GatewayClient`].
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

/// Convert a governance-token balance into claimable quota at `rate` tokens
/// per unit, truncated to four decimals. A zero rate yields zero quota.
pub fn balance_to_quota(balance: Amount, rate: u64) -> Amount {
    balance
        .base_units()
        .checked_div(rate)
        .map(Amount::from_base_units)
        .unwrap_or(Amount::ZERO)
        .truncate_to(QUOTA_DECIMALS)
}

fn parse_units(text: &str, what: &str) -> CollaboratorResult<u128> {
    text.trim()
        .parse::<u128>()
        .map_err(|e| CollaboratorError::Decode(format!("{what} {text:?}: {e}")))
}

/// Whether polling can stop after `status`.
fn is_final(status: SettlementStatus) -> bool {
    matches!(
        status,
        SettlementStatus::Finalized
            | SettlementStatus::Dropped
            | SettlementStatus::Invalid
            | SettlementStatus::FinalityTimeout
    )
}

/// Client for the settlement gateway.
///
/// Cheap to clone; all clones share one connection pool.
#[derive(Clone)]
pub struct GatewayClient {
    http: reqwest::Client,
    base_url: String,
    signer: Option<AccountAddress>,
    status_poll_interval: Duration,
    quota_rate: u64,
}

impl GatewayClient {
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            signer: config.signer.clone().map(AccountAddress::new),
            status_poll_interval: config.status_poll_interval,
            quota_rate: config.quota_rate,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> CollaboratorResult<T> {
        let status = response.status();
        if status.is_server_error() {
            return Err(CollaboratorError::Unavailable(format!("HTTP {status}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::Rejected(format!("HTTP {status}: {body}")));
        }
        response
            .json()
            .await
            .map_err(|e| CollaboratorError::Decode(e.to_string()))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> CollaboratorResult<T> {
        let response = self
            .http
            .get(self.url(path))
            .send()
            .await
            .map_err(|e| CollaboratorError::Unavailable(e.to_string()))?;
        Self::decode(response).await
    }

    fn require_signer(&self) -> CollaboratorResult<&AccountAddress> {
        self.signer
            .as_ref()
            .ok_or_else(|| CollaboratorError::Rejected("no signer configured".to_string()))
    }

    async fn fetch_status(&self, hash: &str) -> CollaboratorResult<SettlementStatus> {
        let response: ClaimStatusResponse = self.get_json(&format!("/claims/{hash}/status")).await?;
        Ok(response.status)
    }

    /// Poll a claim's status until it is final or nobody listens any more.
    /// Only changes are forwarded.
    async fn follow_status(self, hash: String, tx: StatusSender) {
        let mut last = None;
        while !tx.is_closed() {
            tokio::time::sleep(self.status_poll_interval).await;
            let status = match self.fetch_status(&hash).await {
                Ok(status) => status,
                Err(e) => {
                    debug!(hash = %hash, error = %e, "Status poll failed");
                    continue;
                }
            };
            if last == Some(status) {
                continue;
            }
            last = Some(status);
            trace!(hash = %hash, %status, "Claim status changed");
            if !tx.send(status) || is_final(status) {
                break;
            }
        }
    }
}

#[async_trait]
impl Directory for GatewayClient {
    async fn list_providers(&self) -> CollaboratorResult<Vec<ProviderInfo>> {
        let entries: Vec<ProviderEntry> = self.get_json("/providers").await?;
        let mut providers = Vec::with_capacity(entries.len());
        for entry in entries {
            let Some(status) = ProviderStatus::from_code(entry.status) else {
                warn!(provider = %entry.id, code = entry.status, "Unknown provider status");
                continue;
            };
            let collateral = Collateral(parse_units(&entry.collateral, "collateral")?);
            providers.push(ProviderInfo::new(entry.id.as_str(), status, collateral));
        }
        Ok(providers)
    }
}

#[async_trait]
impl CapacityOracle for GatewayClient {
    async fn issuable_capacity(&self, provider: &ProviderId) -> CollaboratorResult<Amount> {
        let response: CapacityResponse = self
            .get_json(&format!("/providers/{provider}/capacity"))
            .await?;
        Ok(response.capacity)
    }

    async fn backing_collateral(&self, provider: &ProviderId) -> CollaboratorResult<Collateral> {
        let response: CollateralResponse = self
            .get_json(&format!("/providers/{provider}/collateral"))
            .await?;
        Ok(Collateral(parse_units(&response.collateral, "collateral")?))
    }
}

#[async_trait]
impl BalanceOracle for GatewayClient {
    async fn remaining_quota(&self) -> CollaboratorResult<Amount> {
        let signer = self.require_signer()?;
        let response: BalanceResponse = self
            .get_json(&format!("/accounts/{signer}/balance"))
            .await?;
        Ok(balance_to_quota(response.balance, self.quota_rate))
    }
}

#[async_trait]
impl SettlementQueue for GatewayClient {
    async fn competing_bids(&self, exclude: &AccountAddress) -> CollaboratorResult<CompetingBids> {
        let response = self
            .http
            .get(self.url("/settlement/bids"))
            .query(&[("exclude", exclude.as_str())])
            .send()
            .await
            .map_err(|e| CollaboratorError::Unavailable(e.to_string()))?;
        let response: BidsResponse = Self::decode(response).await?;

        let bids = response
            .bids
            .iter()
            .map(|bid| parse_units(bid, "bid").map(BidValue))
            .collect::<CollaboratorResult<Vec<_>>>()?;
        Ok(CompetingBids::from_bids(bids))
    }
}

impl ClaimBuilder for GatewayClient {
    fn build_claim(
        &self,
        provider: &ProviderId,
        amount: Amount,
    ) -> CollaboratorResult<ClaimRequest> {
        let call = ClaimCall {
            method: CLAIM_METHOD.to_string(),
            provider: provider.clone(),
            amount,
        };
        let payload =
            serde_json::to_vec(&call).map_err(|e| CollaboratorError::Rejected(e.to_string()))?;
        Ok(ClaimRequest {
            provider: provider.clone(),
            amount,
            payload,
        })
    }
}

#[async_trait]
impl Signer for GatewayClient {
    async fn submit(
        &self,
        claim: &ClaimRequest,
        bid: BidValue,
    ) -> CollaboratorResult<StatusSubscription> {
        let signer = self.require_signer()?;
        let request = SubmitClaimRequest {
            signer: signer.to_string(),
            payload_hex: hex::encode(&claim.payload),
            bid: bid.get().to_string(),
        };
        let response = self
            .http
            .post(self.url("/claims"))
            .json(&request)
            .send()
            .await
            .map_err(|e| CollaboratorError::Unavailable(e.to_string()))?;
        let response: SubmitClaimResponse = Self::decode(response).await?;

        if !response.accepted {
            return Err(CollaboratorError::Rejected(
                response
                    .error
                    .unwrap_or_else(|| "claim not accepted".to_string()),
            ));
        }
        debug!(hash = %response.hash, provider = %claim.provider, %bid, "Claim accepted");

        let (tx, subscription) = StatusSubscription::channel();
        tokio::spawn(self.clone().follow_status(response.hash, tx));
        Ok(subscription)
    }
}

impl Session for GatewayClient {
    fn signer_address(&self) -> Option<AccountAddress> {
        self.signer.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(signer: Option<&str>) -> GatewayConfig {
        GatewayConfig {
            // Nothing listens on port 1.
            url: "http://127.0.0.1:1/".to_string(),
            signer: signer.map(str::to_string),
            ..GatewayConfig::default()
        }
    }

    #[test]
    fn test_balance_to_quota() {
        let balance: Amount = "100000".parse().unwrap();
        // 100000 / 33400 = 2.99401197... -> 2.994
        assert_eq!(balance_to_quota(balance, 33_400).to_string(), "2.994");
        assert_eq!(balance_to_quota(balance, 0), Amount::ZERO);
        assert_eq!(balance_to_quota(Amount::ZERO, 33_400), Amount::ZERO);
    }

    #[test]
    fn test_final_statuses() {
        assert!(is_final(SettlementStatus::Finalized));
        assert!(is_final(SettlementStatus::Invalid));
        assert!(!is_final(SettlementStatus::Broadcast));
        assert!(!is_final(SettlementStatus::InBlock));
    }

    #[test]
    fn test_decode_wire_types() {
        let providers: Vec<ProviderEntry> = serde_json::from_str(
            r#"[{"id": "5Fvault", "status": 0, "collateral": "40000000000"}]"#,
        )
        .unwrap();
        assert_eq!(providers[0].id, "5Fvault");
        assert_eq!(
            parse_units(&providers[0].collateral, "collateral").unwrap(),
            40_000_000_000
        );

        let capacity: CapacityResponse =
            serde_json::from_str(r#"{"capacity": "0.05"}"#).unwrap();
        assert_eq!(capacity.capacity.to_string(), "0.05");

        let bids: BidsResponse = serde_json::from_str("{}").unwrap();
        assert!(bids.bids.is_empty());

        let status: ClaimStatusResponse =
            serde_json::from_str(r#"{"status": "in_block"}"#).unwrap();
        assert_eq!(status.status, SettlementStatus::InBlock);

        let rejected: SubmitClaimResponse =
            serde_json::from_str(r#"{"accepted": false, "error": "stale nonce"}"#).unwrap();
        assert!(!rejected.accepted);
        assert_eq!(rejected.error.as_deref(), Some("stale nonce"));
    }

    #[test]
    fn test_parse_units_rejects_garbage() {
        assert!(matches!(
            parse_units("12.5", "bid"),
            Err(CollaboratorError::Decode(_))
        ));
        assert_eq!(parse_units(" 7 ", "bid").unwrap(), 7);
    }

    #[test]
    fn test_claim_payload_encodes_call() {
        let client = GatewayClient::new(&config(Some("alice"))).unwrap();
        let claim = client
            .build_claim(&ProviderId::new("vault"), "0.1".parse().unwrap())
            .unwrap();

        let call: ClaimCall = serde_json::from_slice(&claim.payload).unwrap();
        assert_eq!(call.method, CLAIM_METHOD);
        assert_eq!(call.provider, ProviderId::new("vault"));
        assert_eq!(call.amount, claim.amount);
    }

    #[test]
    fn test_session_reflects_signer() {
        let client = GatewayClient::new(&config(Some("alice"))).unwrap();
        assert_eq!(client.signer_address(), Some(AccountAddress::new("alice")));
        assert_eq!(client.url("/providers"), "http://127.0.0.1:1/providers");

        let anonymous = GatewayClient::new(&config(None)).unwrap();
        assert!(!anonymous.is_authenticated());
    }

    #[tokio::test]
    async fn test_quota_requires_signer() {
        let client = GatewayClient::new(&config(None)).unwrap();
        assert!(matches!(
            client.remaining_quota().await,
            Err(CollaboratorError::Rejected(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_gateway_is_unavailable() {
        let client = GatewayClient::new(&config(Some("alice"))).unwrap();
        assert!(matches!(
            client.list_providers().await,
            Err(CollaboratorError::Unavailable(_))
        ));
    }
}
