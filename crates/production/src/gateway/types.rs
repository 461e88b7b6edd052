//! Wire types for the gateway's JSON API.

use capclaim_types::{Amount, ProviderId, SettlementStatus};
use serde::{Deserialize, Serialize};

/// One entry of `GET /providers`.
#[derive(Debug, Deserialize)]
pub struct ProviderEntry {
    pub id: String,
    /// On-chain status code (0 = active).
    pub status: u8,
    /// Collateral in smallest units, as a decimal string.
    pub collateral: String,
}

/// Response from `GET /providers/{id}/capacity`.
#[derive(Debug, Deserialize)]
pub struct CapacityResponse {
    pub capacity: Amount,
}

/// Response from `GET /providers/{id}/collateral`.
#[derive(Debug, Deserialize)]
pub struct CollateralResponse {
    pub collateral: String,
}

/// Response from `GET /accounts/{address}/balance`.
#[derive(Debug, Deserialize)]
pub struct BalanceResponse {
    /// Governance-token balance.
    pub balance: Amount,
}

/// Response from `GET /settlement/bids`.
#[derive(Debug, Deserialize)]
pub struct BidsResponse {
    /// Pending bids of other accounts, as decimal strings.
    #[serde(default)]
    pub bids: Vec<String>,
}

/// The call encoded into a claim's payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimCall {
    pub method: String,
    pub provider: ProviderId,
    pub amount: Amount,
}

/// Request to `POST /claims`.
#[derive(Debug, Serialize)]
pub struct SubmitClaimRequest {
    pub signer: String,
    pub payload_hex: String,
    pub bid: String,
}

/// Response from `POST /claims`.
#[derive(Debug, Deserialize)]
pub struct SubmitClaimResponse {
    pub accepted: bool,
    #[serde(default)]
    pub hash: String,
    pub error: Option<String>,
}

/// Response from `GET /claims/{hash}/status`.
#[derive(Debug, Deserialize)]
pub struct ClaimStatusResponse {
    pub status: SettlementStatus,
}
