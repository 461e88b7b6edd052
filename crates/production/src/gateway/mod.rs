//! HTTP settlement gateway.
//!
//! [`GatewayClient`] implements every collaborator trait over a JSON gateway
//! in front of the settlement layer. Submitted claims are followed by polling
//! their status endpoint.

mod client;
mod types;

pub use client::{balance_to_quota, GatewayClient, GatewayError};
pub use types::{
    BalanceResponse, BidsResponse, CapacityResponse, ClaimCall, ClaimStatusResponse,
    CollateralResponse, ProviderEntry, SubmitClaimRequest, SubmitClaimResponse,
};
