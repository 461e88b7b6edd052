//! Provider directory entries.

use crate::{Collateral, ProviderId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a provider as reported by the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderStatus {
    /// Accepting claims.
    Active,
    /// Registered but not accepting claims.
    Inactive,
    /// Collateral seized; never accepts claims again.
    Liquidated,
}

impl ProviderStatus {
    /// Map the numeric status code used on chain (0 = Active, 1 = Inactive,
    /// 2 = Liquidated).
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(ProviderStatus::Active),
            1 => Some(ProviderStatus::Inactive),
            2 => Some(ProviderStatus::Liquidated),
            _ => None,
        }
    }
}

impl fmt::Display for ProviderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderStatus::Active => f.write_str("active"),
            ProviderStatus::Inactive => f.write_str("inactive"),
            ProviderStatus::Liquidated => f.write_str("liquidated"),
        }
    }
}

/// A provider as listed by the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderInfo {
    /// Provider identity.
    pub id: ProviderId,
    /// Current status.
    pub status: ProviderStatus,
    /// Backing collateral at listing time.
    pub collateral: Collateral,
}

impl ProviderInfo {
    /// Create a directory entry.
    pub fn new(id: impl Into<ProviderId>, status: ProviderStatus, collateral: Collateral) -> Self {
        Self {
            id: id.into(),
            status,
            collateral,
        }
    }

    /// Whether the scheduler should start monitoring this provider.
    pub fn is_claimable(&self, min_collateral: Collateral) -> bool {
        self.status == ProviderStatus::Active && self.collateral > min_collateral
    }
}
