//! Settlement status reported for a submitted claim.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a submission on the settlement layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementStatus {
    /// Queued behind a nonce gap.
    Future,
    /// Ready for inclusion.
    Ready,
    /// Gossiped to peers.
    Broadcast,
    /// Included in a block.
    InBlock,
    /// Included in a finalized block.
    Finalized,
    /// Dropped from the pool.
    Dropped,
    /// Rejected as invalid.
    Invalid,
    /// The including block was retracted.
    Retracted,
    /// Finality was not reached in time.
    FinalityTimeout,
}

impl SettlementStatus {
    /// Whether this status releases the in-flight slot. Broadcast counts as
    /// terminal: inclusion is not awaited.
    pub fn releases_slot(self) -> bool {
        match self {
            SettlementStatus::Broadcast
            | SettlementStatus::Dropped
            | SettlementStatus::Retracted
            | SettlementStatus::Invalid
            | SettlementStatus::FinalityTimeout => true,
            SettlementStatus::Future
            | SettlementStatus::Ready
            | SettlementStatus::InBlock
            | SettlementStatus::Finalized => false,
        }
    }
}

impl fmt::Display for SettlementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SettlementStatus::Future => "future",
            SettlementStatus::Ready => "ready",
            SettlementStatus::Broadcast => "broadcast",
            SettlementStatus::InBlock => "in_block",
            SettlementStatus::Finalized => "finalized",
            SettlementStatus::Dropped => "dropped",
            SettlementStatus::Invalid => "invalid",
            SettlementStatus::Retracted => "retracted",
            SettlementStatus::FinalityTimeout => "finality_timeout",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_releasing_statuses() {
        let releasing: Vec<_> = [
            SettlementStatus::Future,
            SettlementStatus::Ready,
            SettlementStatus::Broadcast,
            SettlementStatus::InBlock,
            SettlementStatus::Finalized,
            SettlementStatus::Dropped,
            SettlementStatus::Invalid,
            SettlementStatus::Retracted,
            SettlementStatus::FinalityTimeout,
        ]
        .into_iter()
        .filter(|s| s.releases_slot())
        .collect();

        assert_eq!(
            releasing,
            vec![
                SettlementStatus::Broadcast,
                SettlementStatus::Dropped,
                SettlementStatus::Invalid,
                SettlementStatus::Retracted,
                SettlementStatus::FinalityTimeout,
            ]
        );
    }
}
