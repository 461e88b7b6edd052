//! Error types for the claim scheduler.

use capclaim_types::{BidValue, ProviderId};
use std::fmt;
use thiserror::Error;

/// Channel operation on a closed channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// Produce after close, or consume from a closed and drained channel.
    #[error("channel is closed")]
    Closed,
}

/// Failure reported by an external collaborator (oracle, directory, signer).
///
/// Always treated as transient by the polling loops.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    /// The remote endpoint could not be reached.
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    /// The remote endpoint refused the request.
    #[error("request rejected: {0}")]
    Rejected(String),

    /// The response could not be decoded.
    #[error("malformed response: {0}")]
    Decode(String),
}

/// Result type alias for collaborator calls.
pub type CollaboratorResult<T> = Result<T, CollaboratorError>;

/// Top-level scheduler errors.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// No authenticated signer; nothing can be submitted.
    #[error("no authenticated signer in session")]
    NotAuthenticated,

    /// An external collaborator failed.
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    /// The submission channel is closed.
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// Why a scheduling cycle produced no submission.
///
/// These are policy outcomes, not errors: the cycle is simply retried on the
/// next capacity update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// No tracked provider has capacity above the dust threshold.
    NoEligibleProvider,

    /// The global quota is exhausted.
    QuotaExhausted,

    /// The candidate bid does not strictly exceed the in-flight bid.
    NotOutbid {
        /// Bid the cycle computed.
        candidate: BidValue,
        /// Bid currently in flight.
        in_flight: BidValue,
    },

    /// The provider disappeared from the capacity table mid-cycle.
    ProviderGone(ProviderId),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoEligibleProvider => f.write_str("no provider above dust threshold"),
            SkipReason::QuotaExhausted => f.write_str("global quota exhausted"),
            SkipReason::NotOutbid {
                candidate,
                in_flight,
            } => write!(f, "bid {} does not exceed in-flight {}", candidate, in_flight),
            SkipReason::ProviderGone(id) => write!(f, "provider {} no longer tracked", id),
        }
    }
}
