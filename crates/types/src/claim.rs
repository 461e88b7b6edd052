//! Claim candidates, built requests and the in-flight record.

use crate::{Amount, BidValue, ProviderId, SubmissionTicket};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A claim the batch builder wants submitted this cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimCandidate {
    /// The single provider claimed from.
    pub provider: ProviderId,
    /// Amount claimed from that provider.
    pub amount: Amount,
    /// Sum of cappable amounts over every eligible provider (bid sizing only).
    pub total_amount: Amount,
    /// Priority bid to attach.
    pub bid: BidValue,
}

impl fmt::Display for ClaimCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "claim {} from {} (total {}, bid {})",
            self.amount, self.provider, self.total_amount, self.bid
        )
    }
}

/// A built claim, ready for signing. The payload is opaque to the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimRequest {
    /// Provider the claim draws from.
    pub provider: ProviderId,
    /// Claimed amount.
    pub amount: Amount,
    /// Encoded call, produced and consumed by external collaborators.
    pub payload: Vec<u8>,
}

/// The one submission currently owning the in-flight slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InFlightSubmission {
    /// Ticket of the owning submission.
    pub ticket: SubmissionTicket,
    /// Total amount the bid was sized for.
    pub total_amount: Amount,
    /// Current bid, raised in place by escalation.
    pub bid: BidValue,
}
