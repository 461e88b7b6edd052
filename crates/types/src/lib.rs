//! Core types for capacity claiming.
//!
//! Everything here is plain data shared by the trackers, the batch builder
//! and the submitter. Amounts are fixed-point so capping and summing are
//! exact; bids and collateral are raw integers in their chain units.

mod amount;
mod bid;
mod claim;
mod identifiers;
mod provider;
mod status;

pub use amount::{
    Amount, AmountParseError, BidValue, Collateral, AMOUNT_DECIMALS, AMOUNT_SCALE,
};
pub use bid::{CompetingBidState, CompetingBids};
pub use claim::{ClaimCandidate, ClaimRequest, InFlightSubmission};
pub use identifiers::{AccountAddress, ProviderId, SubmissionTicket, TicketCounter};
pub use provider::{ProviderInfo, ProviderStatus};
pub use status::SettlementStatus;
