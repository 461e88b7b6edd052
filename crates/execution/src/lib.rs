//! Claim construction and submission.
//!
//! - [`BatchRequestBuilder`] picks the one claim worth making from the
//!   capacity table and sizes its bid
//! - [`AuctionSubmitter`] runs a claim cycle around the single in-flight slot
//! - [`SubmissionConsumer`] is the one task that talks to the signer

mod batcher;
mod submitter;

pub use batcher::BatchRequestBuilder;
pub use submitter::{
    AuctionSubmitter, CycleOutcome, LatchSignal, SettlementLatch, SubmissionConsumer,
    SubmissionJob, SubmissionOutcome, SubmissionReport,
};
