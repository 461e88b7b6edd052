//! Claim scheduler.
//!
//! This crate composes the capacity trackers, the bid and quota trackers and
//! the auction submitter into a running scheduler.

mod scheduler;

pub use scheduler::Scheduler;
