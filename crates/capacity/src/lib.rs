//! Capacity and quota tracking.
//!
//! One [`CapacityTracker`] runs per discovered provider and drives claim
//! cycles whenever its provider has usable capacity. A single
//! [`QuotaTracker`] keeps the global quota fresh.

mod quota;
mod tracker;

pub use quota::QuotaTracker;
pub use tracker::{CapacityTracker, StopReason, TrackerStep};
