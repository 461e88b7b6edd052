//! Core of the claim scheduler.
//!
//! Provides the pieces every other crate builds on:
//!
//! - [`Channel`] - multi-producer, single-consumer queue with batch draining
//! - [`SchedulerContext`] - the shared state the loops read and write
//! - [`SchedulerConfig`] - cadences, thresholds and bid sizing constants
//! - Collaborator traits ([`Directory`], [`CapacityOracle`], [`Signer`], ...)
//!   behind which all settlement-layer I/O lives

mod channel;
mod config;
mod context;
mod error;
mod traits;

pub use channel::Channel;
pub use config::SchedulerConfig;
pub use context::{MonitorHandle, SchedulerContext};
pub use error::{ChannelError, CollaboratorError, CollaboratorResult, SchedulerError, SkipReason};
pub use traits::{
    BalanceOracle, CapacityOracle, ClaimBuilder, Collaborators, Directory, SettlementQueue,
    Session, Signer, StatusSender, StatusSubscription,
};
