//! Simulation of the claim scheduler against an in-process chain.
//!
//! [`SimulatedChain`] implements every collaborator trait over a seeded world
//! in which provider capacity refills at random, providers get liquidated and
//! competing bidders come and go. [`SimulationRunner`] wires a real
//! [`Scheduler`](capclaim_node::Scheduler) to it and reports what happened.
//!
//! ```text
//! ┌──────────────────────── SimulationRunner ───────────────────────┐
//! │                                                                 │
//! │   ticker ──tick()──► SimulatedChain ◄──collaborator calls──┐    │
//! │                        │  providers, quota, competitors    │    │
//! │                        │  pending claims                   │    │
//! │                        ▼                                   │    │
//! │                   SimulationStats                      Scheduler│
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Given the same seed the world evolves identically per tick; how the
//! scheduler's tasks interleave with the ticks still depends on the runtime.

mod chain;
mod config;
mod runner;

pub use chain::{SimulatedChain, SimulationStats};
pub use config::SimulationConfig;
pub use runner::{SimulationReport, SimulationRunner};
