//! Production runner for the claim scheduler.
//!
//! - [`gateway`] - HTTP client implementing every collaborator trait
//! - [`config`] - TOML configuration file
//! - [`logging`] - stdout plus per-run log file

pub mod config;
pub mod gateway;
pub mod logging;
