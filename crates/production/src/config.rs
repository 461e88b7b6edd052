//! File configuration for the `capclaim` binary.
//!
//! ```toml
//! [gateway]
//! url = "http://127.0.0.1:8080"
//! signer = "5GrwvaEF..."
//! request_timeout = "5s"
//! quota_rate = 33400
//!
//! [scheduler]
//! max_claim_per_tx = "0.1"
//! directory_poll_interval = "3s"
//!
//! [logging]
//! directory = "logs"
//! filter = "info,capclaim=debug"
//! ```
//!
//! Every section and field is optional. Durations use humantime syntax.

use capclaim_core::SchedulerConfig;
use capclaim_types::{Amount, BidValue, Collateral};
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors loading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

fn duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    humantime::parse_duration(&text).map_err(serde::de::Error::custom)
}

fn opt_duration<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)?
        .map(|text| humantime::parse_duration(&text).map_err(serde::de::Error::custom))
        .transpose()
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CapclaimConfig {
    pub gateway: GatewayConfig,
    pub scheduler: SchedulerOverrides,
    pub logging: LoggingConfig,
}

/// Settlement gateway connection.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatewayConfig {
    /// Base URL of the gateway.
    pub url: String,

    /// Address of the signing account; the scheduler refuses to start
    /// without one.
    pub signer: Option<String>,

    /// Per-request timeout.
    #[serde(deserialize_with = "duration")]
    pub request_timeout: Duration,

    /// How often a submitted claim's status is polled.
    #[serde(deserialize_with = "duration")]
    pub status_poll_interval: Duration,

    /// Governance-token units per claimable unit when converting the
    /// signer's balance into quota.
    pub quota_rate: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8080".to_string(),
            signer: None,
            request_timeout: Duration::from_secs(5),
            status_poll_interval: Duration::from_millis(250),
            quota_rate: 33_400,
        }
    }
}

/// Optional overrides of [`SchedulerConfig`] defaults. Bid and collateral
/// values are plain integers in their chain units.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerOverrides {
    pub max_claim_per_tx: Option<Amount>,
    pub dust_threshold: Option<Amount>,
    pub bid_unit: Option<u64>,
    pub min_collateral: Option<u64>,
    #[serde(deserialize_with = "opt_duration")]
    pub directory_poll_interval: Option<Duration>,
    #[serde(deserialize_with = "opt_duration")]
    pub bid_poll_interval: Option<Duration>,
    #[serde(deserialize_with = "opt_duration")]
    pub quota_poll_interval: Option<Duration>,
    #[serde(deserialize_with = "opt_duration")]
    pub capacity_poll_interval: Option<Duration>,
    #[serde(deserialize_with = "opt_duration")]
    pub unreachable_backoff: Option<Duration>,
    #[serde(deserialize_with = "opt_duration")]
    pub max_submission_wait: Option<Duration>,
    #[serde(deserialize_with = "opt_duration")]
    pub min_cycle: Option<Duration>,
    #[serde(deserialize_with = "opt_duration")]
    pub consumer_poll_interval: Option<Duration>,
    #[serde(deserialize_with = "opt_duration")]
    pub consumer_full_speed_poll_interval: Option<Duration>,
    pub escalation_per_sec: Option<u64>,
}

/// Log output.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Directory for the log file.
    pub directory: PathBuf,
    /// Program name used in the log file name.
    pub program: String,
    /// Filter directives, overridden by `RUST_LOG`.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("logs"),
            program: "capclaim".to_string(),
            filter: "info".to_string(),
        }
    }
}

impl CapclaimConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load the configuration file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Load `path` if it exists, otherwise use defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Scheduler configuration with the file's overrides applied.
    pub fn scheduler_config(&self) -> SchedulerConfig {
        let o = &self.scheduler;
        let mut config = SchedulerConfig::default();
        if let Some(v) = o.max_claim_per_tx {
            config = config.with_max_claim_per_tx(v);
        }
        if let Some(v) = o.dust_threshold {
            config = config.with_dust_threshold(v);
        }
        if let Some(v) = o.bid_unit {
            config = config.with_bid_unit(BidValue(v.into()));
        }
        if let Some(v) = o.min_collateral {
            config = config.with_min_collateral(Collateral(v.into()));
        }
        if let Some(v) = o.directory_poll_interval {
            config = config.with_directory_poll_interval(v);
        }
        if let Some(v) = o.bid_poll_interval {
            config = config.with_bid_poll_interval(v);
        }
        if let Some(v) = o.quota_poll_interval {
            config = config.with_quota_poll_interval(v);
        }
        if let Some(v) = o.capacity_poll_interval {
            config = config.with_capacity_poll_interval(v);
        }
        if let Some(v) = o.unreachable_backoff {
            config = config.with_unreachable_backoff(v);
        }
        if let Some(v) = o.max_submission_wait {
            config = config.with_max_submission_wait(v);
        }
        if let Some(v) = o.min_cycle {
            config = config.with_min_cycle(v);
        }
        if o.consumer_poll_interval.is_some() || o.consumer_full_speed_poll_interval.is_some() {
            let normal = o
                .consumer_poll_interval
                .unwrap_or(config.consumer_poll_interval);
            let full_speed = o
                .consumer_full_speed_poll_interval
                .unwrap_or(config.consumer_full_speed_poll_interval);
            config = config.with_consumer_poll_intervals(normal, full_speed);
        }
        if let Some(v) = o.escalation_per_sec {
            config = config.with_escalation_per_sec(BidValue(v.into()));
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = CapclaimConfig::from_toml_str("").unwrap();
        assert_eq!(config.gateway.quota_rate, 33_400);
        assert_eq!(config.logging.program, "capclaim");

        let scheduler = config.scheduler_config();
        let defaults = SchedulerConfig::default();
        assert_eq!(scheduler.max_claim_per_tx, defaults.max_claim_per_tx);
        assert_eq!(scheduler.min_cycle, defaults.min_cycle);
    }

    #[test]
    fn test_overrides_apply() {
        let config = CapclaimConfig::from_toml_str(
            r#"
            [gateway]
            url = "http://gateway:9000"
            signer = "alice"
            request_timeout = "2s 500ms"

            [scheduler]
            max_claim_per_tx = "0.25"
            bid_unit = 2000000
            min_collateral = 5
            directory_poll_interval = "10s"
            consumer_full_speed_poll_interval = "20ms"
            escalation_per_sec = 0
            "#,
        )
        .unwrap();

        assert_eq!(config.gateway.signer.as_deref(), Some("alice"));
        assert_eq!(config.gateway.request_timeout, Duration::from_millis(2_500));

        let scheduler = config.scheduler_config();
        assert_eq!(scheduler.max_claim_per_tx.to_string(), "0.25");
        assert_eq!(scheduler.bid_unit, BidValue(2_000_000));
        assert_eq!(scheduler.min_collateral, Collateral(5));
        assert_eq!(scheduler.directory_poll_interval, Duration::from_secs(10));
        assert_eq!(
            scheduler.consumer_full_speed_poll_interval,
            Duration::from_millis(20)
        );
        assert_eq!(
            scheduler.consumer_poll_interval,
            SchedulerConfig::default().consumer_poll_interval
        );
        assert_eq!(scheduler.escalation_per_sec, BidValue::ZERO);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(CapclaimConfig::from_toml_str("[scheduler]\nmin_cycle = \"soon\"").is_err());
        assert!(
            CapclaimConfig::from_toml_str("[scheduler]\ndust_threshold = \"0.123456789\"").is_err()
        );
        assert!(CapclaimConfig::from_toml_str("[gateway]\nport = 1").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[logging]\ndirectory = \"/var/log/capclaim\"").unwrap();

        let config = CapclaimConfig::load(file.path()).unwrap();
        assert_eq!(config.logging.directory, PathBuf::from("/var/log/capclaim"));

        let missing = file.path().with_extension("missing");
        assert!(matches!(
            CapclaimConfig::load(&missing),
            Err(ConfigError::Read { .. })
        ));
        assert!(CapclaimConfig::load_or_default(&missing).is_ok());
    }
}
