//! Feed client configuration
//!
//! Every field has a default, so an empty YAML document or an empty environment
//! yields a working configuration pointed at `ws://localhost:8080`.
//!
//! # Environment variables
//!
//! | Variable | Field |
//! |---|---|
//! | `TRAFFICWATCH_ENDPOINT` | `endpoint` |
//! | `TRAFFICWATCH_RECONNECT_DELAY_MS` | `reconnect_delay_ms` |
//! | `TRAFFICWATCH_REGION_SET` | `region_set` (`full` or `diagonal`) |
//! | `TRAFFICWATCH_LOG` | `log_filter` |
//!
//! # Example
//!
//! ```rust
//! use trafficwatch::{FeedConfig, RegionSet};
//!
//! let config = FeedConfig::from_yaml_str("endpoint: ws://cam-07:9000\nregion_set: diagonal\n").unwrap();
//! config.validate().unwrap();
//! assert_eq!(config.region_set, RegionSet::Diagonal);
//! assert_eq!(config.reconnect_delay_ms, 5000);
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::transports::websocket::validate_endpoint;
use crate::types::RegionSet;
use crate::{FeedError, Result};

const ENV_PREFIX: &str = "TRAFFICWATCH_";

/// Endpoint used when none is configured.
pub const DEFAULT_ENDPOINT: &str = "ws://localhost:8080";

/// Feed client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// `ws://` or `wss://` URL of the feed server.
    pub endpoint: String,

    /// Fixed delay between a close and the next connection attempt.
    pub reconnect_delay_ms: u64,

    /// Regions shown in the directional-flow table.
    pub region_set: RegionSet,

    /// `tracing` filter used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            reconnect_delay_ms: 5000,
            region_set: RegionSet::Full,
            log_filter: "info".to_string(),
        }
    }
}

impl FeedConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self { endpoint: endpoint.into(), ..Self::default() }
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_region_set(mut self, region_set: RegionSet) -> Self {
        self.region_set = region_set;
        self
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// Parse YAML. Missing keys take their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml_ng::from_str(yaml).map_err(|e| FeedError::config(format!("invalid YAML: {}", e)))
    }

    /// Load a YAML configuration file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| FeedError::file_error(path.to_path_buf(), e))?;
        debug!(path = %path.display(), "Loaded feed configuration");
        Self::from_yaml_str(&yaml)
    }

    /// Read `TRAFFICWATCH_*` environment variables over the defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name)).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(endpoint) = var("ENDPOINT") {
            config.endpoint = endpoint.trim().to_string();
        }

        if let Some(delay) = var("RECONNECT_DELAY_MS") {
            config.reconnect_delay_ms = delay.trim().parse().map_err(|_| {
                FeedError::config(format!("{}RECONNECT_DELAY_MS must be milliseconds, got '{}'", ENV_PREFIX, delay))
            })?;
        }

        if let Some(region_set) = var("REGION_SET") {
            config.region_set = region_set.parse().map_err(|_| {
                FeedError::config(format!(
                    "{}REGION_SET must be 'full' or 'diagonal', got '{}'",
                    ENV_PREFIX, region_set
                ))
            })?;
        }

        if let Some(filter) = var("LOG") {
            config.log_filter = filter;
        }

        Ok(config)
    }

    /// Check the endpoint URL and the reconnect delay.
    pub fn validate(&self) -> Result<()> {
        validate_endpoint(&self.endpoint)?;

        if self.reconnect_delay_ms == 0 {
            return Err(FeedError::config("reconnect_delay_ms must be greater than zero"));
        }

        Ok(())
    }
}
