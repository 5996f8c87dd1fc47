//! Application configuration loading and validation.
//!
//! Provides the main [`Config`] struct that aggregates all component
//! settings. Every field has a default, so an empty file is a valid
//! configuration.
//!
//! # Example
//!
//! ```no_run
//! use edgeguard::infrastructure::config::settings::Config;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("config.toml")?;
//!     config.init_logging();
//!     Ok(())
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use super::logging::LoggingConfig;
use crate::application::calibration::CalibrationConfig;
use crate::application::edge::EdgeConfig;
use crate::application::scheduler::SchedulerConfig;
use crate::application::settlement::SettlementConfig;
use crate::application::telemetry::TelemetryConfig;
use crate::error::{ConfigError, Result};

/// Sizing of the shared metrics cache.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Live entries kept before expired ones are collected. Defaults to 10,000.
    #[serde(default = "default_cache_max_entries")]
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_cache_max_entries(),
        }
    }
}

const fn default_cache_max_entries() -> usize {
    10_000
}

/// Base URLs of the external services behind the HTTP adapters.
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointsConfig {
    /// Valuation engine base URL. Required by `run`.
    #[serde(default)]
    pub valuation_url: Option<String>,

    /// Sports-data base URL for final game results. Required by `run`.
    #[serde(default)]
    pub results_url: Option<String>,

    /// Per-request timeout in milliseconds. Defaults to 5000.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl EndpointsConfig {
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Parsed valuation engine URL.
    #[allow(clippy::result_large_err)]
    pub fn valuation(&self) -> Result<Url> {
        parse_endpoint("endpoints.valuation_url", self.valuation_url.as_deref())
    }

    /// Parsed game results URL.
    #[allow(clippy::result_large_err)]
    pub fn results(&self) -> Result<Url> {
        parse_endpoint("endpoints.results_url", self.results_url.as_deref())
    }

    #[allow(clippy::result_large_err)]
    fn validate(&self) -> Result<()> {
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "endpoints.request_timeout_ms",
                reason: "must be greater than 0".into(),
            }
            .into());
        }
        if self.valuation_url.is_some() {
            self.valuation()?;
        }
        if self.results_url.is_some() {
            self.results()?;
        }
        Ok(())
    }
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            valuation_url: None,
            results_url: None,
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

const fn default_request_timeout_ms() -> u64 {
    5000
}

#[allow(clippy::result_large_err)]
fn parse_endpoint(field: &'static str, raw: Option<&str>) -> Result<Url> {
    let raw = raw.ok_or(ConfigError::MissingField { field })?;
    let url = Url::parse(raw).map_err(|e| ConfigError::InvalidValue {
        field,
        reason: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidValue {
            field,
            reason: format!("unsupported scheme {}", url.scheme()),
        }
        .into());
    }
    Ok(url)
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub edges: EdgeConfig,

    #[serde(default)]
    pub calibration: CalibrationConfig,

    #[serde(default)]
    pub settlement: SettlementConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub endpoints: EndpointsConfig,
}

impl Config {
    /// Parse and validate configuration from TOML text.
    #[allow(clippy::result_large_err)]
    pub fn parse_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    #[allow(clippy::result_large_err)]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse_toml(&content)
    }

    /// Validate every section.
    ///
    /// Endpoint URLs are checked only when present; `run` requires them
    /// separately.
    #[allow(clippy::result_large_err)]
    pub fn validate(&self) -> Result<()> {
        self.scheduler.validate()?;
        self.edges.validate()?;
        self.calibration.validate()?;
        self.settlement.validate()?;
        self.telemetry.validate()?;
        if self.cache.max_entries == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache.max_entries",
                reason: "must be greater than 0".into(),
            }
            .into());
        }
        self.endpoints.validate()
    }

    /// Initialize logging based on configuration.
    pub fn init_logging(&self) {
        self.logging.init();
    }
}
