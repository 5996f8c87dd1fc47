//! Settlement service configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

#[derive(Debug, Clone, Deserialize)]
pub struct SettlementConfig {
    /// How often pending games are polled for results. Defaults to 60 seconds.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Absolute error above this share of the predicted value marks an
    /// outlier. Defaults to 0.5.
    #[serde(default = "default_outlier_error_ratio")]
    pub outlier_error_ratio: f64,

    /// Wrong predictions above this confidence are mismatches. Defaults to 0.8.
    #[serde(default = "default_mismatch_confidence")]
    pub mismatch_confidence: f64,

    /// Settlement records kept for audit queries. Defaults to 10,000.
    #[serde(default = "default_record_retention")]
    pub record_retention: usize,

    /// Window for the recent outlier and mismatch counts. Defaults to one hour.
    #[serde(default = "default_recent_window_secs")]
    pub recent_window_secs: u64,
}

impl SettlementConfig {
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "settlement.poll_interval_secs",
                reason: "must be greater than 0".into(),
            });
        }
        if self.outlier_error_ratio <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "settlement.outlier_error_ratio",
                reason: "must be positive".into(),
            });
        }
        if !(0.0..=1.0).contains(&self.mismatch_confidence) {
            return Err(ConfigError::InvalidValue {
                field: "settlement.mismatch_confidence",
                reason: "must be within [0, 1]".into(),
            });
        }
        Ok(())
    }
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            outlier_error_ratio: default_outlier_error_ratio(),
            mismatch_confidence: default_mismatch_confidence(),
            record_retention: default_record_retention(),
            recent_window_secs: default_recent_window_secs(),
        }
    }
}

const fn default_poll_interval_secs() -> u64 {
    60
}

const fn default_outlier_error_ratio() -> f64 {
    0.5
}

const fn default_mismatch_confidence() -> f64 {
    0.8
}

const fn default_record_retention() -> usize {
    10_000
}

const fn default_recent_window_secs() -> u64 {
    3600
}
