//! Calibration harness configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Configuration for the calibration harness.
#[derive(Debug, Clone, Deserialize)]
pub struct CalibrationConfig {
    /// Settled predictions a prop type needs before bins are derived. Defaults to 30.
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,

    /// Bins need more decided predictions than this to count towards the
    /// mean calibration error. Defaults to 5.
    #[serde(default = "default_bin_min_samples")]
    pub bin_min_samples: usize,

    /// Mean calibration error above this raises an alert. Defaults to 0.15.
    #[serde(default = "default_alert_calibration_error")]
    pub alert_calibration_error: f64,

    /// Accuracy this far below the trailing average raises an alert. Defaults to 0.10.
    #[serde(default = "default_alert_accuracy_drop")]
    pub alert_accuracy_drop: f64,

    /// Metric snapshots kept for the trailing average. Defaults to 100.
    #[serde(default = "default_history_size")]
    pub history_size: usize,

    /// Snapshots needed before accuracy drops are checked. Defaults to 5.
    #[serde(default = "default_history_min_points")]
    pub history_min_points: usize,

    /// Latest settlements used for rolling accuracy. Defaults to 500.
    #[serde(default = "default_rolling_window")]
    pub rolling_window: usize,

    /// Alerts kept for [`recent_alerts`](super::CalibrationHarness::recent_alerts). Defaults to 200.
    #[serde(default = "default_alert_log_size")]
    pub alert_log_size: usize,

    /// Window for the recent prediction count in summaries. Defaults to 7 days.
    #[serde(default = "default_recent_window_hours")]
    pub recent_window_hours: u64,

    /// TTL of the cached metrics export. Defaults to 300 seconds.
    #[serde(default = "default_metrics_ttl_secs")]
    pub metrics_ttl_secs: u64,

    /// TTL of cached alerts. Defaults to one hour.
    #[serde(default = "default_alert_ttl_secs")]
    pub alert_ttl_secs: u64,
}

impl CalibrationConfig {
    #[must_use]
    pub fn metrics_ttl(&self) -> Duration {
        Duration::from_secs(self.metrics_ttl_secs)
    }

    #[must_use]
    pub fn alert_ttl(&self) -> Duration {
        Duration::from_secs(self.alert_ttl_secs)
    }

    #[must_use]
    pub fn recent_window(&self) -> Duration {
        Duration::from_secs(self.recent_window_hours * 3600)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_samples == 0 {
            return Err(ConfigError::InvalidValue {
                field: "calibration.min_samples",
                reason: "must be greater than 0".into(),
            });
        }
        if !(0.0..=1.0).contains(&self.alert_calibration_error)
            || !(0.0..=1.0).contains(&self.alert_accuracy_drop)
        {
            return Err(ConfigError::InvalidValue {
                field: "calibration.alert_thresholds",
                reason: "must be within [0, 1]".into(),
            });
        }
        if self.rolling_window == 0 {
            return Err(ConfigError::InvalidValue {
                field: "calibration.rolling_window",
                reason: "must be greater than 0".into(),
            });
        }
        Ok(())
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            min_samples: default_min_samples(),
            bin_min_samples: default_bin_min_samples(),
            alert_calibration_error: default_alert_calibration_error(),
            alert_accuracy_drop: default_alert_accuracy_drop(),
            history_size: default_history_size(),
            history_min_points: default_history_min_points(),
            rolling_window: default_rolling_window(),
            alert_log_size: default_alert_log_size(),
            recent_window_hours: default_recent_window_hours(),
            metrics_ttl_secs: default_metrics_ttl_secs(),
            alert_ttl_secs: default_alert_ttl_secs(),
        }
    }
}

const fn default_min_samples() -> usize {
    30
}

const fn default_bin_min_samples() -> usize {
    5
}

const fn default_alert_calibration_error() -> f64 {
    0.15
}

const fn default_alert_accuracy_drop() -> f64 {
    0.10
}

const fn default_history_size() -> usize {
    100
}

const fn default_history_min_points() -> usize {
    5
}

const fn default_rolling_window() -> usize {
    500
}

const fn default_alert_log_size() -> usize {
    200
}

const fn default_recent_window_hours() -> u64 {
    7 * 24
}

const fn default_metrics_ttl_secs() -> u64 {
    300
}

const fn default_alert_ttl_secs() -> u64 {
    3600
}
