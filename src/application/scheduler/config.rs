//! Recompute scheduler configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::domain::recompute::RecomputeType;
use crate::error::ConfigError;

/// What the scheduler does when the queue crosses its saturation threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaturationAction {
    /// Refuse new jobs while the queue is saturated.
    RejectNew,
    /// Drop the oldest MEDIUM/LOW jobs to make room.
    #[default]
    PurgeOldest,
    /// Convert queued line-change FULL jobs to FAST.
    DowngradePriority,
}

/// Circuit breaker thresholds.
#[derive(Debug, Clone, Deserialize)]
pub struct BreakerConfig {
    /// Failures within the window that open the global breaker. Defaults to 10.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: usize,
    /// Trailing window for failure counting. Defaults to 300 seconds.
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    /// Recent failures that block a single prop. Defaults to 3.
    #[serde(default = "default_prop_failure_threshold")]
    pub prop_failure_threshold: usize,
}

impl BreakerConfig {
    #[must_use]
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            window_secs: default_window_secs(),
            prop_failure_threshold: default_prop_failure_threshold(),
        }
    }
}

/// Configuration for the recompute scheduler.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Number of worker tasks. Defaults to 4.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Queue capacity. Defaults to 100.
    #[serde(default = "default_queue_max_size")]
    pub queue_max_size: usize,

    /// Fill ratio at which saturation handling runs. Defaults to 0.9.
    #[serde(default = "default_saturation_threshold")]
    pub saturation_threshold: f64,

    #[serde(default)]
    pub saturation_action: SaturationAction,

    /// Share of capacity removed by one purge. Defaults to 0.2.
    #[serde(default = "default_purge_fraction")]
    pub purge_fraction: f64,

    /// Priority boost per second of queue wait. Defaults to 0.05.
    #[serde(default = "default_priority_aging_rate")]
    pub priority_aging_rate: f64,

    /// Per-game debounce window. Defaults to 2000ms.
    #[serde(default = "default_debounce_window_ms")]
    pub debounce_window_ms: u64,

    /// Timeout budget for FAST jobs. Defaults to 400ms.
    #[serde(default = "default_fast_timeout_ms")]
    pub fast_timeout_ms: u64,

    /// Timeout budget for FULL jobs. Defaults to 2500ms.
    #[serde(default = "default_full_timeout_ms")]
    pub full_timeout_ms: u64,

    /// p95 latency objective for FAST jobs. Defaults to 150ms.
    #[serde(default = "default_fast_slo_ms")]
    pub fast_slo_ms: u64,

    /// p95 latency objective for FULL jobs. Defaults to 500ms.
    #[serde(default = "default_full_slo_ms")]
    pub full_slo_ms: u64,

    /// Line moves strictly greater than this upgrade to FULL. Defaults to 0.5.
    #[serde(default = "default_major_line_move_threshold")]
    pub major_line_move_threshold: f64,

    /// Completed jobs kept in history. Defaults to 1000.
    #[serde(default = "default_history_size")]
    pub history_size: usize,

    /// Latency samples kept per recompute type. Defaults to 1000.
    #[serde(default = "default_latency_window")]
    pub latency_window: usize,

    /// Idle workers re-check the queue at this interval. Defaults to 1000ms.
    #[serde(default = "default_idle_poll_ms")]
    pub idle_poll_ms: u64,

    /// TTL of the cached status export. Defaults to 60 seconds.
    #[serde(default = "default_metrics_ttl_secs")]
    pub metrics_ttl_secs: u64,

    #[serde(default)]
    pub breaker: BreakerConfig,
}

impl SchedulerConfig {
    #[must_use]
    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_window_ms)
    }

    #[must_use]
    pub fn timeout_for(&self, recompute_type: RecomputeType) -> Duration {
        match recompute_type {
            RecomputeType::Fast => Duration::from_millis(self.fast_timeout_ms),
            RecomputeType::Full => Duration::from_millis(self.full_timeout_ms),
        }
    }

    #[must_use]
    pub fn slo_for(&self, recompute_type: RecomputeType) -> f64 {
        match recompute_type {
            RecomputeType::Fast => self.fast_slo_ms as f64,
            RecomputeType::Full => self.full_slo_ms as f64,
        }
    }

    #[must_use]
    pub fn metrics_ttl(&self) -> Duration {
        Duration::from_secs(self.metrics_ttl_secs)
    }

    #[must_use]
    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms)
    }

    /// Depth at which saturation handling runs.
    #[must_use]
    pub fn saturation_depth(&self) -> usize {
        (self.queue_max_size as f64 * self.saturation_threshold).floor() as usize
    }

    /// Maximum jobs removed by one purge. Always at least one.
    #[must_use]
    pub fn purge_batch(&self) -> usize {
        ((self.queue_max_size as f64 * self.purge_fraction).floor() as usize).max(1)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::InvalidValue {
                field: "scheduler.workers",
                reason: "must be greater than 0".into(),
            });
        }
        if self.queue_max_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "scheduler.queue_max_size",
                reason: "must be greater than 0".into(),
            });
        }
        if !(self.saturation_threshold > 0.0 && self.saturation_threshold <= 1.0) {
            return Err(ConfigError::InvalidValue {
                field: "scheduler.saturation_threshold",
                reason: "must be within (0, 1]".into(),
            });
        }
        if !(0.0..=1.0).contains(&self.purge_fraction) {
            return Err(ConfigError::InvalidValue {
                field: "scheduler.purge_fraction",
                reason: "must be within [0, 1]".into(),
            });
        }
        if self.priority_aging_rate < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "scheduler.priority_aging_rate",
                reason: "must not be negative".into(),
            });
        }
        if self.fast_timeout_ms == 0 || self.full_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "scheduler.timeout_ms",
                reason: "timeouts must be greater than 0".into(),
            });
        }
        if self.breaker.failure_threshold == 0 || self.breaker.prop_failure_threshold == 0 {
            return Err(ConfigError::InvalidValue {
                field: "scheduler.breaker",
                reason: "failure thresholds must be greater than 0".into(),
            });
        }
        Ok(())
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_max_size: default_queue_max_size(),
            saturation_threshold: default_saturation_threshold(),
            saturation_action: SaturationAction::default(),
            purge_fraction: default_purge_fraction(),
            priority_aging_rate: default_priority_aging_rate(),
            debounce_window_ms: default_debounce_window_ms(),
            fast_timeout_ms: default_fast_timeout_ms(),
            full_timeout_ms: default_full_timeout_ms(),
            fast_slo_ms: default_fast_slo_ms(),
            full_slo_ms: default_full_slo_ms(),
            major_line_move_threshold: default_major_line_move_threshold(),
            history_size: default_history_size(),
            latency_window: default_latency_window(),
            idle_poll_ms: default_idle_poll_ms(),
            metrics_ttl_secs: default_metrics_ttl_secs(),
            breaker: BreakerConfig::default(),
        }
    }
}

const fn default_workers() -> usize {
    4
}

const fn default_queue_max_size() -> usize {
    100
}

const fn default_saturation_threshold() -> f64 {
    0.9
}

const fn default_purge_fraction() -> f64 {
    0.2
}

const fn default_priority_aging_rate() -> f64 {
    0.05
}

const fn default_debounce_window_ms() -> u64 {
    2000
}

const fn default_fast_timeout_ms() -> u64 {
    400
}

const fn default_full_timeout_ms() -> u64 {
    2500
}

const fn default_fast_slo_ms() -> u64 {
    150
}

const fn default_full_slo_ms() -> u64 {
    500
}

const fn default_major_line_move_threshold() -> f64 {
    0.5
}

const fn default_history_size() -> usize {
    1000
}

const fn default_latency_window() -> usize {
    1000
}

const fn default_idle_poll_ms() -> u64 {
    1000
}

const fn default_metrics_ttl_secs() -> u64 {
    60
}

const fn default_failure_threshold() -> usize {
    10
}

const fn default_window_secs() -> u64 {
    300
}

const fn default_prop_failure_threshold() -> usize {
    3
}
