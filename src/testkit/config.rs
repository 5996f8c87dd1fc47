//! Canonical test configurations.
//!
//! Single source of truth for config structs used across tests.

use crate::application::calibration::CalibrationConfig;
use crate::application::scheduler::SchedulerConfig;

/// Scheduler config with a single worker and short idle polling.
///
/// One worker keeps execution order deterministic.
pub fn scheduler() -> SchedulerConfig {
    SchedulerConfig {
        workers: 1,
        idle_poll_ms: 10,
        ..SchedulerConfig::default()
    }
}

/// Scheduler config without debouncing, for tests that submit bursts per game.
pub fn scheduler_without_debounce(workers: usize) -> SchedulerConfig {
    SchedulerConfig {
        workers,
        debounce_window_ms: 0,
        idle_poll_ms: 10,
        ..SchedulerConfig::default()
    }
}

/// Calibration config with the default statistical floor.
pub fn calibration() -> CalibrationConfig {
    CalibrationConfig::default()
}
