//! Telemetry snapshot consumed by external SLO dashboards.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Point-in-time health of the pipeline.
///
/// Evaluating these values against SLO targets is the consumer's job.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TelemetrySnapshot {
    pub taken_at: Option<DateTime<Utc>>,
    pub queue_depth: usize,
    pub active_jobs: usize,
    pub fast_p95_ms: f64,
    pub full_p95_ms: f64,
    pub active_edges: usize,
    /// Overall calibration accuracy across prop types.
    pub calibration_accuracy: f64,
    /// Predictions settled in the trailing 24 hours.
    pub settlements_24h: usize,
    /// Share of settlements marked as mismatched.
    pub false_positive_proxy: f64,
    /// Failed jobs over executed jobs.
    pub error_rate: f64,
    pub circuit_breaker_open: bool,
}
