//! Telemetry sink port.

use crate::domain::telemetry::TelemetrySnapshot;

/// Receives every telemetry snapshot the collector takes.
///
/// Implementations must not block; heavy work belongs on their own task.
pub trait TelemetrySink: Send + Sync {
    fn observe(&self, snapshot: &TelemetrySnapshot);
}

/// Sink that writes snapshots to the tracing log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl TelemetrySink for LogSink {
    fn observe(&self, snapshot: &TelemetrySnapshot) {
        tracing::info!(
            queue_depth = snapshot.queue_depth,
            active_jobs = snapshot.active_jobs,
            fast_p95_ms = snapshot.fast_p95_ms,
            full_p95_ms = snapshot.full_p95_ms,
            active_edges = snapshot.active_edges,
            calibration_accuracy = snapshot.calibration_accuracy,
            settlements_24h = snapshot.settlements_24h,
            false_positive_proxy = snapshot.false_positive_proxy,
            error_rate = snapshot.error_rate,
            breaker_open = snapshot.circuit_breaker_open,
            "Telemetry snapshot"
        );
    }
}
