//! Periodic telemetry snapshots.
//!
//! The collector reads every component, publishes the snapshot on a watch
//! channel for in-process consumers, and hands it to each registered sink.
//! Judging the numbers against SLO targets is left to consumers.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Deserialize;
use tokio::sync::watch;

use crate::application::calibration::CalibrationHarness;
use crate::application::edge::EdgePersistenceModel;
use crate::application::scheduler::RecomputeScheduler;
use crate::application::settlement::SettlementIntegrationService;
use crate::domain::telemetry::TelemetrySnapshot;
use crate::error::ConfigError;
use crate::port::TelemetrySink;

/// Window for the settlement throughput figure.
const SETTLEMENT_WINDOW: Duration = Duration::from_secs(24 * 3600);

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    /// Seconds between snapshots. Defaults to 30.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl TelemetryConfig {
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "telemetry.interval_secs",
                reason: "must be greater than 0".into(),
            });
        }
        Ok(())
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

const fn default_interval_secs() -> u64 {
    30
}

pub struct TelemetryCollector {
    config: TelemetryConfig,
    scheduler: Arc<RecomputeScheduler>,
    edges: Arc<EdgePersistenceModel>,
    calibration: Arc<CalibrationHarness>,
    settlement: Arc<SettlementIntegrationService>,
    sinks: Vec<Arc<dyn TelemetrySink>>,
    tx: watch::Sender<TelemetrySnapshot>,
}

impl TelemetryCollector {
    #[must_use]
    pub fn new(
        config: TelemetryConfig,
        scheduler: Arc<RecomputeScheduler>,
        edges: Arc<EdgePersistenceModel>,
        calibration: Arc<CalibrationHarness>,
        settlement: Arc<SettlementIntegrationService>,
    ) -> Self {
        let (tx, _) = watch::channel(TelemetrySnapshot::default());
        Self {
            config,
            scheduler,
            edges,
            calibration,
            settlement,
            sinks: Vec::new(),
            tx,
        }
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.sinks.push(sink);
        self
    }

    #[must_use]
    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }

    /// Receiver that sees every published snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<TelemetrySnapshot> {
        self.tx.subscribe()
    }

    /// Last published snapshot. Default until the first collection.
    #[must_use]
    pub fn latest(&self) -> TelemetrySnapshot {
        self.tx.borrow().clone()
    }

    /// Read every component into a snapshot without publishing it.
    #[must_use]
    pub fn snapshot(&self) -> TelemetrySnapshot {
        let status = self.scheduler.get_status();
        TelemetrySnapshot {
            taken_at: Some(Utc::now()),
            queue_depth: status.queue_depth,
            active_jobs: status.active_jobs.len(),
            fast_p95_ms: status.metrics.fast_latency.p95_ms,
            full_p95_ms: status.metrics.full_latency.p95_ms,
            active_edges: self.edges.active_count(),
            calibration_accuracy: self.calibration.get_overall_summary().overall_accuracy,
            settlements_24h: self.calibration.settled_since(SETTLEMENT_WINDOW),
            false_positive_proxy: self.settlement.false_positive_proxy(),
            error_rate: status.metrics.error_rate(),
            circuit_breaker_open: status.breaker.open,
        }
    }

    /// Take a snapshot, publish it and feed the sinks.
    pub fn collect(&self) -> TelemetrySnapshot {
        let snapshot = self.snapshot();
        for sink in &self.sinks {
            sink.observe(&snapshot);
        }
        self.tx.send_replace(snapshot.clone());
        snapshot
    }
}
