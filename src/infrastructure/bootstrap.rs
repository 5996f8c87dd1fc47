//! Composition root.
//!
//! [`Services`] builds every component once from a [`Config`] and the two
//! external collaborators, then owns the supervised background tasks.

use std::sync::Arc;

use tracing::info;

use crate::application::cache::MetricsCache;
use crate::application::calibration::CalibrationHarness;
use crate::application::edge::EdgePersistenceModel;
use crate::application::scheduler::RecomputeScheduler;
use crate::application::settlement::SettlementIntegrationService;
use crate::application::telemetry::TelemetryCollector;
use crate::infrastructure::config::settings::Config;
use crate::infrastructure::supervisor::Supervisor;
use crate::port::{GameResultSource, LogSink, TelemetrySink, ValuationEngine};

/// All components of a running instance.
pub struct Services {
    pub cache: Arc<MetricsCache>,
    pub scheduler: Arc<RecomputeScheduler>,
    pub edges: Arc<EdgePersistenceModel>,
    pub calibration: Arc<CalibrationHarness>,
    pub settlement: Arc<SettlementIntegrationService>,
    pub telemetry: Arc<TelemetryCollector>,
    supervisor: Supervisor,
}

impl Services {
    /// Wire the components. Nothing runs until [`Services::start`].
    ///
    /// Telemetry snapshots go to the log unless more sinks are passed to
    /// [`Services::build_with_sinks`].
    #[must_use]
    pub fn build(
        config: &Config,
        engine: Arc<dyn ValuationEngine>,
        results: Arc<dyn GameResultSource>,
    ) -> Self {
        let log: Arc<dyn TelemetrySink> = Arc::new(LogSink);
        Self::build_with_sinks(config, engine, results, vec![log])
    }

    #[must_use]
    pub fn build_with_sinks(
        config: &Config,
        engine: Arc<dyn ValuationEngine>,
        results: Arc<dyn GameResultSource>,
        sinks: Vec<Arc<dyn TelemetrySink>>,
    ) -> Self {
        let cache = Arc::new(MetricsCache::new(config.cache.max_entries));
        let edges = Arc::new(EdgePersistenceModel::new(
            config.edges.clone(),
            Arc::clone(&cache),
        ));
        let calibration = Arc::new(CalibrationHarness::new(
            config.calibration.clone(),
            Arc::clone(&cache),
        ));
        let scheduler = Arc::new(RecomputeScheduler::new(
            config.scheduler.clone(),
            engine,
            Arc::clone(&edges),
            Arc::clone(&cache),
        ));
        let settlement = Arc::new(SettlementIntegrationService::new(
            config.settlement.clone(),
            Arc::clone(&calibration),
            Arc::clone(&edges),
            results,
        ));
        let telemetry = sinks.into_iter().fold(
            TelemetryCollector::new(
                config.telemetry.clone(),
                Arc::clone(&scheduler),
                Arc::clone(&edges),
                Arc::clone(&calibration),
                Arc::clone(&settlement),
            ),
            TelemetryCollector::with_sink,
        );

        Self {
            cache,
            scheduler,
            edges,
            calibration,
            settlement,
            telemetry: Arc::new(telemetry),
            supervisor: Supervisor::new(),
        }
    }

    /// Start the scheduler workers and the periodic tasks.
    pub fn start(&mut self) {
        self.scheduler.start();

        let edges = Arc::clone(&self.edges);
        self.supervisor
            .spawn_periodic("edge_cleanup", edges.config().cleanup_interval(), move || {
                let edges = Arc::clone(&edges);
                async move {
                    edges.cleanup_stale_edges();
                    edges.export_metrics();
                }
            });

        let settlement = Arc::clone(&self.settlement);
        self.supervisor.spawn_periodic(
            "settlement_poll",
            settlement.config().poll_interval(),
            move || {
                let settlement = Arc::clone(&settlement);
                async move {
                    settlement.process_completed_games().await;
                }
            },
        );

        let telemetry = Arc::clone(&self.telemetry);
        let scheduler = Arc::clone(&self.scheduler);
        let calibration = Arc::clone(&self.calibration);
        let cache = Arc::clone(&self.cache);
        self.supervisor.spawn_periodic(
            "telemetry",
            telemetry.config().interval(),
            move || {
                let telemetry = Arc::clone(&telemetry);
                let scheduler = Arc::clone(&scheduler);
                let calibration = Arc::clone(&calibration);
                let cache = Arc::clone(&cache);
                async move {
                    scheduler.export_metrics();
                    calibration.export_metrics();
                    telemetry.collect();
                    cache.gc();
                }
            },
        );

        info!(tasks = self.supervisor.task_count(), "Services started");
    }

    /// Stop the scheduler, then cancel and join the periodic tasks.
    pub async fn shutdown(&mut self) {
        self.scheduler.stop().await;
        self.supervisor.shutdown().await;
        info!("Services stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::application::cache::metrics::{CALIBRATION_METRICS_KEY, RECOMPUTE_METRICS_KEY};
    use crate::testkit::results::StaticResultSource;
    use crate::testkit::valuation::ScriptedValuationEngine;

    #[tokio::test(start_paused = true)]
    async fn start_runs_periodic_exports_and_shutdown_stops_everything() {
        let mut config = Config::default();
        config.scheduler = crate::testkit::config::scheduler();
        let mut services = Services::build(
            &config,
            Arc::new(ScriptedValuationEngine::new()),
            Arc::new(StaticResultSource::default()),
        );
        let mut rx = services.telemetry.subscribe();

        services.start();
        assert!(services.scheduler.is_running());

        tokio::time::sleep(config.telemetry.interval() + Duration::from_secs(1)).await;
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().taken_at.is_some());
        assert!(services.cache.get(RECOMPUTE_METRICS_KEY).is_some());
        assert!(services.cache.get(CALIBRATION_METRICS_KEY).is_some());

        services.shutdown().await;
        assert!(!services.scheduler.is_running());
    }
}
