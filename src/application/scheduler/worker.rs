//! Worker loop and job execution.

use chrono::Utc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::metrics::SchedulerMetrics;
use super::{ActiveJob, RecomputeScheduler};
use crate::application::edge::EdgeChange;
use crate::domain::recompute::{FailureKind, JobRecord, RecomputeJob, RecomputeResult};

impl RecomputeScheduler {
    pub(super) async fn run_worker(&self, worker_id: usize, shutdown: CancellationToken) {
        debug!(worker_id, "Recompute worker started");
        loop {
            if shutdown.is_cancelled() {
                break;
            }
            if let Some(job) = self.next_job() {
                self.execute(job, worker_id).await;
                continue;
            }
            tokio::select! {
                () = shutdown.cancelled() => break,
                () = self.notify.notified() => {}
                () = tokio::time::sleep(self.config.idle_poll()) => {}
            }
        }
        debug!(worker_id, "Recompute worker stopped");
    }

    /// Run one job to completion or timeout and record the outcome.
    ///
    /// Failures never escape: they become a failed [`RecomputeResult`].
    pub(super) async fn execute(&self, mut job: RecomputeJob, worker_id: usize) {
        job.attempts += 1;
        let started = Instant::now();
        self.active.insert(
            job.id.clone(),
            ActiveJob {
                game_id: job.game_id.clone(),
                recompute_type: job.recompute_type,
                worker_id,
                enqueued_at: job.enqueued_at,
                started,
            },
        );
        debug!(
            job_id = %job.id,
            worker_id,
            recompute_type = %job.recompute_type,
            waited_ms = started.saturating_duration_since(job.enqueued_at).as_millis() as u64,
            "Executing recompute"
        );

        let budget = self.config.timeout_for(job.recompute_type);
        let engine = std::sync::Arc::clone(&self.engine);
        let payload = job.clone();
        let mut task = tokio::spawn(async move { engine.recompute(payload).await });

        let outcome = match tokio::time::timeout(budget, &mut task).await {
            Ok(Ok(Ok(valuation))) => Ok(valuation),
            Ok(Ok(Err(e))) => Err((FailureKind::Engine, e.to_string())),
            Ok(Err(join_error)) => Err((
                FailureKind::Panicked,
                format!("valuation task failed: {join_error}"),
            )),
            Err(_) => {
                task.abort();
                Err((
                    FailureKind::Timeout,
                    format!("timed out after {}ms", budget.as_millis()),
                ))
            }
        };

        let finished = Instant::now();
        let duration_ms = finished.saturating_duration_since(started).as_secs_f64() * 1000.0;

        let result = match outcome {
            Ok(valuation) => {
                let mut edges_created = 0;
                let mut edges_retired = 0;
                for update in valuation.edge_updates {
                    match self.edges.apply(update) {
                        EdgeChange::Created => edges_created += 1,
                        EdgeChange::Retired => edges_retired += 1,
                        EdgeChange::Updated | EdgeChange::Ignored => {}
                    }
                }
                self.breaker.lock().record_success(&job.prop_ids);

                info!(
                    job_id = %job.id,
                    game_id = %job.game_id,
                    recompute_type = %job.recompute_type,
                    duration_ms,
                    props_updated = valuation.props_updated,
                    edges_created,
                    edges_retired,
                    "Recompute completed"
                );
                RecomputeResult {
                    job_id: job.id.clone(),
                    success: true,
                    duration_ms,
                    props_updated: valuation.props_updated,
                    edges_created,
                    edges_retired,
                    error: None,
                    failure: None,
                }
            }
            Err((kind, message)) => {
                error!(
                    job_id = %job.id,
                    game_id = %job.game_id,
                    engine = self.engine.name(),
                    failure = ?kind,
                    duration_ms,
                    error = %message,
                    "Recompute failed"
                );
                let tripped = self.breaker.lock().record_failure(&job.prop_ids, finished);
                if tripped {
                    SchedulerMetrics::incr(&self.metrics.breaker_trips);
                    error!(
                        threshold = self.config.breaker.failure_threshold,
                        window_secs = self.config.breaker.window_secs,
                        "Circuit breaker opened"
                    );
                }
                RecomputeResult::failed(job.id.clone(), duration_ms, kind, message)
            }
        };

        let slo_ms = self.config.slo_for(job.recompute_type);
        if duration_ms > slo_ms {
            warn!(
                job_id = %job.id,
                recompute_type = %job.recompute_type,
                duration_ms,
                slo_ms,
                "Recompute exceeded latency objective"
            );
        }
        self.metrics
            .record_execution(job.recompute_type, duration_ms, slo_ms, result.failure);

        self.active.remove(&job.id);
        let mut history = self.history.lock();
        history.push_back(JobRecord {
            job,
            result,
            worker_id,
            completed_at: Utc::now(),
        });
        while history.len() > self.config.history_size {
            history.pop_front();
        }
    }
}
