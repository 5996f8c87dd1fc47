//! Recompute scheduler.
//!
//! Accepts recompute triggers, decides FAST or FULL, prioritizes, and
//! dispatches to a fixed pool of worker tasks.
//!
//! # Architecture
//!
//! ```text
//! schedule_recompute ──► breaker ──► debounce ──► saturation ──► JobQueue
//!                                                                   │
//!                     ┌──────────── pop (aging applied) ────────────┘
//!                     ▼
//!               worker 0..N ──► ValuationEngine ──► EdgePersistenceModel
//!                     │
//!                     └──► breaker, metrics, job history
//! ```
//!
//! Admission checks and the enqueue happen under one lock, so two racing
//! triggers for the same game cannot both pass the debounce window.

mod breaker;
mod config;
mod debounce;
mod decision;
mod metrics;
mod queue;
mod worker;

#[cfg(test)]
mod tests;

pub use breaker::BreakerState;
pub use config::{BreakerConfig, SaturationAction, SchedulerConfig};
pub use decision::{decide_priority, decide_type};
pub use metrics::{LatencyPercentiles, SchedulerCounters};

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::cache::{metrics::RECOMPUTE_METRICS_KEY, MetricsCache};
use crate::application::edge::EdgePersistenceModel;
use crate::domain::id::{GameId, JobId, PropId};
use crate::domain::recompute::{
    JobRecord, Rejection, RecomputeJob, RecomputeRequest, RecomputeTrigger, RecomputeType,
    TriggerContext,
};
use crate::port::outbound::valuation::ValuationEngine;

use breaker::CircuitBreaker;
use debounce::Debouncer;
use metrics::SchedulerMetrics;
use queue::JobQueue;

/// Queue and debounce state, guarded together.
struct Admission {
    queue: JobQueue,
    debounce: Debouncer,
}

/// A job currently held by a worker.
#[derive(Debug, Clone)]
struct ActiveJob {
    game_id: GameId,
    recompute_type: RecomputeType,
    worker_id: usize,
    enqueued_at: Instant,
    started: Instant,
}

/// A running job as reported by [`SchedulerStatus`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveJobStatus {
    pub job_id: JobId,
    pub game_id: GameId,
    pub recompute_type: RecomputeType,
    pub worker_id: usize,
    pub running_ms: f64,
}

/// Point-in-time view of the scheduler.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub accepting: bool,
    pub workers: usize,
    pub queue_depth: usize,
    pub queue_capacity: usize,
    pub active_jobs: Vec<ActiveJobStatus>,
    /// Mean wait of queued jobs.
    pub average_queue_wait_secs: f64,
    /// Mean time since enqueue of the jobs being executed.
    pub average_staleness_secs: f64,
    pub debounced_games: usize,
    pub breaker: BreakerState,
    pub metrics: SchedulerCounters,
    pub history_len: usize,
    pub reported_at: DateTime<Utc>,
}

/// Priority job scheduler for recomputes.
pub struct RecomputeScheduler {
    config: SchedulerConfig,
    engine: Arc<dyn ValuationEngine>,
    edges: Arc<EdgePersistenceModel>,
    cache: Arc<MetricsCache>,
    admission: Mutex<Admission>,
    breaker: Mutex<CircuitBreaker>,
    active: DashMap<JobId, ActiveJob>,
    history: Mutex<VecDeque<JobRecord>>,
    metrics: SchedulerMetrics,
    accepting: AtomicBool,
    running: AtomicBool,
    notify: Notify,
    shutdown: Mutex<CancellationToken>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl RecomputeScheduler {
    /// Create a scheduler. Jobs are accepted immediately but only executed
    /// once [`start`](Self::start) spawns the workers.
    pub fn new(
        config: SchedulerConfig,
        engine: Arc<dyn ValuationEngine>,
        edges: Arc<EdgePersistenceModel>,
        cache: Arc<MetricsCache>,
    ) -> Self {
        let admission = Admission {
            queue: JobQueue::new(),
            debounce: Debouncer::new(config.debounce_window()),
        };
        let breaker = CircuitBreaker::new(&config.breaker);
        let metrics = SchedulerMetrics::new(config.latency_window);

        Self {
            config,
            engine,
            edges,
            cache,
            admission: Mutex::new(admission),
            breaker: Mutex::new(breaker),
            active: DashMap::new(),
            history: Mutex::new(VecDeque::new()),
            metrics,
            accepting: AtomicBool::new(true),
            running: AtomicBool::new(false),
            notify: Notify::new(),
            shutdown: Mutex::new(CancellationToken::new()),
            workers: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Schedule a recompute. Returns `None` when the request is rejected.
    pub fn schedule_recompute(
        &self,
        game_id: impl Into<GameId>,
        trigger: RecomputeTrigger,
        prop_ids: Option<Vec<PropId>>,
        context: Option<TriggerContext>,
        force_type: Option<RecomputeType>,
    ) -> Option<JobId> {
        let mut request = RecomputeRequest::new(game_id, trigger);
        if let Some(props) = prop_ids {
            request.prop_ids = props;
        }
        if let Some(context) = context {
            request.context = context;
        }
        request.force_type = force_type;
        self.try_schedule(request).ok()
    }

    /// Schedule a recompute, reporting why a request was rejected.
    pub fn try_schedule(&self, request: RecomputeRequest) -> Result<JobId, Rejection> {
        let game_id = request.game_id.clone();
        let trigger = request.trigger;
        let outcome = self.admit(request);
        if let Err(rejection) = &outcome {
            SchedulerMetrics::incr(&self.metrics.jobs_rejected);
            match rejection {
                Rejection::Debounced { .. } => {
                    debug!(game_id = %game_id, trigger = %trigger, "Recompute debounced");
                }
                _ => {
                    warn!(game_id = %game_id, trigger = %trigger, reason = %rejection, "Recompute rejected");
                }
            }
        }
        outcome
    }

    fn admit(&self, request: RecomputeRequest) -> Result<JobId, Rejection> {
        if !self.accepting.load(Ordering::Relaxed) {
            return Err(Rejection::ShuttingDown);
        }

        let now = Instant::now();
        {
            let mut breaker = self.breaker.lock();
            if breaker.is_open(now) {
                SchedulerMetrics::incr(&self.metrics.breaker_blocks);
                return Err(Rejection::CircuitOpen);
            }
            if let Some((prop_id, failures)) = breaker.blocked_prop(&request.prop_ids, now) {
                SchedulerMetrics::incr(&self.metrics.breaker_blocks);
                return Err(Rejection::PropBlocked { prop_id, failures });
            }
        }

        let (recompute_type, decision_reason) = decide_type(
            request.trigger,
            &request.context,
            request.force_type,
            self.config.major_line_move_threshold,
        );
        let priority = decide_priority(&request.prop_ids);

        let mut admission = self.admission.lock();
        if !request.trigger.bypasses_debounce()
            && admission.debounce.is_debounced(&request.game_id, now)
        {
            SchedulerMetrics::incr(&self.metrics.debounce_hits);
            return Err(Rejection::Debounced {
                game_id: request.game_id,
            });
        }

        if admission.queue.len() >= self.config.saturation_depth() {
            self.relieve_saturation(&mut admission.queue);
            let depth = admission.queue.len();
            if depth >= self.config.queue_max_size {
                return Err(Rejection::QueueSaturated { depth });
            }
        }

        let created_at = Utc::now();
        let job = RecomputeJob {
            id: JobId::new(),
            game_id: request.game_id,
            prop_ids: request.prop_ids,
            recompute_type,
            priority,
            trigger: request.trigger,
            decision_reason,
            created_at,
            scheduled_for: created_at,
            attempts: 0,
            max_attempts: RecomputeJob::DEFAULT_MAX_ATTEMPTS,
            priority_boost: 0.0,
            context: request.context,
            enqueued_at: now,
        };
        let job_id = job.id.clone();

        info!(
            job_id = %job_id,
            game_id = %job.game_id,
            recompute_type = %job.recompute_type,
            priority = ?job.priority,
            reason = ?job.decision_reason,
            props = job.prop_ids.len(),
            "Scheduled recompute"
        );

        admission.debounce.accept(&job.game_id, now);
        admission.queue.push(job);
        drop(admission);

        SchedulerMetrics::incr(&self.metrics.jobs_queued);
        self.notify.notify_one();
        Ok(job_id)
    }

    /// Run the configured saturation strategy. Called with the admission lock held.
    fn relieve_saturation(&self, queue: &mut JobQueue) {
        SchedulerMetrics::incr(&self.metrics.saturation_events);
        let depth = queue.len();

        match self.config.saturation_action {
            SaturationAction::RejectNew => {
                warn!(depth, "Queue saturated, admitting until full");
            }
            SaturationAction::PurgeOldest => {
                let purged = queue.purge_oldest(self.config.purge_batch());
                SchedulerMetrics::add(&self.metrics.jobs_purged, purged.len());
                for job in &purged {
                    debug!(job_id = %job.id, game_id = %job.game_id, "Purged queued job");
                }
                warn!(depth, purged = purged.len(), "Queue saturated, purged oldest jobs");
            }
            SaturationAction::DowngradePriority => {
                let downgraded = queue.downgrade_line_changes();
                SchedulerMetrics::add(&self.metrics.jobs_downgraded, downgraded.len());
                warn!(
                    depth,
                    downgraded = downgraded.len(),
                    "Queue saturated, downgraded line change jobs to FAST"
                );
            }
        }
    }

    /// Pop the most urgent job, applying priority aging.
    fn next_job(&self) -> Option<RecomputeJob> {
        let popped = self
            .admission
            .lock()
            .queue
            .pop(Instant::now(), self.config.priority_aging_rate)?;
        if popped.aged {
            SchedulerMetrics::incr(&self.metrics.priority_aging_events);
            debug!(
                job_id = %popped.job.id,
                boost = popped.job.priority_boost,
                effective_priority = popped.job.effective_priority(),
                "Priority aged"
            );
        }
        Some(popped.job)
    }

    /// Spawn the worker pool. Calling it again while running does nothing.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        self.accepting.store(true, Ordering::SeqCst);

        let token = CancellationToken::new();
        *self.shutdown.lock() = token.clone();

        let mut workers = self.workers.lock();
        for worker_id in 0..self.config.workers {
            let scheduler = Arc::clone(self);
            let token = token.clone();
            workers.push(tokio::spawn(async move {
                scheduler.run_worker(worker_id, token).await;
            }));
        }
        info!(workers = self.config.workers, "Recompute scheduler started");
    }

    /// Stop accepting jobs, let executing jobs finish, and join the workers.
    ///
    /// Jobs still queued are abandoned and counted.
    pub async fn stop(&self) {
        self.accepting.store(false, Ordering::SeqCst);
        self.shutdown.lock().cancel();

        let handles: Vec<JoinHandle<()>> = self.workers.lock().drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Recompute worker ended abnormally");
            }
        }
        self.running.store(false, Ordering::SeqCst);

        let abandoned = self.admission.lock().queue.drain();
        SchedulerMetrics::add(&self.metrics.jobs_abandoned, abandoned.len());
        info!(abandoned = abandoned.len(), "Recompute scheduler stopped");
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn queue_depth(&self) -> usize {
        self.admission.lock().queue.len()
    }

    #[must_use]
    pub fn get_status(&self) -> SchedulerStatus {
        let now = Instant::now();
        let (queue_depth, average_queue_wait_secs, debounced_games) = {
            let admission = self.admission.lock();
            (
                admission.queue.len(),
                admission.queue.average_wait_secs(now),
                admission.debounce.tracked_games(),
            )
        };

        let active_jobs: Vec<ActiveJobStatus> = self
            .active
            .iter()
            .map(|entry| ActiveJobStatus {
                job_id: entry.key().clone(),
                game_id: entry.game_id.clone(),
                recompute_type: entry.recompute_type,
                worker_id: entry.worker_id,
                running_ms: now.saturating_duration_since(entry.started).as_secs_f64() * 1000.0,
            })
            .collect();
        let average_staleness_secs = if self.active.is_empty() {
            0.0
        } else {
            let total: f64 = self
                .active
                .iter()
                .map(|entry| now.saturating_duration_since(entry.enqueued_at).as_secs_f64())
                .sum();
            total / self.active.len() as f64
        };

        SchedulerStatus {
            running: self.is_running(),
            accepting: self.accepting.load(Ordering::Relaxed),
            workers: self.config.workers,
            queue_depth,
            queue_capacity: self.config.queue_max_size,
            active_jobs,
            average_queue_wait_secs,
            average_staleness_secs,
            debounced_games,
            breaker: self.breaker.lock().state(now),
            metrics: self.metrics.snapshot(),
            history_len: self.history.lock().len(),
            reported_at: Utc::now(),
        }
    }

    /// The latest `limit` completed jobs, oldest first.
    #[must_use]
    pub fn get_job_history(&self, limit: usize) -> Vec<JobRecord> {
        let history = self.history.lock();
        let skip = history.len().saturating_sub(limit);
        history.iter().skip(skip).cloned().collect()
    }

    /// Build the status and cache it for host applications.
    pub fn export_metrics(&self) -> SchedulerStatus {
        let status = self.get_status();
        self.cache
            .set(RECOMPUTE_METRICS_KEY, &status, self.config.metrics_ttl());
        status
    }

    /// Close the global breaker and forget every recorded failure.
    pub fn reset_circuit_breaker(&self) {
        self.breaker.lock().reset();
        info!("Circuit breaker reset");
    }

    /// Unblock a single prop. Returns `false` if it had no recorded failures.
    pub fn reset_prop_breaker(&self, prop_id: &PropId) -> bool {
        let cleared = self.breaker.lock().reset_prop(prop_id);
        if cleared {
            info!(prop_id = %prop_id, "Prop breaker reset");
        }
        cleared
    }
}
