//! Scheduler counters and latency windows.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::Serialize;

use crate::domain::recompute::{FailureKind, RecomputeType};

/// Smoothing factor for the moving average latency.
const EMA_ALPHA: f64 = 0.1;

/// p50/p95/p99 over a latency window, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LatencyPercentiles {
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub sample_count: usize,
}

/// Sliding window of latency samples.
pub(crate) struct LatencyWindow {
    samples: Mutex<VecDeque<f64>>,
    max_samples: usize,
}

impl LatencyWindow {
    pub fn new(max_samples: usize) -> Self {
        let max_samples = max_samples.max(1);
        Self {
            samples: Mutex::new(VecDeque::with_capacity(max_samples)),
            max_samples,
        }
    }

    pub fn record(&self, duration_ms: f64) {
        let mut samples = self.samples.lock();
        if samples.len() >= self.max_samples {
            samples.pop_front();
        }
        samples.push_back(duration_ms);
    }

    pub fn percentiles(&self) -> LatencyPercentiles {
        let mut sorted: Vec<f64> = self.samples.lock().iter().copied().collect();
        sorted.sort_by(f64::total_cmp);
        LatencyPercentiles {
            p50_ms: percentile(&sorted, 0.50),
            p95_ms: percentile(&sorted, 0.95),
            p99_ms: percentile(&sorted, 0.99),
            sample_count: sorted.len(),
        }
    }
}

/// Value at percentile `p` (0.0 to 1.0) of a sorted slice. Zero when empty.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let index = ((sorted.len() as f64 - 1.0) * p).round() as usize;
    sorted[index.min(sorted.len() - 1)]
}

/// Lock-free scheduler counters plus latency windows.
pub(crate) struct SchedulerMetrics {
    pub jobs_queued: AtomicU64,
    pub jobs_completed: AtomicU64,
    pub jobs_failed: AtomicU64,
    pub jobs_rejected: AtomicU64,
    pub jobs_purged: AtomicU64,
    pub jobs_downgraded: AtomicU64,
    pub jobs_abandoned: AtomicU64,
    pub fast_recomputes: AtomicU64,
    pub full_recomputes: AtomicU64,
    pub debounce_hits: AtomicU64,
    pub breaker_blocks: AtomicU64,
    pub breaker_trips: AtomicU64,
    pub timeout_failures: AtomicU64,
    pub engine_failures: AtomicU64,
    pub panicked_jobs: AtomicU64,
    pub priority_aging_events: AtomicU64,
    pub saturation_events: AtomicU64,
    pub fast_slo_violations: AtomicU64,
    pub full_slo_violations: AtomicU64,
    average_latency_ms: Mutex<Option<f64>>,
    fast_latency: LatencyWindow,
    full_latency: LatencyWindow,
}

impl SchedulerMetrics {
    pub fn new(latency_window: usize) -> Self {
        Self {
            jobs_queued: AtomicU64::new(0),
            jobs_completed: AtomicU64::new(0),
            jobs_failed: AtomicU64::new(0),
            jobs_rejected: AtomicU64::new(0),
            jobs_purged: AtomicU64::new(0),
            jobs_downgraded: AtomicU64::new(0),
            jobs_abandoned: AtomicU64::new(0),
            fast_recomputes: AtomicU64::new(0),
            full_recomputes: AtomicU64::new(0),
            debounce_hits: AtomicU64::new(0),
            breaker_blocks: AtomicU64::new(0),
            breaker_trips: AtomicU64::new(0),
            timeout_failures: AtomicU64::new(0),
            engine_failures: AtomicU64::new(0),
            panicked_jobs: AtomicU64::new(0),
            priority_aging_events: AtomicU64::new(0),
            saturation_events: AtomicU64::new(0),
            fast_slo_violations: AtomicU64::new(0),
            full_slo_violations: AtomicU64::new(0),
            average_latency_ms: Mutex::new(None),
            fast_latency: LatencyWindow::new(latency_window),
            full_latency: LatencyWindow::new(latency_window),
        }
    }

    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(counter: &AtomicU64, n: usize) {
        counter.fetch_add(n as u64, Ordering::Relaxed);
    }

    /// Record an execution outcome and its latency.
    pub fn record_execution(
        &self,
        recompute_type: RecomputeType,
        duration_ms: f64,
        slo_ms: f64,
        failure: Option<FailureKind>,
    ) {
        match recompute_type {
            RecomputeType::Fast => {
                Self::incr(&self.fast_recomputes);
                self.fast_latency.record(duration_ms);
                if duration_ms > slo_ms {
                    Self::incr(&self.fast_slo_violations);
                }
            }
            RecomputeType::Full => {
                Self::incr(&self.full_recomputes);
                self.full_latency.record(duration_ms);
                if duration_ms > slo_ms {
                    Self::incr(&self.full_slo_violations);
                }
            }
        }

        {
            let mut avg = self.average_latency_ms.lock();
            *avg = Some(match *avg {
                Some(prev) => prev * (1.0 - EMA_ALPHA) + duration_ms * EMA_ALPHA,
                None => duration_ms,
            });
        }

        match failure {
            None => Self::incr(&self.jobs_completed),
            Some(kind) => {
                Self::incr(&self.jobs_failed);
                match kind {
                    FailureKind::Timeout => Self::incr(&self.timeout_failures),
                    FailureKind::Engine => Self::incr(&self.engine_failures),
                    FailureKind::Panicked => Self::incr(&self.panicked_jobs),
                }
            }
        }
    }

    pub fn snapshot(&self) -> SchedulerCounters {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        SchedulerCounters {
            jobs_queued: load(&self.jobs_queued),
            jobs_completed: load(&self.jobs_completed),
            jobs_failed: load(&self.jobs_failed),
            jobs_rejected: load(&self.jobs_rejected),
            jobs_purged: load(&self.jobs_purged),
            jobs_downgraded: load(&self.jobs_downgraded),
            jobs_abandoned: load(&self.jobs_abandoned),
            fast_recomputes: load(&self.fast_recomputes),
            full_recomputes: load(&self.full_recomputes),
            debounce_hits: load(&self.debounce_hits),
            breaker_blocks: load(&self.breaker_blocks),
            breaker_trips: load(&self.breaker_trips),
            timeout_failures: load(&self.timeout_failures),
            engine_failures: load(&self.engine_failures),
            panicked_jobs: load(&self.panicked_jobs),
            priority_aging_events: load(&self.priority_aging_events),
            saturation_events: load(&self.saturation_events),
            fast_slo_violations: load(&self.fast_slo_violations),
            full_slo_violations: load(&self.full_slo_violations),
            average_latency_ms: self.average_latency_ms.lock().unwrap_or(0.0),
            fast_latency: self.fast_latency.percentiles(),
            full_latency: self.full_latency.percentiles(),
        }
    }
}

/// Point-in-time copy of the scheduler counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SchedulerCounters {
    pub jobs_queued: u64,
    pub jobs_completed: u64,
    pub jobs_failed: u64,
    pub jobs_rejected: u64,
    pub jobs_purged: u64,
    pub jobs_downgraded: u64,
    /// Jobs still queued when the scheduler stopped.
    pub jobs_abandoned: u64,
    pub fast_recomputes: u64,
    pub full_recomputes: u64,
    pub debounce_hits: u64,
    pub breaker_blocks: u64,
    pub breaker_trips: u64,
    pub timeout_failures: u64,
    pub engine_failures: u64,
    pub panicked_jobs: u64,
    pub priority_aging_events: u64,
    pub saturation_events: u64,
    pub fast_slo_violations: u64,
    pub full_slo_violations: u64,
    /// Exponential moving average of execution latency.
    pub average_latency_ms: f64,
    pub fast_latency: LatencyPercentiles,
    pub full_latency: LatencyPercentiles,
}

impl SchedulerCounters {
    /// Failed jobs over executed jobs.
    #[must_use]
    pub fn error_rate(&self) -> f64 {
        let executed = self.jobs_completed + self.jobs_failed;
        if executed == 0 {
            0.0
        } else {
            self.jobs_failed as f64 / executed as f64
        }
    }
}
