//! Aging priority queue for recompute jobs.
//!
//! The queue is small (bounded by configuration) and always accessed under
//! the scheduler's admission lock, so it is a plain vector scanned on every
//! dequeue. Each dequeue re-derives every queued job's aging boost from its
//! wait time and picks the lowest effective priority, oldest first, then
//! earliest submission.

use tokio::time::Instant;

use crate::domain::recompute::{
    DecisionReason, RecomputeJob, RecomputePriority, RecomputeTrigger, RecomputeType,
};

/// Boosts at or below this are not counted as aging events.
const AGING_EVENT_THRESHOLD: f64 = 0.1;

struct Queued {
    seq: u64,
    job: RecomputeJob,
}

/// A job handed out by [`JobQueue::pop`].
pub(crate) struct Dequeued {
    pub job: RecomputeJob,
    /// Whether aging changed this job's standing.
    pub aged: bool,
}

#[derive(Default)]
pub(crate) struct JobQueue {
    jobs: Vec<Queued>,
    next_seq: u64,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn push(&mut self, job: RecomputeJob) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.jobs.push(Queued { seq, job });
    }

    /// Remove the most urgent job after applying aging.
    pub fn pop(&mut self, now: Instant, aging_rate: f64) -> Option<Dequeued> {
        for queued in &mut self.jobs {
            queued.job.priority_boost = queued.job.waited(now).as_secs_f64() * aging_rate;
        }

        let index = self
            .jobs
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                a.job
                    .effective_priority()
                    .total_cmp(&b.job.effective_priority())
                    .then(a.job.enqueued_at.cmp(&b.job.enqueued_at))
                    .then(a.seq.cmp(&b.seq))
            })
            .map(|(i, _)| i)?;

        let job = self.jobs.remove(index).job;
        let aged = job.priority_boost > AGING_EVENT_THRESHOLD;
        Some(Dequeued { job, aged })
    }

    /// Remove up to `max` MEDIUM/LOW jobs, oldest first.
    pub fn purge_oldest(&mut self, max: usize) -> Vec<RecomputeJob> {
        let mut candidates: Vec<(Instant, u64)> = self
            .jobs
            .iter()
            .filter(|q| q.job.priority.is_purgeable())
            .map(|q| (q.job.enqueued_at, q.seq))
            .collect();
        candidates.sort_unstable();
        candidates.truncate(max);

        let doomed: Vec<u64> = candidates.into_iter().map(|(_, seq)| seq).collect();
        let mut purged = Vec::with_capacity(doomed.len());
        let mut kept = Vec::with_capacity(self.jobs.len());
        for queued in self.jobs.drain(..) {
            if doomed.contains(&queued.seq) {
                purged.push(queued.job);
            } else {
                kept.push(queued);
            }
        }
        self.jobs = kept;
        purged
    }

    /// Convert queued non-critical line-change FULL jobs to FAST.
    ///
    /// Returns the ids of the downgraded jobs.
    pub fn downgrade_line_changes(&mut self) -> Vec<crate::domain::id::JobId> {
        self.jobs
            .iter_mut()
            .filter(|q| {
                q.job.recompute_type == RecomputeType::Full
                    && q.job.priority != RecomputePriority::Critical
                    && q.job.trigger == RecomputeTrigger::LineChange
            })
            .map(|q| {
                q.job.recompute_type = RecomputeType::Fast;
                q.job.decision_reason = DecisionReason::MinorLineMove;
                q.job.id.clone()
            })
            .collect()
    }

    /// Mean queue wait in seconds.
    pub fn average_wait_secs(&self, now: Instant) -> f64 {
        if self.jobs.is_empty() {
            return 0.0;
        }
        let total: f64 = self
            .jobs
            .iter()
            .map(|q| q.job.waited(now).as_secs_f64())
            .sum();
        total / self.jobs.len() as f64
    }

    /// Remove every queued job.
    pub fn drain(&mut self) -> Vec<RecomputeJob> {
        self.jobs.drain(..).map(|q| q.job).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;

    use super::*;
    use crate::domain::id::{GameId, JobId};
    use crate::domain::recompute::TriggerContext;

    fn job(priority: RecomputePriority, recompute_type: RecomputeType) -> RecomputeJob {
        let now = Utc::now();
        RecomputeJob {
            id: JobId::new(),
            game_id: GameId::new("G"),
            prop_ids: Vec::new(),
            recompute_type,
            priority,
            trigger: RecomputeTrigger::LineChange,
            decision_reason: DecisionReason::MajorLineMove,
            created_at: now,
            scheduled_for: now,
            attempts: 0,
            max_attempts: RecomputeJob::DEFAULT_MAX_ATTEMPTS,
            priority_boost: 0.0,
            context: TriggerContext::None,
            enqueued_at: Instant::now(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn pops_most_urgent_first() {
        let mut queue = JobQueue::new();
        queue.push(job(RecomputePriority::Medium, RecomputeType::Fast));
        queue.push(job(RecomputePriority::Critical, RecomputeType::Fast));
        queue.push(job(RecomputePriority::High, RecomputeType::Fast));

        let order: Vec<_> = std::iter::from_fn(|| queue.pop(Instant::now(), 0.05))
            .map(|d| d.job.priority)
            .collect();
        assert_eq!(
            order,
            vec![
                RecomputePriority::Critical,
                RecomputePriority::High,
                RecomputePriority::Medium
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn equal_priority_is_fifo() {
        let mut queue = JobQueue::new();
        let first = job(RecomputePriority::Medium, RecomputeType::Fast);
        let first_id = first.id.clone();
        queue.push(first);
        queue.push(job(RecomputePriority::Medium, RecomputeType::Fast));
        assert_eq!(queue.pop(Instant::now(), 0.05).unwrap().job.id, first_id);
    }

    #[tokio::test(start_paused = true)]
    async fn aging_lets_old_low_job_overtake_fresh_high_job() {
        let mut queue = JobQueue::new();
        let old = job(RecomputePriority::Low, RecomputeType::Fast);
        let old_id = old.id.clone();
        queue.push(old);

        // 50s at 0.05/s is a boost of 2.5: LOW (4) ages to 1.5, below HIGH (2).
        tokio::time::advance(Duration::from_secs(50)).await;
        queue.push(job(RecomputePriority::High, RecomputeType::Fast));

        let popped = queue.pop(Instant::now(), 0.05).unwrap();
        assert_eq!(popped.job.id, old_id);
        assert!(popped.aged);
        assert!((popped.job.priority_boost - 2.5).abs() < 1e-6);
        assert!(popped.job.effective_priority() <= RecomputePriority::Low.value());
    }

    #[tokio::test(start_paused = true)]
    async fn purge_takes_oldest_purgeable_only() {
        let mut queue = JobQueue::new();
        let oldest = job(RecomputePriority::Low, RecomputeType::Fast);
        let oldest_id = oldest.id.clone();
        queue.push(job(RecomputePriority::Critical, RecomputeType::Fast));
        queue.push(oldest);
        tokio::time::advance(Duration::from_millis(10)).await;
        queue.push(job(RecomputePriority::Medium, RecomputeType::Fast));
        queue.push(job(RecomputePriority::High, RecomputeType::Fast));

        let purged = queue.purge_oldest(1);
        assert_eq!(purged.len(), 1);
        assert_eq!(purged[0].id, oldest_id);
        assert_eq!(queue.len(), 3);

        let purged = queue.purge_oldest(10);
        assert_eq!(purged.len(), 1);
        assert_eq!(queue.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn downgrade_skips_critical_jobs() {
        let mut queue = JobQueue::new();
        queue.push(job(RecomputePriority::Critical, RecomputeType::Full));
        queue.push(job(RecomputePriority::Medium, RecomputeType::Full));
        queue.push(job(RecomputePriority::Medium, RecomputeType::Fast));

        assert_eq!(queue.downgrade_line_changes().len(), 1);
        let jobs = queue.drain();
        let full = jobs
            .iter()
            .filter(|j| j.recompute_type == RecomputeType::Full)
            .count();
        assert_eq!(full, 1);
    }
}
