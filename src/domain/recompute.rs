//! Recompute job domain types.
//!
//! A [`RecomputeJob`] is created when the scheduler accepts a trigger. Its
//! type, priority and decision reason are derived from the trigger and the
//! trigger's typed [`TriggerContext`]; nothing else sets them.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Instant;

use super::id::{GameId, JobId, PropId};

/// How much work a recompute requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecomputeType {
    /// Cheap re-valuation against a moved line.
    Fast,
    /// Full re-derivation; cached intermediates are invalid.
    Full,
}

impl fmt::Display for RecomputeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fast => write!(f, "FAST"),
            Self::Full => write!(f, "FULL"),
        }
    }
}

/// Static job priority. Lower numeric value is more urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecomputePriority {
    Critical = 1,
    High = 2,
    Medium = 3,
    Low = 4,
}

impl RecomputePriority {
    /// Numeric priority used for queue ordering.
    #[must_use]
    pub const fn value(self) -> f64 {
        self as u8 as f64
    }

    /// Whether queue saturation handling may purge jobs of this priority.
    #[must_use]
    pub const fn is_purgeable(self) -> bool {
        matches!(self, Self::Medium | Self::Low)
    }
}

/// What caused a recompute request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecomputeTrigger {
    LineChange,
    LineupUpdate,
    WeatherChange,
    InjuryUpdate,
    LiveEvent,
    Manual,
    Scheduled,
}

impl RecomputeTrigger {
    /// Manual triggers bypass the debounce window.
    #[must_use]
    pub const fn bypasses_debounce(self) -> bool {
        matches!(self, Self::Manual)
    }
}

impl fmt::Display for RecomputeTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::LineChange => "LINE_CHANGE",
            Self::LineupUpdate => "LINEUP_UPDATE",
            Self::WeatherChange => "WEATHER_CHANGE",
            Self::InjuryUpdate => "INJURY_UPDATE",
            Self::LiveEvent => "LIVE_EVENT",
            Self::Manual => "MANUAL",
            Self::Scheduled => "SCHEDULED",
        };
        f.write_str(name)
    }
}

/// Audit reason recorded with every type decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionReason {
    MinorLineMove,
    MajorLineMove,
    LineupChange,
    WeatherUpdate,
    InjuryReport,
    LiveScoring,
    ForcedOverride,
    ScheduledMaintenance,
}

/// Injury designation carried by an injury trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InjurySeverity {
    Questionable,
    Doubtful,
    Out,
}

/// A line moved on one or more props.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineChangeContext {
    /// Absolute size of the move.
    pub magnitude: f64,
    #[serde(default)]
    pub previous_line: Option<f64>,
    #[serde(default)]
    pub current_line: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineupContext {
    pub team: String,
    #[serde(default)]
    pub players_changed: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherContext {
    pub summary: String,
    #[serde(default)]
    pub wind_mph: Option<f64>,
    #[serde(default)]
    pub precipitation_chance: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InjuryContext {
    pub player_id: String,
    pub severity: InjurySeverity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveEventContext {
    #[serde(default)]
    pub inning: Option<u8>,
    pub description: String,
}

/// Typed trigger context, one variant per trigger kind.
///
/// `Audit` is an opaque bag for unstructured metadata that only needs to be
/// retained with the job.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TriggerContext {
    #[default]
    None,
    LineChange(LineChangeContext),
    Lineup(LineupContext),
    Weather(WeatherContext),
    Injury(InjuryContext),
    LiveEvent(LiveEventContext),
    Audit {
        metadata: serde_json::Map<String, serde_json::Value>,
    },
}

impl TriggerContext {
    /// Shorthand for a line change of the given magnitude.
    #[must_use]
    pub fn line_change(magnitude: f64) -> Self {
        Self::LineChange(LineChangeContext {
            magnitude,
            previous_line: None,
            current_line: None,
        })
    }

    /// Line change magnitude, when the context carries one.
    #[must_use]
    pub fn line_change_magnitude(&self) -> Option<f64> {
        match self {
            Self::LineChange(ctx) => Some(ctx.magnitude),
            _ => None,
        }
    }
}

/// A request to recompute valuations for a game.
#[derive(Debug, Clone, PartialEq)]
pub struct RecomputeRequest {
    pub game_id: GameId,
    pub trigger: RecomputeTrigger,
    /// Props to recompute. Empty means the whole game.
    pub prop_ids: Vec<PropId>,
    pub context: TriggerContext,
    pub force_type: Option<RecomputeType>,
}

impl RecomputeRequest {
    pub fn new(game_id: impl Into<GameId>, trigger: RecomputeTrigger) -> Self {
        Self {
            game_id: game_id.into(),
            trigger,
            prop_ids: Vec::new(),
            context: TriggerContext::None,
            force_type: None,
        }
    }

    #[must_use]
    pub fn with_props<I, P>(mut self, props: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PropId>,
    {
        self.prop_ids = props.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_context(mut self, context: TriggerContext) -> Self {
        self.context = context;
        self
    }

    #[must_use]
    pub fn with_force_type(mut self, force_type: RecomputeType) -> Self {
        self.force_type = Some(force_type);
        self
    }
}

/// Why the scheduler refused a request. The caller should not retry immediately.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("global circuit breaker is open")]
    CircuitOpen,

    #[error("prop {prop_id} is blocked after {failures} recent failures")]
    PropBlocked { prop_id: PropId, failures: usize },

    #[error("game {game_id} was debounced")]
    Debounced { game_id: GameId },

    #[error("queue saturated at depth {depth}")]
    QueueSaturated { depth: usize },

    #[error("scheduler is shutting down")]
    ShuttingDown,
}

/// A unit of recompute work.
#[derive(Debug, Clone, Serialize)]
pub struct RecomputeJob {
    pub id: JobId,
    pub game_id: GameId,
    pub prop_ids: Vec<PropId>,
    pub recompute_type: RecomputeType,
    pub priority: RecomputePriority,
    pub trigger: RecomputeTrigger,
    pub decision_reason: DecisionReason,
    pub created_at: DateTime<Utc>,
    pub scheduled_for: DateTime<Utc>,
    /// Execution attempts. Resubmission is the caller's responsibility.
    pub attempts: u32,
    pub max_attempts: u32,
    /// Aging boost, frozen when the job is dequeued.
    pub priority_boost: f64,
    pub context: TriggerContext,
    #[serde(skip)]
    pub(crate) enqueued_at: Instant,
}

impl RecomputeJob {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

    /// Priority after aging. Never less urgent than the static priority and
    /// never more urgent than CRITICAL.
    #[must_use]
    pub fn effective_priority(&self) -> f64 {
        let base = self.priority.value();
        (base - self.priority_boost).max(RecomputePriority::Critical.value()).min(base)
    }

    /// Time this job has spent since it was enqueued.
    #[must_use]
    pub fn waited(&self, now: Instant) -> std::time::Duration {
        now.saturating_duration_since(self.enqueued_at)
    }
}

/// Why a job execution failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Timeout,
    Engine,
    Panicked,
}

/// Outcome of one job execution. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecomputeResult {
    pub job_id: JobId,
    pub success: bool,
    pub duration_ms: f64,
    pub props_updated: usize,
    pub edges_created: usize,
    pub edges_retired: usize,
    pub error: Option<String>,
    pub failure: Option<FailureKind>,
}

impl RecomputeResult {
    /// A failed result with no side effects applied.
    #[must_use]
    pub fn failed(job_id: JobId, duration_ms: f64, kind: FailureKind, error: String) -> Self {
        Self {
            job_id,
            success: false,
            duration_ms,
            props_updated: 0,
            edges_created: 0,
            edges_retired: 0,
            error: Some(error),
            failure: Some(kind),
        }
    }
}

/// A completed job with the worker that ran it, as kept in job history.
#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub job: RecomputeJob,
    pub result: RecomputeResult,
    pub worker_id: usize,
    pub completed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(priority: RecomputePriority, boost: f64) -> RecomputeJob {
        let now = Utc::now();
        RecomputeJob {
            id: JobId::new(),
            game_id: GameId::new("G1"),
            prop_ids: Vec::new(),
            recompute_type: RecomputeType::Fast,
            priority,
            trigger: RecomputeTrigger::LineChange,
            decision_reason: DecisionReason::MinorLineMove,
            created_at: now,
            scheduled_for: now,
            attempts: 0,
            max_attempts: RecomputeJob::DEFAULT_MAX_ATTEMPTS,
            priority_boost: boost,
            context: TriggerContext::None,
            enqueued_at: Instant::now(),
        }
    }

    #[test]
    fn effective_priority_never_exceeds_static() {
        for priority in [
            RecomputePriority::Critical,
            RecomputePriority::High,
            RecomputePriority::Medium,
            RecomputePriority::Low,
        ] {
            for boost in [0.0, 0.3, 1.5, 10.0] {
                let job = job(priority, boost);
                assert!(job.effective_priority() <= priority.value());
                assert!(job.effective_priority() >= 1.0);
            }
        }
    }

    #[test]
    fn aging_moves_low_towards_critical() {
        assert!((job(RecomputePriority::Low, 0.5).effective_priority() - 3.5).abs() < 1e-9);
        assert!((job(RecomputePriority::Low, 7.0).effective_priority() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn only_manual_bypasses_debounce() {
        assert!(RecomputeTrigger::Manual.bypasses_debounce());
        assert!(!RecomputeTrigger::Scheduled.bypasses_debounce());
        assert!(!RecomputeTrigger::LineChange.bypasses_debounce());
    }

    #[test]
    fn context_is_tagged_by_kind() {
        let ctx = TriggerContext::line_change(0.6);
        let json = serde_json::to_value(&ctx).unwrap();
        assert_eq!(json["kind"], "line_change");
        assert_eq!(ctx.line_change_magnitude(), Some(0.6));

        let parsed: TriggerContext = serde_json::from_str(
            r#"{"kind":"injury","player_id":"p-7","severity":"out"}"#,
        )
        .unwrap();
        assert_eq!(parsed.line_change_magnitude(), None);
        assert!(matches!(
            parsed,
            TriggerContext::Injury(InjuryContext {
                severity: InjurySeverity::Out,
                ..
            })
        ));
    }

    #[test]
    fn only_medium_and_low_are_purgeable() {
        assert!(!RecomputePriority::Critical.is_purgeable());
        assert!(!RecomputePriority::High.is_purgeable());
        assert!(RecomputePriority::Medium.is_purgeable());
        assert!(RecomputePriority::Low.is_purgeable());
    }
}
