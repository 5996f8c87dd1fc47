//! Edge domain types.
//!
//! An [`Edge`] is a detected mismatch between a modeled probability and a
//! market price. Its persistence score is always derived from the edge's
//! history; no caller sets it directly.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use super::id::{EdgeId, GameId, PropId};

/// Snapshots considered when measuring EV volatility.
pub const VOLATILITY_WINDOW: usize = 10;

/// Market kind an edge was found in. Each kind erodes at its own rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    PlayerProp,
    TeamProp,
    GameTotal,
    Spread,
    Moneyline,
}

impl EdgeType {
    pub const ALL: [Self; 5] = [
        Self::PlayerProp,
        Self::TeamProp,
        Self::GameTotal,
        Self::Spread,
        Self::Moneyline,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PlayerProp => "player_prop",
            Self::TeamProp => "team_prop",
            Self::GameTotal => "game_total",
            Self::Spread => "spread",
            Self::Moneyline => "moneyline",
        }
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeStatus {
    Active,
    /// Still valid, but the persistence score is low.
    Decaying,
    Retired,
}

impl EdgeStatus {
    /// Live edges accept updates. Retired edges are frozen.
    #[must_use]
    pub const fn is_live(self) -> bool {
        !matches!(self, Self::Retired)
    }
}

/// Why an edge was retired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecayReason {
    TimeBased,
    LineMovement,
    VolumeIncrease,
    ModelConfidenceDrop,
    VolatilityHigh,
    Manual,
    FalsePositive,
}

impl DecayReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TimeBased => "time_based",
            Self::LineMovement => "line_movement",
            Self::VolumeIncrease => "volume_increase",
            Self::ModelConfidenceDrop => "confidence_drop",
            Self::VolatilityHigh => "volatility_high",
            Self::Manual => "manual",
            Self::FalsePositive => "false_positive",
        }
    }
}

impl fmt::Display for DecayReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time observation of an edge. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeSnapshot {
    #[serde(skip)]
    pub at: Instant,
    pub recorded_at: DateTime<Utc>,
    pub expected_value: f64,
    pub confidence_score: f64,
    pub line_value: f64,
    pub market_volume: Option<u64>,
    pub volatility: Option<f64>,
}

/// Retirement thresholds for one edge type. First violated rule wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetirementRule {
    /// Decay rate per hour.
    pub decay_rate: f64,
    pub max_age_hours: f64,
    pub min_ev: f64,
    pub min_confidence: f64,
    pub max_line_movement: f64,
    pub max_volatility: f64,
    pub false_positive_threshold: u32,
}

impl RetirementRule {
    /// Built-in rule for an edge type.
    #[must_use]
    pub const fn for_type(edge_type: EdgeType) -> Self {
        let (decay_rate, max_age_hours, min_ev, min_confidence, max_line_movement) =
            match edge_type {
                EdgeType::PlayerProp => (0.08, 12.0, 0.03, 0.4, 0.5),
                EdgeType::TeamProp => (0.12, 8.0, 0.025, 0.35, 0.75),
                EdgeType::GameTotal => (0.15, 6.0, 0.02, 0.3, 1.0),
                EdgeType::Spread => (0.10, 8.0, 0.025, 0.35, 1.5),
                // Moneyline movement is measured in decimal odds.
                EdgeType::Moneyline => (0.20, 4.0, 0.02, 0.3, 0.1),
            };
        Self {
            decay_rate,
            max_age_hours,
            min_ev,
            min_confidence,
            max_line_movement,
            max_volatility: 0.1,
            false_positive_threshold: 3,
        }
    }
}

/// Parameters for a newly detected edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEdge {
    pub id: EdgeId,
    pub game_id: GameId,
    pub prop_id: PropId,
    pub edge_type: EdgeType,
    pub expected_value: f64,
    pub confidence_score: f64,
    pub line_value: f64,
    #[serde(default)]
    pub context: serde_json::Map<String, serde_json::Value>,
}

/// A fresh observation of an existing edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeObservation {
    pub edge_id: EdgeId,
    pub expected_value: f64,
    pub confidence_score: f64,
    pub line_value: f64,
    #[serde(default)]
    pub market_volume: Option<u64>,
    #[serde(default)]
    pub volatility: Option<f64>,
}

/// Edge mutation produced by a valuation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum EdgeUpdate {
    Create(NewEdge),
    Observe(EdgeObservation),
    Retire { edge_id: EdgeId, reason: DecayReason },
}

/// A tracked edge.
#[derive(Debug, Clone, Serialize)]
pub struct Edge {
    pub id: EdgeId,
    pub game_id: GameId,
    pub prop_id: PropId,
    pub edge_type: EdgeType,
    pub initial_ev: f64,
    pub current_ev: f64,
    pub confidence_score: f64,
    pub line_when_created: f64,
    pub current_line: f64,
    pub status: EdgeStatus,
    pub(crate) persistence_score: f64,
    /// Decay rate per hour.
    pub decay_rate: f64,
    pub snapshots: Vec<EdgeSnapshot>,
    pub false_positive_signals: u32,
    /// Weighted adverse line movement accumulated across updates.
    pub line_movement_against: f64,
    pub retirement_reason: Option<DecayReason>,
    pub created_at: DateTime<Utc>,
    pub retired_at: Option<DateTime<Utc>>,
    pub lifespan_hours: Option<f64>,
    pub context: serde_json::Map<String, serde_json::Value>,
    #[serde(skip)]
    pub(crate) created: Instant,
    #[serde(skip)]
    pub(crate) last_updated: Instant,
}

impl Edge {
    /// Open a new edge with a single initial snapshot and a full score.
    #[must_use]
    pub fn open(new: NewEdge, decay_rate: f64, now: Instant) -> Self {
        let recorded_at = Utc::now();
        let snapshot = EdgeSnapshot {
            at: now,
            recorded_at,
            expected_value: new.expected_value,
            confidence_score: new.confidence_score,
            line_value: new.line_value,
            market_volume: None,
            volatility: None,
        };
        Self {
            id: new.id,
            game_id: new.game_id,
            prop_id: new.prop_id,
            edge_type: new.edge_type,
            initial_ev: new.expected_value,
            current_ev: new.expected_value,
            confidence_score: new.confidence_score,
            line_when_created: new.line_value,
            current_line: new.line_value,
            status: EdgeStatus::Active,
            persistence_score: 1.0,
            decay_rate,
            snapshots: vec![snapshot],
            false_positive_signals: 0,
            line_movement_against: 0.0,
            retirement_reason: None,
            created_at: recorded_at,
            retired_at: None,
            lifespan_hours: None,
            context: new.context,
            created: now,
            last_updated: now,
        }
    }

    /// Current persistence score in `[0, 1]`.
    #[must_use]
    pub fn persistence_score(&self) -> f64 {
        self.persistence_score
    }

    #[must_use]
    pub fn is_live(&self) -> bool {
        self.status.is_live()
    }

    /// Age in hours at `now`.
    #[must_use]
    pub fn age_hours(&self, now: Instant) -> f64 {
        now.saturating_duration_since(self.created).as_secs_f64() / 3600.0
    }

    /// Time since the last observation.
    #[must_use]
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_updated)
    }

    /// EV change since creation. Negative when the edge has weakened.
    #[must_use]
    pub fn ev_change(&self) -> f64 {
        self.current_ev - self.initial_ev
    }

    /// Absolute line movement since creation.
    #[must_use]
    pub fn line_movement(&self) -> f64 {
        (self.current_line - self.line_when_created).abs()
    }

    /// Sample standard deviation of the latest snapshot EVs.
    ///
    /// Zero until at least three snapshots exist.
    #[must_use]
    pub fn volatility(&self) -> f64 {
        if self.snapshots.len() < 3 {
            return 0.0;
        }
        let start = self.snapshots.len().saturating_sub(VOLATILITY_WINDOW);
        let evs: Vec<f64> = self.snapshots[start..]
            .iter()
            .map(|s| s.expected_value)
            .collect();
        sample_std_dev(&evs)
    }

    /// EV change across the snapshots taken within `lookback` of `now`.
    ///
    /// Positive means improving. `None` with fewer than two snapshots in range.
    #[must_use]
    pub fn ev_trend(&self, lookback: Duration, now: Instant) -> Option<f64> {
        let cutoff = now.checked_sub(lookback);
        let mut recent = self
            .snapshots
            .iter()
            .filter(|s| cutoff.map_or(true, |c| s.at >= c));
        let first = recent.next()?;
        let last = recent.last()?;
        Some(last.expected_value - first.expected_value)
    }

    /// Append an observation and roll the current values forward.
    pub(crate) fn observe(&mut self, obs: &EdgeObservation, now: Instant) {
        self.snapshots.push(EdgeSnapshot {
            at: now,
            recorded_at: Utc::now(),
            expected_value: obs.expected_value,
            confidence_score: obs.confidence_score,
            line_value: obs.line_value,
            market_volume: obs.market_volume,
            volatility: obs.volatility,
        });

        // A line that rose while EV fell moved against us.
        if obs.line_value > self.line_when_created && obs.expected_value < self.initial_ev {
            self.line_movement_against += (obs.line_value - self.line_when_created).abs() * 0.5;
        }

        self.current_ev = obs.expected_value;
        self.confidence_score = obs.confidence_score;
        self.current_line = obs.line_value;
        self.last_updated = now;
    }

    pub(crate) fn retire(&mut self, reason: DecayReason, now: Instant) {
        self.status = EdgeStatus::Retired;
        self.retirement_reason = Some(reason);
        self.retired_at = Some(Utc::now());
        self.lifespan_hours = Some(self.age_hours(now));
    }
}

fn sample_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    var.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_edge(ev: f64) -> NewEdge {
        NewEdge {
            id: EdgeId::new("e1"),
            game_id: GameId::new("G1"),
            prop_id: PropId::new("player_hits_1"),
            edge_type: EdgeType::PlayerProp,
            expected_value: ev,
            confidence_score: 0.7,
            line_value: 1.5,
            context: serde_json::Map::new(),
        }
    }

    fn observation(ev: f64, line: f64) -> EdgeObservation {
        EdgeObservation {
            edge_id: EdgeId::new("e1"),
            expected_value: ev,
            confidence_score: 0.7,
            line_value: line,
            market_volume: None,
            volatility: None,
        }
    }

    #[test]
    fn open_starts_with_one_snapshot_and_full_score() {
        let edge = Edge::open(new_edge(0.05), 0.08, Instant::now());
        assert_eq!(edge.snapshots.len(), 1);
        assert_eq!(edge.persistence_score(), 1.0);
        assert_eq!(edge.status, EdgeStatus::Active);
    }

    #[test]
    fn volatility_needs_three_snapshots() {
        let now = Instant::now();
        let mut edge = Edge::open(new_edge(0.05), 0.08, now);
        edge.observe(&observation(0.09, 1.5), now);
        assert_eq!(edge.volatility(), 0.0);

        edge.observe(&observation(0.01, 1.5), now);
        // stdev of [0.05, 0.09, 0.01]
        assert!((edge.volatility() - 0.04).abs() < 1e-9);
    }

    #[test]
    fn volatility_uses_latest_ten_snapshots() {
        let now = Instant::now();
        let mut edge = Edge::open(new_edge(5.0), 0.08, now);
        for _ in 0..10 {
            edge.observe(&observation(0.05, 1.5), now);
        }
        assert_eq!(edge.volatility(), 0.0);
    }

    #[test]
    fn adverse_line_movement_accumulates_at_half_weight() {
        let now = Instant::now();
        let mut edge = Edge::open(new_edge(0.05), 0.08, now);
        edge.observe(&observation(0.04, 2.5), now);
        assert!((edge.line_movement_against - 0.5).abs() < 1e-9);

        // Line up but EV improved: not adverse.
        edge.observe(&observation(0.06, 2.5), now);
        assert!((edge.line_movement_against - 0.5).abs() < 1e-9);
        assert!((edge.line_movement() - 1.0).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn ev_trend_only_looks_back_over_window() {
        let mut edge = Edge::open(new_edge(0.05), 0.08, Instant::now());
        tokio::time::advance(Duration::from_secs(2 * 3600)).await;
        edge.observe(&observation(0.04, 1.5), Instant::now());
        assert_eq!(edge.ev_trend(Duration::from_secs(3600), Instant::now()), None);

        edge.observe(&observation(0.07, 1.5), Instant::now());
        let trend = edge.ev_trend(Duration::from_secs(3600), Instant::now()).unwrap();
        assert!((trend - 0.03).abs() < 1e-9);
        assert!((edge.age_hours(Instant::now()) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn builtin_rules_match_market_speed() {
        assert!(
            RetirementRule::for_type(EdgeType::PlayerProp).decay_rate
                < RetirementRule::for_type(EdgeType::Moneyline).decay_rate
        );
        assert_eq!(RetirementRule::for_type(EdgeType::Spread).max_line_movement, 1.5);
    }
}
