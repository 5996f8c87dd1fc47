//! Settlement domain types.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{EdgeId, GameId, PredictionId};
use super::prediction::{OutcomeType, PropType, TeamSide};

/// Runs scored in one inning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InningScore {
    pub inning: u8,
    pub home: u32,
    pub away: u32,
}

/// Per-player counting stats used for settlement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerStatLine {
    pub strikeouts: u32,
    pub hits: u32,
    pub home_runs: u32,
    pub rbis: u32,
    pub stolen_bases: u32,
}

/// Final result of a completed game, as supplied by a result source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameResult {
    pub game_id: GameId,
    #[serde(default = "default_sport")]
    pub sport: String,
    pub final_score_home: u32,
    pub final_score_away: u32,
    pub completed_at: DateTime<Utc>,
    #[serde(default)]
    pub inning_scores: Vec<InningScore>,
    /// Player id to stat line.
    #[serde(default)]
    pub player_stats: HashMap<String, PlayerStatLine>,
}

fn default_sport() -> String {
    "mlb".into()
}

impl GameResult {
    #[must_use]
    pub fn total_runs(&self) -> u32 {
        self.final_score_home + self.final_score_away
    }

    #[must_use]
    pub fn team_runs(&self, side: TeamSide) -> u32 {
        match side {
            TeamSide::Home => self.final_score_home,
            TeamSide::Away => self.final_score_away,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementStatus {
    Matched,
    /// A high-confidence prediction called the wrong side.
    Mismatched,
    /// Absolute error exceeded the outlier ratio of the predicted value.
    Outlier,
}

/// Audit record for one settled prediction. Never auto-corrected.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettlementRecord {
    pub prediction_id: PredictionId,
    pub game_id: GameId,
    pub prop_type: PropType,
    pub predicted_value: f64,
    pub actual_value: f64,
    pub outcome: OutcomeType,
    pub status: SettlementStatus,
    pub error_magnitude: f64,
    pub is_outlier: bool,
    pub mismatch_reason: Option<String>,
    pub edge_id: Option<EdgeId>,
    pub processed_at: DateTime<Utc>,
}
