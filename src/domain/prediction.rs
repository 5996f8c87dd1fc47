//! Prediction domain types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use super::id::{GameId, PredictionId};

/// Prop category. Calibration is tracked per category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropType {
    PitcherStrikeouts,
    BatterHits,
    RunsTotal,
    HomeRuns,
    Rbis,
    StolenBases,
    TeamRuns,
    GameTotal,
    Spread,
    Moneyline,
}

impl PropType {
    pub const ALL: [Self; 10] = [
        Self::PitcherStrikeouts,
        Self::BatterHits,
        Self::RunsTotal,
        Self::HomeRuns,
        Self::Rbis,
        Self::StolenBases,
        Self::TeamRuns,
        Self::GameTotal,
        Self::Spread,
        Self::Moneyline,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PitcherStrikeouts => "pitcher_strikeouts",
            Self::BatterHits => "batter_hits",
            Self::RunsTotal => "runs_total",
            Self::HomeRuns => "home_runs",
            Self::Rbis => "rbis",
            Self::StolenBases => "stolen_bases",
            Self::TeamRuns => "team_runs",
            Self::GameTotal => "game_total",
            Self::Spread => "spread",
            Self::Moneyline => "moneyline",
        }
    }
}

impl fmt::Display for PropType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeType {
    Over,
    Under,
    /// Actual value landed on the line. No win or loss.
    Push,
}

impl OutcomeType {
    /// Classify an actual value against a line.
    #[must_use]
    pub fn against_line(actual: f64, line: f64) -> Self {
        if actual > line {
            Self::Over
        } else if actual < line {
            Self::Under
        } else {
            Self::Push
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    PreGame,
    /// Innings 1-3.
    LiveEarly,
    /// Innings 4-6.
    LiveMid,
    /// Innings 7+.
    LiveLate,
    PostGame,
}

impl GamePhase {
    pub const ALL: [Self; 5] = [
        Self::PreGame,
        Self::LiveEarly,
        Self::LiveMid,
        Self::LiveLate,
        Self::PostGame,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamSide {
    Home,
    Away,
}

/// Who a prop is about.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum PropSubject {
    /// Whole-game props (totals, spreads).
    #[default]
    Game,
    Team(TeamSide),
    Player(String),
}

/// Input for recording a prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPrediction {
    pub id: PredictionId,
    pub game_id: GameId,
    pub prop_type: PropType,
    pub prop_line: f64,
    pub predicted_value: f64,
    /// Probability of OVER.
    pub predicted_probability: f64,
    /// Model confidence, used for calibration binning.
    pub confidence_score: f64,
    #[serde(default = "default_model_version")]
    pub model_version: String,
    #[serde(default = "default_game_phase")]
    pub game_phase: GamePhase,
    #[serde(default)]
    pub subject: PropSubject,
}

fn default_model_version() -> String {
    "1.0".into()
}

const fn default_game_phase() -> GamePhase {
    GamePhase::PreGame
}

/// A recorded prediction. Settled exactly once.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub id: PredictionId,
    pub game_id: GameId,
    pub prop_type: PropType,
    pub prop_line: f64,
    pub predicted_value: f64,
    pub predicted_probability: f64,
    pub confidence_score: f64,
    pub model_version: String,
    pub game_phase: GamePhase,
    pub subject: PropSubject,
    pub created_at: DateTime<Utc>,
    pub actual_value: Option<f64>,
    pub outcome: Option<OutcomeType>,
    pub settled_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub(crate) recorded: Instant,
    #[serde(skip)]
    pub(crate) settled: Option<Instant>,
}

impl Prediction {
    #[must_use]
    pub fn from_new(new: NewPrediction, now: Instant) -> Self {
        Self {
            id: new.id,
            game_id: new.game_id,
            prop_type: new.prop_type,
            prop_line: new.prop_line,
            predicted_value: new.predicted_value,
            predicted_probability: new.predicted_probability,
            confidence_score: new.confidence_score,
            model_version: new.model_version,
            game_phase: new.game_phase,
            subject: new.subject,
            created_at: Utc::now(),
            actual_value: None,
            outcome: None,
            settled_at: None,
            recorded: now,
            settled: None,
        }
    }

    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.actual_value.is_some() && self.outcome.is_some()
    }

    /// Whether the prediction called the side correctly.
    ///
    /// `None` when unsettled or when the outcome was a push.
    #[must_use]
    pub fn was_correct(&self) -> Option<bool> {
        match self.outcome? {
            OutcomeType::Push => None,
            outcome => {
                self.actual_value?;
                Some((self.predicted_probability > 0.5) == (outcome == OutcomeType::Over))
            }
        }
    }

    /// Absolute error between predicted and actual value.
    #[must_use]
    pub fn prediction_error(&self) -> Option<f64> {
        self.actual_value.map(|actual| (self.predicted_value - actual).abs())
    }

    pub(crate) fn settle(&mut self, actual: f64, outcome: OutcomeType, now: Instant) {
        self.actual_value = Some(actual);
        self.outcome = Some(outcome);
        self.settled_at = Some(Utc::now());
        self.settled = Some(now);
    }
}
