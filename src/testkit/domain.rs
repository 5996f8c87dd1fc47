//! Builders for domain values used across tests.
//!
//! Concise factories so tests focus on assertions rather than construction
//! boilerplate.

use std::collections::HashMap;

use chrono::Utc;

use crate::domain::edge::{EdgeObservation, EdgeType, NewEdge};
use crate::domain::id::{EdgeId, GameId, JobId, PredictionId, PropId};
use crate::domain::prediction::{GamePhase, NewPrediction, PropSubject, PropType, TeamSide};
use crate::domain::recompute::{
    DecisionReason, RecomputeJob, RecomputePriority, RecomputeTrigger, RecomputeType,
    TriggerContext,
};
use crate::domain::settlement::{GameResult, PlayerStatLine};

/// Generate `n` game ids named `G0`, `G1`, ..., `G{n-1}`.
pub fn make_games(n: usize) -> Vec<GameId> {
    (0..n).map(|i| GameId::from(format!("G{i}"))).collect()
}

/// Create [`PropId`]s from strings.
pub fn props(ids: &[&str]) -> Vec<PropId> {
    ids.iter().copied().map(PropId::from).collect()
}

/// A manual FAST job for a whole game, as handed to a valuation engine.
pub fn job(game_id: &str) -> RecomputeJob {
    let now = Utc::now();
    RecomputeJob {
        id: JobId::new(),
        game_id: GameId::from(game_id),
        prop_ids: Vec::new(),
        recompute_type: RecomputeType::Fast,
        priority: RecomputePriority::Medium,
        trigger: RecomputeTrigger::Manual,
        decision_reason: DecisionReason::ForcedOverride,
        created_at: now,
        scheduled_for: now,
        attempts: 0,
        max_attempts: RecomputeJob::DEFAULT_MAX_ATTEMPTS,
        priority_boost: 0.0,
        context: TriggerContext::None,
        enqueued_at: tokio::time::Instant::now(),
    }
}

/// A new edge on prop `prop` of game `G1`.
pub fn new_edge(id: &str, edge_type: EdgeType, ev: f64, confidence: f64, line: f64) -> NewEdge {
    NewEdge {
        id: EdgeId::from(id),
        game_id: GameId::from("G1"),
        prop_id: PropId::from("prop"),
        edge_type,
        expected_value: ev,
        confidence_score: confidence,
        line_value: line,
        context: serde_json::Map::new(),
    }
}

/// An observation of edge `id` without market volume.
pub fn observation(id: &str, ev: f64, confidence: f64, line: f64) -> EdgeObservation {
    EdgeObservation {
        edge_id: EdgeId::from(id),
        expected_value: ev,
        confidence_score: confidence,
        line_value: line,
        market_volume: None,
        volatility: None,
    }
}

/// A pre-game whole-game prediction.
///
/// `predicted_value` defaults to the line plus one; adjust the returned
/// value for other shapes.
pub fn prediction(
    id: &str,
    game_id: &str,
    prop_type: PropType,
    line: f64,
    probability: f64,
    confidence: f64,
) -> NewPrediction {
    NewPrediction {
        id: PredictionId::from(id),
        game_id: GameId::from(game_id),
        prop_type,
        prop_line: line,
        predicted_value: line + 1.0,
        predicted_probability: probability,
        confidence_score: confidence,
        model_version: "test".into(),
        game_phase: GamePhase::PreGame,
        subject: PropSubject::Game,
    }
}

/// A player prediction.
#[allow(clippy::too_many_arguments)]
pub fn player_prediction(
    id: &str,
    game_id: &str,
    prop_type: PropType,
    player: &str,
    line: f64,
    predicted_value: f64,
    probability: f64,
    confidence: f64,
) -> NewPrediction {
    NewPrediction {
        predicted_value,
        subject: PropSubject::Player(player.into()),
        ..prediction(id, game_id, prop_type, line, probability, confidence)
    }
}

/// A team prediction for `side`.
pub fn team_prediction(
    id: &str,
    game_id: &str,
    side: TeamSide,
    line: f64,
    predicted_value: f64,
    probability: f64,
    confidence: f64,
) -> NewPrediction {
    NewPrediction {
        predicted_value,
        subject: PropSubject::Team(side),
        ..prediction(id, game_id, PropType::TeamRuns, line, probability, confidence)
    }
}

/// A completed game with no player stats.
pub fn game_result(game_id: &str, home: u32, away: u32) -> GameResult {
    GameResult {
        game_id: GameId::from(game_id),
        sport: "mlb".into(),
        final_score_home: home,
        final_score_away: away,
        completed_at: Utc::now(),
        inning_scores: Vec::new(),
        player_stats: HashMap::new(),
    }
}

/// Add a player's stat line to a game result.
pub fn with_player(mut result: GameResult, player: &str, stats: PlayerStatLine) -> GameResult {
    result.player_stats.insert(player.to_string(), stats);
    result
}
