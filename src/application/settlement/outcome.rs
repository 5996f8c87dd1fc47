//! Actual outcomes from game results.

use thiserror::Error;

use crate::domain::prediction::{OutcomeType, Prediction, PropSubject, PropType};
use crate::domain::settlement::{GameResult, PlayerStatLine, SettlementStatus};

use super::config::SettlementConfig;

/// Why a prediction cannot be settled from a game result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Unsettleable {
    #[error("prop type {0} is not settled from game results")]
    UnsupportedPropType(PropType),

    #[error("{0} prediction has no matching subject")]
    MissingSubject(PropType),

    #[error("no stat line for player {0}")]
    MissingPlayer(String),
}

fn player_stat(prop_type: PropType, stats: &PlayerStatLine) -> Option<u32> {
    match prop_type {
        PropType::PitcherStrikeouts => Some(stats.strikeouts),
        PropType::BatterHits => Some(stats.hits),
        PropType::HomeRuns => Some(stats.home_runs),
        PropType::Rbis => Some(stats.rbis),
        PropType::StolenBases => Some(stats.stolen_bases),
        _ => None,
    }
}

/// The actual value of a prediction's prop in a completed game.
pub fn actual_value(prediction: &Prediction, result: &GameResult) -> Result<f64, Unsettleable> {
    let prop_type = prediction.prop_type;
    match prop_type {
        PropType::GameTotal | PropType::RunsTotal => Ok(f64::from(result.total_runs())),
        PropType::TeamRuns => match prediction.subject {
            PropSubject::Team(side) => Ok(f64::from(result.team_runs(side))),
            _ => Err(Unsettleable::MissingSubject(prop_type)),
        },
        PropType::PitcherStrikeouts
        | PropType::BatterHits
        | PropType::HomeRuns
        | PropType::Rbis
        | PropType::StolenBases => {
            let PropSubject::Player(player) = &prediction.subject else {
                return Err(Unsettleable::MissingSubject(prop_type));
            };
            let stats = result
                .player_stats
                .get(player)
                .ok_or_else(|| Unsettleable::MissingPlayer(player.clone()))?;
            player_stat(prop_type, stats)
                .map(f64::from)
                .ok_or(Unsettleable::UnsupportedPropType(prop_type))
        }
        PropType::Spread | PropType::Moneyline => Err(Unsettleable::UnsupportedPropType(prop_type)),
    }
}

/// How a settlement compares with what the model said.
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    pub outcome: OutcomeType,
    pub status: SettlementStatus,
    pub error_magnitude: f64,
    pub is_outlier: bool,
    pub mismatch_reason: Option<String>,
}

/// Classify an actual value against the prediction.
///
/// A mismatch takes precedence over an outlier in `status`; `is_outlier` is
/// kept either way.
pub fn assess(prediction: &Prediction, actual: f64, config: &SettlementConfig) -> Assessment {
    let outcome = OutcomeType::against_line(actual, prediction.prop_line);
    let error_magnitude = (actual - prediction.predicted_value).abs();
    let is_outlier = error_magnitude > prediction.predicted_value * config.outlier_error_ratio;

    let predicted_over = prediction.predicted_probability > 0.5;
    let wrong = match outcome {
        OutcomeType::Over => !predicted_over,
        OutcomeType::Under => predicted_over,
        OutcomeType::Push => false,
    };
    let mismatch_reason = (wrong && prediction.confidence_score > config.mismatch_confidence)
        .then(|| {
            format!(
                "High confidence ({:.2}) prediction wrong",
                prediction.confidence_score
            )
        });

    let status = if mismatch_reason.is_some() {
        SettlementStatus::Mismatched
    } else if is_outlier {
        SettlementStatus::Outlier
    } else {
        SettlementStatus::Matched
    };

    Assessment {
        outcome,
        status,
        error_magnitude,
        is_outlier,
        mismatch_reason,
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::Instant;

    use super::*;
    use crate::domain::prediction::TeamSide;
    use crate::testkit::domain::{
        game_result, player_prediction, prediction, team_prediction, with_player,
    };

    fn recorded(new: crate::domain::prediction::NewPrediction) -> Prediction {
        Prediction::from_new(new, Instant::now())
    }

    #[test]
    fn totals_use_both_scores() {
        let result = game_result("G1", 5, 3);
        let p = recorded(prediction("p", "G1", PropType::GameTotal, 8.5, 0.6, 0.7));
        assert_eq!(actual_value(&p, &result), Ok(8.0));
        let p = recorded(prediction("p", "G1", PropType::RunsTotal, 8.5, 0.6, 0.7));
        assert_eq!(actual_value(&p, &result), Ok(8.0));
    }

    #[test]
    fn team_runs_follow_the_side() {
        let result = game_result("G1", 5, 3);
        let p = recorded(team_prediction("p", "G1", TeamSide::Away, 3.5, 4.0, 0.6, 0.7));
        assert_eq!(actual_value(&p, &result), Ok(3.0));

        let game_subject = recorded(prediction("p", "G1", PropType::TeamRuns, 3.5, 0.6, 0.7));
        assert_eq!(
            actual_value(&game_subject, &result),
            Err(Unsettleable::MissingSubject(PropType::TeamRuns))
        );
    }

    #[test]
    fn player_props_read_the_stat_line() {
        let result = with_player(
            game_result("G1", 5, 3),
            "ace",
            PlayerStatLine {
                strikeouts: 9,
                stolen_bases: 1,
                ..PlayerStatLine::default()
            },
        );
        let k = recorded(player_prediction(
            "k",
            "G1",
            PropType::PitcherStrikeouts,
            "ace",
            6.5,
            7.5,
            0.7,
            0.7,
        ));
        assert_eq!(actual_value(&k, &result), Ok(9.0));

        let sb = recorded(player_prediction(
            "sb",
            "G1",
            PropType::StolenBases,
            "ace",
            0.5,
            1.0,
            0.6,
            0.6,
        ));
        assert_eq!(actual_value(&sb, &result), Ok(1.0));

        let missing = recorded(player_prediction(
            "m",
            "G1",
            PropType::BatterHits,
            "nobody",
            0.5,
            1.0,
            0.6,
            0.6,
        ));
        assert_eq!(
            actual_value(&missing, &result),
            Err(Unsettleable::MissingPlayer("nobody".into()))
        );
    }

    #[test]
    fn spreads_are_not_settled() {
        let result = game_result("G1", 5, 3);
        let p = recorded(prediction("p", "G1", PropType::Spread, -1.5, 0.6, 0.7));
        assert_eq!(
            actual_value(&p, &result),
            Err(Unsettleable::UnsupportedPropType(PropType::Spread))
        );
    }

    #[test]
    fn line_equality_is_a_push_and_never_a_mismatch() {
        let config = SettlementConfig::default();
        let p = recorded(prediction("p", "G1", PropType::GameTotal, 8.0, 0.9, 0.95));
        let a = assess(&p, 8.0, &config);
        assert_eq!(a.outcome, OutcomeType::Push);
        assert_eq!(a.status, SettlementStatus::Matched);
        assert!(a.mismatch_reason.is_none());
    }

    #[test]
    fn confident_wrong_call_is_a_mismatch() {
        let config = SettlementConfig::default();
        // Predicted 9.5 over 8.5 at 0.85 confidence; 7 runs scored.
        let p = recorded(prediction("p", "G1", PropType::GameTotal, 8.5, 0.7, 0.85));
        let a = assess(&p, 7.0, &config);
        assert_eq!(a.outcome, OutcomeType::Under);
        assert_eq!(a.status, SettlementStatus::Mismatched);
        assert!(!a.is_outlier);
        assert!((a.error_magnitude - 2.5).abs() < 1e-9);

        // Same miss at 0.8 confidence is not a mismatch.
        let p = recorded(prediction("q", "G1", PropType::GameTotal, 8.5, 0.7, 0.8));
        assert_eq!(assess(&p, 7.0, &config).status, SettlementStatus::Matched);
    }

    #[test]
    fn large_error_is_an_outlier() {
        let config = SettlementConfig::default();
        let p = recorded(player_prediction(
            "k",
            "G1",
            PropType::PitcherStrikeouts,
            "ace",
            6.5,
            7.0,
            0.7,
            0.6,
        ));
        // |14 - 7| > 3.5
        let a = assess(&p, 14.0, &config);
        assert!(a.is_outlier);
        assert_eq!(a.status, SettlementStatus::Outlier);
        assert_eq!(a.outcome, OutcomeType::Over);
    }
}
