//! Type and priority decisions for incoming triggers.
//!
//! Both decisions are pure functions of the request, so the same trigger
//! always yields the same job shape.

use crate::domain::id::PropId;
use crate::domain::recompute::{
    DecisionReason, RecomputePriority, RecomputeTrigger, RecomputeType, TriggerContext,
};

/// Prop id fragments for player markets. These move fastest and are the most
/// exposed, so jobs touching them jump the queue.
const PLAYER_PROP_PATTERNS: [&str; 3] = ["player_", "pitcher_strikeouts", "batter_hits"];

/// Prop id fragments for long-dated markets.
const FUTURES_PROP_PATTERNS: [&str; 3] = ["futures_", "season_", "award_"];

/// Only the first few props are inspected when deriving priority.
const PRIORITY_SCAN_LIMIT: usize = 5;

/// Decide how much work a trigger needs and why.
///
/// Line changes are FAST unless the magnitude is strictly greater than
/// `major_line_move_threshold`. Every other trigger is FULL. A forced type
/// overrides the decision and is recorded as a forced override.
#[must_use]
pub fn decide_type(
    trigger: RecomputeTrigger,
    context: &TriggerContext,
    force_type: Option<RecomputeType>,
    major_line_move_threshold: f64,
) -> (RecomputeType, DecisionReason) {
    if let Some(forced) = force_type {
        return (forced, DecisionReason::ForcedOverride);
    }

    match trigger {
        RecomputeTrigger::LineChange => {
            let magnitude = context.line_change_magnitude().unwrap_or(0.0);
            if magnitude > major_line_move_threshold {
                (RecomputeType::Full, DecisionReason::MajorLineMove)
            } else {
                (RecomputeType::Fast, DecisionReason::MinorLineMove)
            }
        }
        RecomputeTrigger::LineupUpdate => (RecomputeType::Full, DecisionReason::LineupChange),
        RecomputeTrigger::WeatherChange => (RecomputeType::Full, DecisionReason::WeatherUpdate),
        RecomputeTrigger::InjuryUpdate => (RecomputeType::Full, DecisionReason::InjuryReport),
        RecomputeTrigger::LiveEvent => (RecomputeType::Full, DecisionReason::LiveScoring),
        RecomputeTrigger::Manual => (RecomputeType::Full, DecisionReason::ForcedOverride),
        RecomputeTrigger::Scheduled => {
            (RecomputeType::Full, DecisionReason::ScheduledMaintenance)
        }
    }
}

/// Derive static priority from the props a job touches.
///
/// Whole-game jobs are HIGH. Any player prop among the first five makes the
/// job CRITICAL. If every inspected prop is a futures market the job is LOW.
#[must_use]
pub fn decide_priority(prop_ids: &[PropId]) -> RecomputePriority {
    if prop_ids.is_empty() {
        return RecomputePriority::High;
    }

    let inspected: Vec<String> = prop_ids
        .iter()
        .take(PRIORITY_SCAN_LIMIT)
        .map(|p| p.as_str().to_ascii_lowercase())
        .collect();

    if inspected
        .iter()
        .any(|id| PLAYER_PROP_PATTERNS.iter().any(|p| id.contains(p)))
    {
        return RecomputePriority::Critical;
    }

    if inspected
        .iter()
        .all(|id| FUTURES_PROP_PATTERNS.iter().any(|p| id.contains(p)))
    {
        return RecomputePriority::Low;
    }

    RecomputePriority::Medium
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(ids: &[&str]) -> Vec<PropId> {
        ids.iter().map(|s| PropId::new(*s)).collect()
    }

    #[test]
    fn line_change_boundary_is_strict() {
        let at = decide_type(
            RecomputeTrigger::LineChange,
            &TriggerContext::line_change(0.5),
            None,
            0.5,
        );
        assert_eq!(at, (RecomputeType::Fast, DecisionReason::MinorLineMove));

        let above = decide_type(
            RecomputeTrigger::LineChange,
            &TriggerContext::line_change(0.6),
            None,
            0.5,
        );
        assert_eq!(above, (RecomputeType::Full, DecisionReason::MajorLineMove));
    }

    #[test]
    fn line_change_without_context_is_fast() {
        let decision = decide_type(RecomputeTrigger::LineChange, &TriggerContext::None, None, 0.5);
        assert_eq!(decision.0, RecomputeType::Fast);
    }

    #[test]
    fn structural_triggers_are_full_with_distinct_reasons() {
        let cases = [
            (RecomputeTrigger::LineupUpdate, DecisionReason::LineupChange),
            (RecomputeTrigger::WeatherChange, DecisionReason::WeatherUpdate),
            (RecomputeTrigger::InjuryUpdate, DecisionReason::InjuryReport),
            (RecomputeTrigger::LiveEvent, DecisionReason::LiveScoring),
            (RecomputeTrigger::Manual, DecisionReason::ForcedOverride),
            (RecomputeTrigger::Scheduled, DecisionReason::ScheduledMaintenance),
        ];
        for (trigger, reason) in cases {
            assert_eq!(
                decide_type(trigger, &TriggerContext::None, None, 0.5),
                (RecomputeType::Full, reason)
            );
        }
    }

    #[test]
    fn forced_type_wins() {
        let decision = decide_type(
            RecomputeTrigger::LineupUpdate,
            &TriggerContext::None,
            Some(RecomputeType::Fast),
            0.5,
        );
        assert_eq!(decision, (RecomputeType::Fast, DecisionReason::ForcedOverride));
    }

    #[test]
    fn priority_from_props() {
        assert_eq!(decide_priority(&[]), RecomputePriority::High);
        assert_eq!(
            decide_priority(&props(&["team_total_home", "Player_Hits_12"])),
            RecomputePriority::Critical
        );
        assert_eq!(
            decide_priority(&props(&["game_total", "spread_home"])),
            RecomputePriority::Medium
        );
        assert_eq!(
            decide_priority(&props(&["futures_ws_winner", "award_mvp"])),
            RecomputePriority::Low
        );
        assert_eq!(
            decide_priority(&props(&["futures_ws_winner", "game_total"])),
            RecomputePriority::Medium
        );
    }

    #[test]
    fn only_first_five_props_are_inspected() {
        let ids = props(&["a", "b", "c", "d", "e", "player_hits_1"]);
        assert_eq!(decide_priority(&ids), RecomputePriority::Medium);
    }
}
