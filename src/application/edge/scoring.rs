//! Persistence scoring and retirement checks.
//!
//! `score = exp(-decay_rate * age_hours) * ev * confidence * movement * volatility`
//! where every factor lies in `(0, 1]`.

use tokio::time::Instant;

use crate::domain::edge::{DecayReason, Edge, RetirementRule};

/// Floor of the EV factor once EV has declined.
const MIN_EV_FACTOR: f64 = 0.2;
/// Floor of the line movement factor.
const MIN_MOVEMENT_FACTOR: f64 = 0.1;
/// Floor of the volatility factor.
const MIN_VOLATILITY_FACTOR: f64 = 0.3;

/// Penalty for EV lost since creation.
fn ev_factor(edge: &Edge) -> f64 {
    let change = edge.ev_change();
    if change >= 0.0 {
        return 1.0;
    }
    if edge.initial_ev <= 0.0 {
        return MIN_EV_FACTOR;
    }
    (1.0 + change / edge.initial_ev).clamp(MIN_EV_FACTOR, 1.0)
}

fn movement_factor(edge: &Edge, rule: &RetirementRule) -> f64 {
    let movement = edge.line_movement();
    if movement <= 0.0 || rule.max_line_movement <= 0.0 {
        return 1.0;
    }
    (1.0 - 0.5 * movement / rule.max_line_movement).clamp(MIN_MOVEMENT_FACTOR, 1.0)
}

fn volatility_factor(volatility: f64, penalty_threshold: f64) -> f64 {
    if volatility > penalty_threshold {
        (1.0 - volatility).clamp(MIN_VOLATILITY_FACTOR, 1.0)
    } else {
        1.0
    }
}

/// Persistence score in `[0, 1]` at `now`.
#[must_use]
pub fn persistence_score(
    edge: &Edge,
    rule: &RetirementRule,
    now: Instant,
    volatility_penalty_threshold: f64,
) -> f64 {
    let time_decay = (-rule.decay_rate * edge.age_hours(now)).exp();
    let confidence = edge.confidence_score.clamp(0.0, 1.0);
    let score = time_decay
        * ev_factor(edge)
        * confidence
        * movement_factor(edge, rule)
        * volatility_factor(edge.volatility(), volatility_penalty_threshold);
    score.clamp(0.0, 1.0)
}

/// First violated retirement rule, checked in a fixed order: age, EV,
/// confidence, line movement, volatility, false positives.
#[must_use]
pub fn retirement_violation(edge: &Edge, rule: &RetirementRule, now: Instant) -> Option<DecayReason> {
    if edge.age_hours(now) > rule.max_age_hours {
        return Some(DecayReason::TimeBased);
    }
    if edge.current_ev < rule.min_ev {
        return Some(DecayReason::ModelConfidenceDrop);
    }
    if edge.confidence_score < rule.min_confidence {
        return Some(DecayReason::ModelConfidenceDrop);
    }
    if edge.line_movement() > rule.max_line_movement {
        return Some(DecayReason::LineMovement);
    }
    if edge.volatility() > rule.max_volatility {
        return Some(DecayReason::VolatilityHigh);
    }
    if edge.false_positive_signals >= rule.false_positive_threshold {
        return Some(DecayReason::FalsePositive);
    }
    None
}
