//! Metric derivation from settled predictions.
//!
//! Everything here is a pure function of its inputs. The harness re-derives a
//! prop type's metrics wholesale on every settlement, so repeated derivations
//! over the same predictions are identical.

use std::collections::BTreeMap;

use crate::domain::calibration::{
    CalibrationBin, PhaseMetrics, PropTypeMetrics, ReliabilityBin, CONFIDENCE_BINS,
};
use crate::domain::prediction::{GamePhase, OutcomeType, Prediction, PropType};

use super::config::CalibrationConfig;

/// Number of equal-width reliability bins over predicted probability.
const RELIABILITY_BINS: usize = 10;

/// Inputs for one derivation.
pub(crate) struct Derivation<'a> {
    pub prop_type: PropType,
    pub total_predictions: usize,
    /// Settled predictions of the prop type.
    pub settled: &'a [&'a Prediction],
    /// Latest settlements, oldest first, capped at the rolling window.
    pub rolling: &'a [&'a Prediction],
}

/// Derive a prop type's metrics.
///
/// Counts are always derived. Bins and error statistics are only derived once
/// the prop type reaches `min_samples` settled predictions.
pub(crate) fn derive(input: &Derivation<'_>, config: &CalibrationConfig) -> PropTypeMetrics {
    let mut metrics = PropTypeMetrics::empty(input.prop_type);
    metrics.total_predictions = input.total_predictions;
    metrics.settled_predictions = input.settled.len();
    metrics.decided_predictions = input
        .settled
        .iter()
        .filter(|p| p.was_correct().is_some())
        .count();
    metrics.correct_predictions = input
        .settled
        .iter()
        .filter(|p| p.was_correct() == Some(true))
        .count();
    metrics.rolling_accuracy = accuracy(input.rolling);

    if input.settled.len() < config.min_samples {
        return metrics;
    }

    metrics.calibrated = true;
    metrics.calibration_bins = calibration_bins(input.settled);
    metrics.reliability_bins = reliability_bins(input.settled);
    metrics.mean_calibration_error =
        mean_calibration_error(&metrics.calibration_bins, config.bin_min_samples);
    metrics.brier_score = brier_score(input.settled);
    metrics.mean_absolute_error = mean(input.settled.iter().filter_map(|p| p.prediction_error()));
    metrics.mean_squared_error = mean(
        input
            .settled
            .iter()
            .filter_map(|p| p.prediction_error())
            .map(|e| e * e),
    );
    metrics.phase_metrics = phase_metrics(input.settled);
    metrics
}

fn in_bin(confidence: f64, lower: f64, upper: f64) -> bool {
    // The top bin is closed so a confidence of exactly 1.0 lands somewhere.
    if upper >= 1.0 {
        (lower..=upper).contains(&confidence)
    } else {
        (lower..upper).contains(&confidence)
    }
}

/// Confidence bins that hold at least one prediction.
pub(crate) fn calibration_bins(settled: &[&Prediction]) -> Vec<CalibrationBin> {
    CONFIDENCE_BINS
        .iter()
        .filter_map(|&(lower, upper)| {
            let members: Vec<&&Prediction> = settled
                .iter()
                .filter(|p| in_bin(p.confidence_score, lower, upper))
                .collect();
            if members.is_empty() {
                return None;
            }
            Some(CalibrationBin {
                lower,
                upper,
                sample_count: members.len(),
                correct_count: members
                    .iter()
                    .filter(|p| p.was_correct() == Some(true))
                    .count(),
                total_count: members.iter().filter(|p| p.was_correct().is_some()).count(),
            })
        })
        .collect()
}

/// Mean error of bins with more than `min_samples` decided predictions.
pub(crate) fn mean_calibration_error(bins: &[CalibrationBin], min_samples: usize) -> f64 {
    mean(
        bins.iter()
            .filter(|b| b.total_count > min_samples)
            .map(CalibrationBin::calibration_error),
    )
}

/// Decile bins over predicted OVER probability. Pushes are excluded.
pub(crate) fn reliability_bins(settled: &[&Prediction]) -> Vec<ReliabilityBin> {
    let mut buckets: Vec<(f64, usize, usize)> = vec![(0.0, 0, 0); RELIABILITY_BINS];
    for p in settled {
        let over = match p.outcome {
            Some(OutcomeType::Over) => 1,
            Some(OutcomeType::Under) => 0,
            Some(OutcomeType::Push) | None => continue,
        };
        let probability = p.predicted_probability.clamp(0.0, 1.0);
        let index = ((probability * RELIABILITY_BINS as f64) as usize).min(RELIABILITY_BINS - 1);
        let bucket = &mut buckets[index];
        bucket.0 += probability;
        bucket.1 += over;
        bucket.2 += 1;
    }

    buckets
        .into_iter()
        .enumerate()
        .filter(|(_, (_, _, n))| *n > 0)
        .map(|(i, (prob_sum, overs, n))| ReliabilityBin {
            lower: i as f64 / RELIABILITY_BINS as f64,
            upper: (i + 1) as f64 / RELIABILITY_BINS as f64,
            expected_prob: prob_sum / n as f64,
            observed_freq: overs as f64 / n as f64,
            sample_count: n,
        })
        .collect()
}

/// Mean squared error of the OVER probability against the binary outcome.
pub(crate) fn brier_score(settled: &[&Prediction]) -> f64 {
    mean(settled.iter().filter_map(|p| {
        let actual = match p.outcome? {
            OutcomeType::Over => 1.0,
            OutcomeType::Under => 0.0,
            OutcomeType::Push => return None,
        };
        Some((p.predicted_probability - actual).powi(2))
    }))
}

/// Share of correct predictions among decided ones.
pub(crate) fn accuracy(predictions: &[&Prediction]) -> f64 {
    let (correct, decided) = predictions
        .iter()
        .filter_map(|p| p.was_correct())
        .fold((0usize, 0usize), |(c, d), ok| (c + usize::from(ok), d + 1));
    if decided == 0 {
        0.0
    } else {
        correct as f64 / decided as f64
    }
}

fn phase_metrics(settled: &[&Prediction]) -> BTreeMap<GamePhase, PhaseMetrics> {
    GamePhase::ALL
        .into_iter()
        .filter_map(|phase| {
            let members: Vec<&Prediction> = settled
                .iter()
                .copied()
                .filter(|p| p.game_phase == phase)
                .collect();
            if members.is_empty() {
                return None;
            }
            Some((
                phase,
                PhaseMetrics {
                    count: members.len(),
                    accuracy: accuracy(&members),
                    brier_score: brier_score(&members),
                },
            ))
        })
        .collect()
}

pub(crate) fn mean(values: impl IntoIterator<Item = f64>) -> f64 {
    let (sum, n) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::Instant;

    use super::*;
    use crate::domain::id::{GameId, PredictionId};
    use crate::domain::prediction::{NewPrediction, PropSubject};

    fn settled(i: usize, confidence: f64, probability: f64, outcome: OutcomeType) -> Prediction {
        let mut p = Prediction::from_new(
            NewPrediction {
                id: PredictionId::new(format!("p{i}")),
                game_id: GameId::new("G1"),
                prop_type: PropType::PitcherStrikeouts,
                prop_line: 6.5,
                predicted_value: 7.0,
                predicted_probability: probability,
                confidence_score: confidence,
                model_version: "1.0".into(),
                game_phase: GamePhase::PreGame,
                subject: PropSubject::Game,
            },
            Instant::now(),
        );
        let actual = match outcome {
            OutcomeType::Over => 8.0,
            OutcomeType::Under => 5.0,
            OutcomeType::Push => 6.5,
        };
        p.settle(actual, outcome, Instant::now());
        p
    }

    #[test]
    fn bins_are_half_open_except_the_last() {
        let preds = [
            settled(0, 0.6, 0.7, OutcomeType::Over),
            settled(1, 0.59, 0.7, OutcomeType::Over),
            settled(2, 1.0, 0.7, OutcomeType::Over),
            settled(3, 0.3, 0.7, OutcomeType::Over),
        ];
        let refs: Vec<&Prediction> = preds.iter().collect();
        let bins = calibration_bins(&refs);
        let spans: Vec<(f64, f64, usize)> =
            bins.iter().map(|b| (b.lower, b.upper, b.sample_count)).collect();
        assert_eq!(spans, vec![(0.5, 0.6, 1), (0.6, 0.7, 1), (0.9, 1.0, 1)]);
    }

    #[test]
    fn pushes_are_excluded_from_brier_and_bins() {
        let preds = [
            settled(0, 0.65, 0.8, OutcomeType::Over),
            settled(1, 0.65, 0.8, OutcomeType::Under),
            settled(2, 0.65, 0.8, OutcomeType::Push),
        ];
        let refs: Vec<&Prediction> = preds.iter().collect();
        // (0.2^2 + 0.8^2) / 2
        assert!((brier_score(&refs) - 0.34).abs() < 1e-9);

        let bins = calibration_bins(&refs);
        assert_eq!(bins[0].sample_count, 3);
        assert_eq!(bins[0].total_count, 2);
        assert_eq!(bins[0].correct_count, 1);
        assert!((accuracy(&refs) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn small_bins_do_not_count_towards_mean_error() {
        let bins = vec![
            CalibrationBin {
                lower: 0.6,
                upper: 0.7,
                sample_count: 10,
                correct_count: 10,
                total_count: 10,
            },
            CalibrationBin {
                lower: 0.9,
                upper: 1.0,
                sample_count: 5,
                correct_count: 0,
                total_count: 5,
            },
        ];
        assert!((mean_calibration_error(&bins, 5) - 0.35).abs() < 1e-9);
    }

    #[test]
    fn reliability_bins_compare_probability_with_over_frequency() {
        let preds = [
            settled(0, 0.7, 0.72, OutcomeType::Over),
            settled(1, 0.7, 0.78, OutcomeType::Under),
            settled(2, 0.7, 1.0, OutcomeType::Over),
            settled(3, 0.7, 0.15, OutcomeType::Push),
        ];
        let refs: Vec<&Prediction> = preds.iter().collect();
        let bins = reliability_bins(&refs);
        assert_eq!(bins.len(), 2);
        assert!((bins[0].lower - 0.7).abs() < 1e-9);
        assert!((bins[0].expected_prob - 0.75).abs() < 1e-9);
        assert!((bins[0].observed_freq - 0.5).abs() < 1e-9);
        assert!((bins[1].lower - 0.9).abs() < 1e-9);
        assert_eq!(bins[1].sample_count, 1);
    }

    #[test]
    fn derivation_waits_for_the_sample_floor() {
        let config = CalibrationConfig::default();
        let preds: Vec<Prediction> = (0..29)
            .map(|i| settled(i, 0.65, 0.7, OutcomeType::Over))
            .collect();
        let refs: Vec<&Prediction> = preds.iter().collect();
        let metrics = derive(
            &Derivation {
                prop_type: PropType::PitcherStrikeouts,
                total_predictions: 29,
                settled: &refs,
                rolling: &refs,
            },
            &config,
        );
        assert!(!metrics.calibrated);
        assert!(metrics.calibration_bins.is_empty());
        assert_eq!(metrics.settled_predictions, 29);
        assert_eq!(metrics.correct_predictions, 29);
        assert!((metrics.rolling_accuracy - 1.0).abs() < 1e-9);
    }
}
