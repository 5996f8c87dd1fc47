//! Read models for calibration queries and exports.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::calibration::{CalibrationBin, PhaseMetrics, PropTypeMetrics, ReliabilityBin};
use crate::domain::prediction::{GamePhase, PropType};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinSummary {
    /// Display label such as `0.6-0.7`.
    pub range: String,
    pub sample_count: usize,
    pub total_count: usize,
    pub accuracy: f64,
    pub expected_accuracy: f64,
    pub calibration_error: f64,
}

impl From<&CalibrationBin> for BinSummary {
    fn from(bin: &CalibrationBin) -> Self {
        Self {
            range: format!("{:.1}-{:.1}", bin.lower, bin.upper),
            sample_count: bin.sample_count,
            total_count: bin.total_count,
            accuracy: bin.accuracy(),
            expected_accuracy: bin.expected_accuracy(),
            calibration_error: bin.calibration_error(),
        }
    }
}

/// Calibration state of one prop type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropTypeSummary {
    pub prop_type: PropType,
    pub total_predictions: usize,
    pub settled_predictions: usize,
    pub settlement_rate: f64,
    pub accuracy: f64,
    pub rolling_accuracy: f64,
    pub calibrated: bool,
    pub mean_calibration_error: f64,
    pub brier_score: f64,
    pub mean_absolute_error: f64,
    pub mean_squared_error: f64,
    /// Predictions recorded within the recent window.
    pub recent_predictions: usize,
    pub calibration_bins: Vec<BinSummary>,
    pub reliability_bins: Vec<ReliabilityBin>,
    pub phase_metrics: BTreeMap<GamePhase, PhaseMetrics>,
}

impl PropTypeSummary {
    pub(crate) fn from_metrics(metrics: &PropTypeMetrics, recent_predictions: usize) -> Self {
        Self {
            prop_type: metrics.prop_type,
            total_predictions: metrics.total_predictions,
            settled_predictions: metrics.settled_predictions,
            settlement_rate: metrics.settlement_rate(),
            accuracy: metrics.accuracy(),
            rolling_accuracy: metrics.rolling_accuracy,
            calibrated: metrics.calibrated,
            mean_calibration_error: metrics.mean_calibration_error,
            brier_score: metrics.brier_score,
            mean_absolute_error: metrics.mean_absolute_error,
            mean_squared_error: metrics.mean_squared_error,
            recent_predictions,
            calibration_bins: metrics.calibration_bins.iter().map(BinSummary::from).collect(),
            reliability_bins: metrics.reliability_bins.clone(),
            phase_metrics: metrics.phase_metrics.clone(),
        }
    }
}

/// Calibration state across all prop types.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OverallSummary {
    pub total_predictions: usize,
    pub settled_predictions: usize,
    pub decided_predictions: usize,
    pub overall_accuracy: f64,
    pub settlement_rate: f64,
    /// Mean calibration error of calibrated prop types, weighted by
    /// settled predictions.
    pub weighted_calibration_error: f64,
    pub prop_type_count: usize,
    pub calibrated_prop_types: usize,
    pub alerts_logged: usize,
    pub last_prediction_at: Option<DateTime<Utc>>,
}

impl OverallSummary {
    pub(crate) fn from_metrics<'a>(metrics: impl IntoIterator<Item = &'a PropTypeMetrics>) -> Self {
        let mut summary = Self::default();
        let mut correct = 0;
        let mut weighted_error = 0.0;
        let mut weight = 0;
        for m in metrics {
            summary.prop_type_count += 1;
            summary.total_predictions += m.total_predictions;
            summary.settled_predictions += m.settled_predictions;
            summary.decided_predictions += m.decided_predictions;
            correct += m.correct_predictions;
            if m.calibrated {
                summary.calibrated_prop_types += 1;
                weighted_error += m.mean_calibration_error * m.settled_predictions as f64;
                weight += m.settled_predictions;
            }
        }
        if summary.decided_predictions > 0 {
            summary.overall_accuracy = correct as f64 / summary.decided_predictions as f64;
        }
        if summary.total_predictions > 0 {
            summary.settlement_rate =
                summary.settled_predictions as f64 / summary.total_predictions as f64;
        }
        if weight > 0 {
            summary.weighted_calibration_error = weighted_error / weight as f64;
        }
        summary
    }
}

/// One prop type's headline numbers at snapshot time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistoryPoint {
    pub accuracy: f64,
    pub calibration_error: f64,
    pub brier_score: f64,
}

/// Headline numbers of every prop type with settlements, taken on export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub taken_at: DateTime<Utc>,
    pub points: BTreeMap<PropType, HistoryPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationSettings {
    pub min_samples: usize,
    pub confidence_bins: Vec<(f64, f64)>,
    pub alert_calibration_error: f64,
    pub alert_accuracy_drop: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationExport {
    pub exported_at: DateTime<Utc>,
    pub overall: OverallSummary,
    pub prop_types: BTreeMap<PropType, PropTypeSummary>,
    pub settings: CalibrationSettings,
    pub history_len: usize,
}
