//! Calibration metric types.
//!
//! Metrics here are pure values derived from settled predictions. They hold no
//! timestamps so two derivations from the same predictions compare equal.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::prediction::{GamePhase, PropType};

/// Confidence bins `[0.5,0.6)` through `[0.9,1.0]`. The last bin is closed.
pub const CONFIDENCE_BINS: [(f64, f64); 5] =
    [(0.5, 0.6), (0.6, 0.7), (0.7, 0.8), (0.8, 0.9), (0.9, 1.0)];

/// Predictions grouped by stated confidence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationBin {
    pub lower: f64,
    pub upper: f64,
    /// Settled predictions in the bin, pushes included.
    pub sample_count: usize,
    pub correct_count: usize,
    /// Decided (non-push) predictions in the bin.
    pub total_count: usize,
}

impl CalibrationBin {
    /// Observed accuracy within the bin.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        if self.total_count == 0 {
            0.0
        } else {
            self.correct_count as f64 / self.total_count as f64
        }
    }

    /// Expected accuracy: the bin midpoint.
    #[must_use]
    pub fn expected_accuracy(&self) -> f64 {
        (self.lower + self.upper) / 2.0
    }

    #[must_use]
    pub fn calibration_error(&self) -> f64 {
        (self.accuracy() - self.expected_accuracy()).abs()
    }
}

/// Predicted OVER probability against the observed OVER frequency.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReliabilityBin {
    pub lower: f64,
    pub upper: f64,
    /// Mean predicted probability in the bin.
    pub expected_prob: f64,
    /// Observed frequency of OVER outcomes.
    pub observed_freq: f64,
    pub sample_count: usize,
}

impl ReliabilityBin {
    #[must_use]
    pub fn reliability_error(&self) -> f64 {
        (self.expected_prob - self.observed_freq).abs()
    }

    #[must_use]
    pub fn is_well_calibrated(&self, threshold: f64) -> bool {
        self.reliability_error() <= threshold
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PhaseMetrics {
    pub count: usize,
    pub accuracy: f64,
    pub brier_score: f64,
}

/// Calibration metrics for one prop type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropTypeMetrics {
    pub prop_type: PropType,
    pub total_predictions: usize,
    pub settled_predictions: usize,
    pub correct_predictions: usize,
    /// Settled predictions that were not pushes.
    pub decided_predictions: usize,
    /// Whether enough settled samples existed to derive bins and scores.
    pub calibrated: bool,
    pub calibration_bins: Vec<CalibrationBin>,
    pub reliability_bins: Vec<ReliabilityBin>,
    pub mean_calibration_error: f64,
    pub brier_score: f64,
    pub mean_absolute_error: f64,
    pub mean_squared_error: f64,
    pub rolling_accuracy: f64,
    pub phase_metrics: BTreeMap<GamePhase, PhaseMetrics>,
}

impl PropTypeMetrics {
    #[must_use]
    pub fn empty(prop_type: PropType) -> Self {
        Self {
            prop_type,
            total_predictions: 0,
            settled_predictions: 0,
            correct_predictions: 0,
            decided_predictions: 0,
            calibrated: false,
            calibration_bins: Vec::new(),
            reliability_bins: Vec::new(),
            mean_calibration_error: 0.0,
            brier_score: 0.0,
            mean_absolute_error: 0.0,
            mean_squared_error: 0.0,
            rolling_accuracy: 0.0,
            phase_metrics: BTreeMap::new(),
        }
    }

    /// Accuracy over decided predictions. Pushes are excluded.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        if self.decided_predictions == 0 {
            0.0
        } else {
            self.correct_predictions as f64 / self.decided_predictions as f64
        }
    }

    #[must_use]
    pub fn settlement_rate(&self) -> f64 {
        if self.total_predictions == 0 {
            0.0
        } else {
            self.settled_predictions as f64 / self.total_predictions as f64
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertKind {
    HighCalibrationError,
    AccuracyDrop,
}

impl AlertKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HighCalibrationError => "high_calibration_error",
            Self::AccuracyDrop => "accuracy_drop",
        }
    }
}

/// A calibration anomaly. Logged and retained, never blocking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationAlert {
    pub kind: AlertKind,
    pub prop_type: PropType,
    /// Observed value (calibration error or current accuracy).
    pub value: f64,
    /// Threshold or historical baseline the value was compared with.
    pub reference: f64,
    pub message: String,
    pub raised_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bin_error_is_distance_from_midpoint() {
        let bin = CalibrationBin {
            lower: 0.6,
            upper: 0.7,
            sample_count: 30,
            correct_count: 20,
            total_count: 30,
        };
        assert!((bin.expected_accuracy() - 0.65).abs() < 1e-9);
        assert!((bin.accuracy() - 2.0 / 3.0).abs() < 1e-9);
        assert!((bin.calibration_error() - 0.016_666).abs() < 1e-3);
    }

    #[test]
    fn accuracy_excludes_pushes() {
        let mut metrics = PropTypeMetrics::empty(PropType::Rbis);
        metrics.settled_predictions = 10;
        metrics.decided_predictions = 8;
        metrics.correct_predictions = 6;
        assert!((metrics.accuracy() - 0.75).abs() < 1e-9);
    }
}
