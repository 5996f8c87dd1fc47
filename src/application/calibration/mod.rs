//! Calibration harness.
//!
//! Records prediction/confidence pairs and, as outcomes arrive, checks how
//! well stated confidence matches observed correctness per prop type.
//!
//! Metrics are never patched incrementally. Each settlement re-derives its
//! prop type's metrics from the settled predictions themselves, so concurrent
//! settlements cannot drift the aggregate state.

mod config;
mod metrics;
mod summary;

pub use config::CalibrationConfig;
pub use summary::{
    BinSummary, CalibrationExport, CalibrationSettings, HistoryPoint, MetricsSnapshot,
    OverallSummary, PropTypeSummary,
};

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::application::cache::{metrics::CALIBRATION_METRICS_KEY, MetricsCache};
use crate::domain::calibration::{AlertKind, CalibrationAlert, PropTypeMetrics, CONFIDENCE_BINS};
use crate::domain::id::{GameId, PredictionId};
use crate::domain::prediction::{NewPrediction, OutcomeType, Prediction, PropType};
use crate::error::CalibrationError;

use metrics::Derivation;

#[derive(Default)]
struct Ledger {
    predictions: HashMap<PredictionId, Prediction>,
    by_type: HashMap<PropType, Vec<PredictionId>>,
    /// Latest settlements per prop type, oldest first.
    rolling: HashMap<PropType, VecDeque<PredictionId>>,
    metrics: BTreeMap<PropType, PropTypeMetrics>,
    history: VecDeque<MetricsSnapshot>,
    alerts: VecDeque<CalibrationAlert>,
    last_prediction_at: Option<DateTime<Utc>>,
}

/// Tracks predictions and their calibration against real outcomes.
pub struct CalibrationHarness {
    config: CalibrationConfig,
    ledger: RwLock<Ledger>,
    cache: Arc<MetricsCache>,
    alert_seq: AtomicU64,
}

fn check_unit(field: &'static str, value: f64) -> Result<(), CalibrationError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(CalibrationError::OutOfRange { field, value })
    }
}

impl CalibrationHarness {
    #[must_use]
    pub fn new(config: CalibrationConfig, cache: Arc<MetricsCache>) -> Self {
        info!(min_samples = config.min_samples, "Calibration harness initialized");
        Self {
            config,
            ledger: RwLock::new(Ledger::default()),
            cache,
            alert_seq: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    /// Record a model prediction for later settlement.
    pub fn record_prediction(&self, new: NewPrediction) -> Result<(), CalibrationError> {
        check_unit("predicted_probability", new.predicted_probability)?;
        check_unit("confidence_score", new.confidence_score)?;

        let mut ledger = self.ledger.write();
        if ledger.predictions.contains_key(&new.id) {
            return Err(CalibrationError::DuplicatePrediction(new.id.to_string()));
        }

        let prediction = Prediction::from_new(new, Instant::now());
        let prop_type = prediction.prop_type;
        debug!(
            prediction_id = %prediction.id,
            game_id = %prediction.game_id,
            prop_type = %prop_type,
            confidence = prediction.confidence_score,
            "Recorded prediction"
        );

        ledger.last_prediction_at = Some(prediction.created_at);
        let ids = ledger.by_type.entry(prop_type).or_default();
        ids.push(prediction.id.clone());
        let total = ids.len();
        ledger
            .metrics
            .entry(prop_type)
            .or_insert_with(|| PropTypeMetrics::empty(prop_type))
            .total_predictions = total;
        ledger.predictions.insert(prediction.id.clone(), prediction);
        Ok(())
    }

    /// Settle a prediction with its real outcome.
    ///
    /// Returns `false` for unknown or already settled predictions. Settling
    /// re-derives the prop type's metrics and may raise alerts.
    pub fn record_outcome(
        &self,
        prediction_id: &PredictionId,
        actual_value: f64,
        outcome: OutcomeType,
    ) -> bool {
        let alerts = {
            let mut ledger = self.ledger.write();
            let Some(prediction) = ledger.predictions.get_mut(prediction_id) else {
                warn!(prediction_id = %prediction_id, "Cannot settle unknown prediction");
                return false;
            };
            if prediction.is_settled() {
                warn!(prediction_id = %prediction_id, "Prediction already settled");
                return false;
            }

            prediction.settle(actual_value, outcome, Instant::now());
            let prop_type = prediction.prop_type;
            debug!(
                prediction_id = %prediction_id,
                actual = actual_value,
                outcome = ?outcome,
                correct = ?prediction.was_correct(),
                "Settled prediction"
            );

            let rolling = ledger.rolling.entry(prop_type).or_default();
            rolling.push_back(prediction_id.clone());
            while rolling.len() > self.config.rolling_window {
                rolling.pop_front();
            }

            self.recalculate_locked(&mut ledger, prop_type)
        };

        self.publish_alerts(alerts);
        true
    }

    /// Re-derive a prop type's metrics from its settled predictions.
    ///
    /// Idempotent: calling it again without new settlements yields the same
    /// metrics.
    pub fn recalculate(&self, prop_type: PropType) -> PropTypeMetrics {
        let (metrics, alerts) = {
            let mut ledger = self.ledger.write();
            let alerts = self.recalculate_locked(&mut ledger, prop_type);
            let metrics = ledger
                .metrics
                .get(&prop_type)
                .cloned()
                .unwrap_or_else(|| PropTypeMetrics::empty(prop_type));
            (metrics, alerts)
        };
        self.publish_alerts(alerts);
        metrics
    }

    fn recalculate_locked(&self, ledger: &mut Ledger, prop_type: PropType) -> Vec<CalibrationAlert> {
        let metrics = {
            let ids = ledger.by_type.get(&prop_type).map(Vec::as_slice).unwrap_or_default();
            let settled: Vec<&Prediction> = ids
                .iter()
                .filter_map(|id| ledger.predictions.get(id))
                .filter(|p| p.is_settled())
                .collect();
            let rolling: Vec<&Prediction> = ledger
                .rolling
                .get(&prop_type)
                .into_iter()
                .flatten()
                .filter_map(|id| ledger.predictions.get(id))
                .collect();
            metrics::derive(
                &Derivation {
                    prop_type,
                    total_predictions: ids.len(),
                    settled: &settled,
                    rolling: &rolling,
                },
                &self.config,
            )
        };

        let alerts = self.check_alerts(ledger, &metrics);
        if metrics.calibrated {
            debug!(
                prop_type = %prop_type,
                accuracy = metrics.accuracy(),
                calibration_error = metrics.mean_calibration_error,
                brier = metrics.brier_score,
                "Recalculated calibration metrics"
            );
        }
        ledger.metrics.insert(prop_type, metrics);

        for alert in &alerts {
            ledger.alerts.push_back(alert.clone());
        }
        while ledger.alerts.len() > self.config.alert_log_size {
            ledger.alerts.pop_front();
        }
        alerts
    }

    fn check_alerts(&self, ledger: &Ledger, metrics: &PropTypeMetrics) -> Vec<CalibrationAlert> {
        if !metrics.calibrated {
            return Vec::new();
        }

        let mut alerts = Vec::new();
        let raised_at = Utc::now();
        if metrics.mean_calibration_error > self.config.alert_calibration_error {
            alerts.push(CalibrationAlert {
                kind: AlertKind::HighCalibrationError,
                prop_type: metrics.prop_type,
                value: metrics.mean_calibration_error,
                reference: self.config.alert_calibration_error,
                message: format!(
                    "High calibration error for {}: {:.3}",
                    metrics.prop_type, metrics.mean_calibration_error
                ),
                raised_at,
            });
        }

        let past: Vec<f64> = ledger
            .history
            .iter()
            .filter_map(|s| s.points.get(&metrics.prop_type))
            .map(|p| p.accuracy)
            .filter(|a| *a > 0.0)
            .collect();
        if past.len() >= self.config.history_min_points {
            let baseline = metrics::mean(past);
            let current = metrics.accuracy();
            if baseline - current > self.config.alert_accuracy_drop {
                alerts.push(CalibrationAlert {
                    kind: AlertKind::AccuracyDrop,
                    prop_type: metrics.prop_type,
                    value: current,
                    reference: baseline,
                    message: format!(
                        "Accuracy drop for {}: {:.3} vs {:.3} historical",
                        metrics.prop_type, current, baseline
                    ),
                    raised_at,
                });
            }
        }
        alerts
    }

    fn publish_alerts(&self, alerts: Vec<CalibrationAlert>) {
        for alert in alerts {
            warn!(
                prop_type = %alert.prop_type,
                kind = ?alert.kind,
                value = alert.value,
                reference = alert.reference,
                "{}",
                alert.message
            );
            // Alerts from one recalculation share a timestamp.
            let seq = self.alert_seq.fetch_add(1, Ordering::Relaxed);
            let key = format!(
                "calibration_alert:{}:{}:{}:{seq}",
                alert.prop_type,
                alert.kind.as_str(),
                alert.raised_at.timestamp_millis()
            );
            self.cache.set(key, &alert, self.config.alert_ttl());
        }
    }

    /// Metrics of a prop type as last derived.
    #[must_use]
    pub fn prop_metrics(&self, prop_type: PropType) -> Option<PropTypeMetrics> {
        self.ledger.read().metrics.get(&prop_type).cloned()
    }

    /// Summary of a prop type. `None` if it never saw a prediction.
    #[must_use]
    pub fn get_prop_type_summary(&self, prop_type: PropType) -> Option<PropTypeSummary> {
        let ledger = self.ledger.read();
        let metrics = ledger.metrics.get(&prop_type)?;
        let recent = self.recent_count(&ledger, prop_type);
        Some(PropTypeSummary::from_metrics(metrics, recent))
    }

    fn recent_count(&self, ledger: &Ledger, prop_type: PropType) -> usize {
        let now = Instant::now();
        let window = self.config.recent_window();
        ledger
            .by_type
            .get(&prop_type)
            .into_iter()
            .flatten()
            .filter_map(|id| ledger.predictions.get(id))
            .filter(|p| now.saturating_duration_since(p.recorded) <= window)
            .count()
    }

    #[must_use]
    pub fn get_overall_summary(&self) -> OverallSummary {
        let ledger = self.ledger.read();
        Self::overall_locked(&ledger)
    }

    fn overall_locked(ledger: &Ledger) -> OverallSummary {
        OverallSummary {
            alerts_logged: ledger.alerts.len(),
            last_prediction_at: ledger.last_prediction_at,
            ..OverallSummary::from_metrics(ledger.metrics.values())
        }
    }

    /// Snapshot headline metrics into history, build the export and cache it.
    pub fn export_metrics(&self) -> CalibrationExport {
        let export = {
            let mut ledger = self.ledger.write();
            let points: BTreeMap<PropType, HistoryPoint> = ledger
                .metrics
                .values()
                .filter(|m| m.settled_predictions > 0)
                .map(|m| {
                    (
                        m.prop_type,
                        HistoryPoint {
                            accuracy: m.accuracy(),
                            calibration_error: m.mean_calibration_error,
                            brier_score: m.brier_score,
                        },
                    )
                })
                .collect();
            ledger.history.push_back(MetricsSnapshot {
                taken_at: Utc::now(),
                points,
            });
            while ledger.history.len() > self.config.history_size {
                ledger.history.pop_front();
            }

            let prop_types = ledger
                .metrics
                .values()
                .map(|m| {
                    let recent = self.recent_count(&ledger, m.prop_type);
                    (m.prop_type, PropTypeSummary::from_metrics(m, recent))
                })
                .collect();
            CalibrationExport {
                exported_at: Utc::now(),
                overall: Self::overall_locked(&ledger),
                prop_types,
                settings: CalibrationSettings {
                    min_samples: self.config.min_samples,
                    confidence_bins: CONFIDENCE_BINS.to_vec(),
                    alert_calibration_error: self.config.alert_calibration_error,
                    alert_accuracy_drop: self.config.alert_accuracy_drop,
                },
                history_len: ledger.history.len(),
            }
        };

        self.cache
            .set(CALIBRATION_METRICS_KEY, &export, self.config.metrics_ttl());
        export
    }

    /// Most recent alerts, oldest first.
    #[must_use]
    pub fn recent_alerts(&self, limit: usize) -> Vec<CalibrationAlert> {
        let ledger = self.ledger.read();
        let skip = ledger.alerts.len().saturating_sub(limit);
        ledger.alerts.iter().skip(skip).cloned().collect()
    }

    #[must_use]
    pub fn get_prediction(&self, prediction_id: &PredictionId) -> Option<Prediction> {
        self.ledger.read().predictions.get(prediction_id).cloned()
    }

    /// Predictions for a game, ordered by id.
    #[must_use]
    pub fn get_predictions_for_game(&self, game_id: &GameId) -> Vec<Prediction> {
        let mut found: Vec<Prediction> = self
            .ledger
            .read()
            .predictions
            .values()
            .filter(|p| &p.game_id == game_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        found
    }

    /// Predictions settled within the trailing `window`.
    #[must_use]
    pub fn settled_since(&self, window: Duration) -> usize {
        let now = Instant::now();
        self.ledger
            .read()
            .predictions
            .values()
            .filter_map(|p| p.settled)
            .filter(|at| now.saturating_duration_since(*at) <= window)
            .count()
    }
}
