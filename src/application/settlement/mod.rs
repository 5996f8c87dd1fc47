//! Settlement integration.
//!
//! Turns completed games into calibration samples. Predictions are registered
//! against their game; once the result source reports the game final, each
//! prediction's actual value is computed, classified against its line, and fed
//! to the calibration harness. Confident wrong calls flag the linked edge as a
//! false positive.
//!
//! Settlement records are an audit trail only. Nothing is auto-corrected.

mod config;
mod outcome;

pub use config::SettlementConfig;
pub use outcome::{actual_value, assess, Assessment, Unsettleable};

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::application::calibration::CalibrationHarness;
use crate::application::edge::EdgePersistenceModel;
use crate::domain::id::{EdgeId, GameId, PredictionId};
use crate::domain::settlement::{GameResult, SettlementRecord, SettlementStatus};
use crate::port::GameResultSource;

const LATENCY_EMA_ALPHA: f64 = 0.1;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Registration {
    prediction_id: PredictionId,
    edge_id: Option<EdgeId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SettlementStats {
    pub games_processed: u64,
    pub predictions_settled: u64,
    pub mismatches_detected: u64,
    pub outliers_detected: u64,
    /// Result source failures while polling.
    pub processing_errors: u64,
    /// Registered predictions that could not be settled from their game.
    pub unsettleable: u64,
    pub last_processed_at: Option<DateTime<Utc>>,
    /// Moving average of one polling pass.
    pub avg_processing_latency_ms: f64,
}

/// Outcome of one polling pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessReport {
    pub games_checked: usize,
    pub games_settled: usize,
    pub predictions_settled: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForceProcessOutcome {
    pub success: bool,
    pub message: String,
    pub predictions_processed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettlementSummary {
    pub stats: SettlementStats,
    pub pending_games: usize,
    pub pending_predictions: usize,
    pub settlement_records: usize,
    pub recent_outliers: usize,
    pub recent_mismatches: usize,
    /// Share of retained settlements marked mismatched.
    pub false_positive_proxy: f64,
}

#[derive(Default)]
struct Ledger {
    pending: BTreeMap<GameId, Vec<Registration>>,
    records: VecDeque<SettlementRecord>,
    stats: SettlementStats,
}

/// Feeds completed game results into the calibration harness.
pub struct SettlementIntegrationService {
    config: SettlementConfig,
    harness: Arc<CalibrationHarness>,
    edges: Arc<EdgePersistenceModel>,
    source: Arc<dyn GameResultSource>,
    ledger: Mutex<Ledger>,
}

impl SettlementIntegrationService {
    #[must_use]
    pub fn new(
        config: SettlementConfig,
        harness: Arc<CalibrationHarness>,
        edges: Arc<EdgePersistenceModel>,
        source: Arc<dyn GameResultSource>,
    ) -> Self {
        info!(
            poll_interval_secs = config.poll_interval_secs,
            "Settlement integration service initialized"
        );
        Self {
            config,
            harness,
            edges,
            source,
            ledger: Mutex::new(Ledger::default()),
        }
    }

    #[must_use]
    pub fn config(&self) -> &SettlementConfig {
        &self.config
    }

    /// Queue a recorded prediction for settlement when its game completes.
    ///
    /// Returns `false` if the harness does not know the prediction or it is
    /// already registered.
    pub fn register_prediction_for_settlement(
        &self,
        prediction_id: PredictionId,
        game_id: GameId,
        edge_id: Option<EdgeId>,
    ) -> bool {
        if self.harness.get_prediction(&prediction_id).is_none() {
            warn!(prediction_id = %prediction_id, "Cannot register unknown prediction");
            return false;
        }

        let mut ledger = self.ledger.lock();
        let queued = ledger.pending.entry(game_id.clone()).or_default();
        if queued.iter().any(|r| r.prediction_id == prediction_id) {
            debug!(prediction_id = %prediction_id, "Prediction already registered");
            return false;
        }
        debug!(
            prediction_id = %prediction_id,
            game_id = %game_id,
            edge_id = ?edge_id,
            "Registered prediction for settlement"
        );
        queued.push(Registration {
            prediction_id,
            edge_id,
        });
        true
    }

    /// Poll the result source for every game with pending predictions.
    pub async fn process_completed_games(&self) -> ProcessReport {
        let started = Instant::now();
        let games: Vec<GameId> = self.ledger.lock().pending.keys().cloned().collect();
        let mut report = ProcessReport {
            games_checked: games.len(),
            ..ProcessReport::default()
        };
        if !games.is_empty() {
            debug!(games = games.len(), "Checking games for completion");
        }

        for game_id in games {
            match self.source.fetch_game_result(&game_id).await {
                Ok(Some(result)) => {
                    report.games_settled += 1;
                    report.predictions_settled += self.settle_game(&result);
                }
                Ok(None) => debug!(game_id = %game_id, "Game not final yet"),
                Err(e) => {
                    error!(game_id = %game_id, error = %e, "Failed to fetch game result");
                    self.ledger.lock().stats.processing_errors += 1;
                }
            }
        }

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        let mut ledger = self.ledger.lock();
        let stats = &mut ledger.stats;
        stats.last_processed_at = Some(Utc::now());
        stats.avg_processing_latency_ms = stats.avg_processing_latency_ms
            * (1.0 - LATENCY_EMA_ALPHA)
            + elapsed_ms * LATENCY_EMA_ALPHA;
        report
    }

    /// Settle one game right away, regardless of the polling schedule.
    pub async fn force_process_game(&self, game_id: &GameId) -> ForceProcessOutcome {
        info!(game_id = %game_id, "Forcing settlement for game");
        match self.source.fetch_game_result(game_id).await {
            Ok(Some(result)) => {
                let settled = self.settle_game(&result);
                ForceProcessOutcome {
                    success: true,
                    message: format!("Settlement processing completed for game {game_id}"),
                    predictions_processed: settled,
                }
            }
            Ok(None) => ForceProcessOutcome {
                success: false,
                message: format!("Game result not available for {game_id}"),
                predictions_processed: 0,
            },
            Err(e) => {
                error!(game_id = %game_id, error = %e, "Failed to fetch game result");
                self.ledger.lock().stats.processing_errors += 1;
                ForceProcessOutcome {
                    success: false,
                    message: format!("Failed to fetch result for {game_id}: {e}"),
                    predictions_processed: 0,
                }
            }
        }
    }

    /// Settle every prediction registered for a completed game.
    ///
    /// The game leaves the pending set whether or not each prediction could
    /// be settled. Returns how many were settled.
    fn settle_game(&self, result: &GameResult) -> usize {
        let Some(registrations) = self.ledger.lock().pending.remove(&result.game_id) else {
            return 0;
        };
        info!(
            game_id = %result.game_id,
            predictions = registrations.len(),
            "Processing settlement for game"
        );

        let mut records = Vec::with_capacity(registrations.len());
        let mut unsettleable = 0;
        for registration in registrations {
            match self.settle_one(&registration, result) {
                Some(record) => records.push(record),
                None => unsettleable += 1,
            }
        }

        let settled = records.len();
        let mut ledger = self.ledger.lock();
        ledger.stats.games_processed += 1;
        ledger.stats.predictions_settled += settled as u64;
        ledger.stats.unsettleable += unsettleable;
        for record in records {
            if record.is_outlier {
                ledger.stats.outliers_detected += 1;
            }
            if record.status == SettlementStatus::Mismatched {
                ledger.stats.mismatches_detected += 1;
            }
            ledger.records.push_back(record);
        }
        while ledger.records.len() > self.config.record_retention {
            ledger.records.pop_front();
        }
        drop(ledger);

        info!(game_id = %result.game_id, settled, "Completed settlement for game");
        settled
    }

    fn settle_one(&self, registration: &Registration, result: &GameResult) -> Option<SettlementRecord> {
        let prediction_id = &registration.prediction_id;
        let Some(prediction) = self.harness.get_prediction(prediction_id) else {
            warn!(prediction_id = %prediction_id, "Prediction not found for settlement");
            return None;
        };

        let actual = match actual_value(&prediction, result) {
            Ok(actual) => actual,
            Err(reason) => {
                warn!(prediction_id = %prediction_id, %reason, "Cannot settle prediction");
                return None;
            }
        };

        let assessment = assess(&prediction, actual, &self.config);
        if !self
            .harness
            .record_outcome(prediction_id, actual, assessment.outcome)
        {
            return None;
        }

        if assessment.is_outlier {
            warn!(
                prediction_id = %prediction_id,
                predicted = prediction.predicted_value,
                actual,
                error = assessment.error_magnitude,
                "Settlement outlier detected"
            );
        }
        if let Some(reason) = &assessment.mismatch_reason {
            warn!(prediction_id = %prediction_id, reason = %reason, "Settlement mismatch detected");
            if let Some(edge_id) = &registration.edge_id {
                self.edges.flag_false_positive(edge_id, reason);
            }
        }
        debug!(
            prediction_id = %prediction_id,
            predicted = prediction.predicted_value,
            actual,
            outcome = ?assessment.outcome,
            status = ?assessment.status,
            "Settled prediction"
        );

        Some(SettlementRecord {
            prediction_id: prediction_id.clone(),
            game_id: result.game_id.clone(),
            prop_type: prediction.prop_type,
            predicted_value: prediction.predicted_value,
            actual_value: actual,
            outcome: assessment.outcome,
            status: assessment.status,
            error_magnitude: assessment.error_magnitude,
            is_outlier: assessment.is_outlier,
            mismatch_reason: assessment.mismatch_reason,
            edge_id: registration.edge_id.clone(),
            processed_at: Utc::now(),
        })
    }

    #[must_use]
    pub fn get_settlement_summary(&self) -> SettlementSummary {
        let since = Utc::now() - chrono::Duration::seconds(self.config.recent_window_secs as i64);
        let ledger = self.ledger.lock();
        let recent = ledger.records.iter().filter(|r| r.processed_at > since);
        let (recent_outliers, recent_mismatches) =
            recent.fold((0, 0), |(outliers, mismatches), r| {
                (
                    outliers + usize::from(r.is_outlier),
                    mismatches + usize::from(r.status == SettlementStatus::Mismatched),
                )
            });
        SettlementSummary {
            stats: ledger.stats.clone(),
            pending_games: ledger.pending.len(),
            pending_predictions: ledger.pending.values().map(Vec::len).sum(),
            settlement_records: ledger.records.len(),
            recent_outliers,
            recent_mismatches,
            false_positive_proxy: Self::false_positive_proxy_locked(&ledger),
        }
    }

    /// Share of retained settlements marked mismatched. Zero when none.
    #[must_use]
    pub fn false_positive_proxy(&self) -> f64 {
        Self::false_positive_proxy_locked(&self.ledger.lock())
    }

    fn false_positive_proxy_locked(ledger: &Ledger) -> f64 {
        if ledger.records.is_empty() {
            return 0.0;
        }
        let mismatched = ledger
            .records
            .iter()
            .filter(|r| r.status == SettlementStatus::Mismatched)
            .count();
        mismatched as f64 / ledger.records.len() as f64
    }

    /// Latest outlier settlements, newest first.
    #[must_use]
    pub fn get_outlier_details(&self, limit: usize) -> Vec<SettlementRecord> {
        self.latest(limit, |r| r.is_outlier)
    }

    /// Latest mismatched settlements, newest first.
    #[must_use]
    pub fn get_mismatch_details(&self, limit: usize) -> Vec<SettlementRecord> {
        self.latest(limit, |r| r.status == SettlementStatus::Mismatched)
    }

    fn latest(&self, limit: usize, keep: impl Fn(&SettlementRecord) -> bool) -> Vec<SettlementRecord> {
        self.ledger
            .lock()
            .records
            .iter()
            .rev()
            .filter(|r| keep(r))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Predictions still waiting on their game.
    #[must_use]
    pub fn pending_predictions(&self) -> usize {
        self.ledger.lock().pending.values().map(Vec::len).sum()
    }
}
