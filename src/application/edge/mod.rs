//! Edge persistence model.
//!
//! Owns the edge lifecycle: creation, scoring on every observation, and
//! one-way retirement. Live edges (ACTIVE or DECAYING) sit in the active map;
//! retired edges move to the retired map exactly once and never change again.
//!
//! All mutation happens under a single write lock over the edge book, so
//! concurrent scheduler workers and external flaggers see consistent state.

mod config;
mod scoring;
mod summary;

pub use config::{EdgeConfig, RuleOverride};
pub use scoring::{persistence_score, retirement_violation};
pub use summary::{
    EdgeCounters, EdgeMetricsExport, EdgeQualitySummary, PersistenceDistribution,
    RetiredEdgeRecord, TypeQuality,
};

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::application::cache::{metrics::EDGE_METRICS_KEY, MetricsCache};
use crate::domain::edge::{
    DecayReason, Edge, EdgeObservation, EdgeStatus, EdgeType, EdgeUpdate, NewEdge,
    RetirementRule,
};
use crate::domain::id::{EdgeId, GameId};

use summary::mean;

/// What applying an [`EdgeUpdate`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeChange {
    Created,
    Updated,
    Retired,
    /// Unknown or already-retired edge, or a duplicate create.
    Ignored,
}

#[derive(Default)]
struct EdgeBook {
    active: HashMap<EdgeId, Edge>,
    retired: HashMap<EdgeId, Edge>,
    history: VecDeque<RetiredEdgeRecord>,
    counters: EdgeCounters,
}

/// Tracks edges and decides when they stop being trustworthy.
pub struct EdgePersistenceModel {
    config: EdgeConfig,
    rules: HashMap<EdgeType, RetirementRule>,
    book: RwLock<EdgeBook>,
    cache: Arc<MetricsCache>,
}

impl EdgePersistenceModel {
    #[must_use]
    pub fn new(config: EdgeConfig, cache: Arc<MetricsCache>) -> Self {
        let rules = EdgeType::ALL
            .into_iter()
            .map(|t| (t, config.rule_for(t)))
            .collect();
        info!("Edge persistence model initialized");
        Self {
            config,
            rules,
            book: RwLock::new(EdgeBook::default()),
            cache,
        }
    }

    #[must_use]
    pub fn config(&self) -> &EdgeConfig {
        &self.config
    }

    fn rule(&self, edge_type: EdgeType) -> RetirementRule {
        self.rules
            .get(&edge_type)
            .cloned()
            .unwrap_or_else(|| RetirementRule::for_type(edge_type))
    }

    /// Start tracking a new edge with a full persistence score.
    ///
    /// Returns `None` if an edge with this id is already tracked, live or
    /// retired.
    pub fn create_edge(&self, new: NewEdge) -> Option<Edge> {
        let mut book = self.book.write();
        if book.active.contains_key(&new.id) || book.retired.contains_key(&new.id) {
            warn!(edge_id = %new.id, "Ignoring create for already tracked edge");
            return None;
        }

        let rule = self.rule(new.edge_type);
        let edge = Edge::open(new, rule.decay_rate, Instant::now());
        info!(
            edge_id = %edge.id,
            edge_type = %edge.edge_type,
            ev = edge.initial_ev,
            confidence = edge.confidence_score,
            line = edge.line_when_created,
            "Created edge"
        );
        book.counters.edges_created += 1;
        book.active.insert(edge.id.clone(), edge.clone());
        Some(edge)
    }

    /// Record a fresh observation of a live edge and re-score it.
    ///
    /// Returns the edge after the update, which may now be retired. Returns
    /// `None` for unknown or already-retired edges.
    pub fn update_edge(&self, obs: EdgeObservation) -> Option<Edge> {
        let now = Instant::now();
        let mut book = self.book.write();
        let Some(edge) = book.active.get_mut(&obs.edge_id) else {
            debug!(edge_id = %obs.edge_id, "Cannot update edge that is not live");
            return None;
        };

        edge.observe(&obs, now);
        let rule = self.rule(edge.edge_type);
        let verdict = self.evaluate(edge, &rule, now);
        debug!(
            edge_id = %obs.edge_id,
            ev = obs.expected_value,
            persistence = edge.persistence_score(),
            "Updated edge"
        );

        match verdict {
            Some(reason) => {
                Self::retire_locked(&mut book, &obs.edge_id, reason, now, self.config.history_size)
            }
            None => book.active.get(&obs.edge_id).cloned(),
        }
    }

    /// Register an external false-positive signal and re-check retirement.
    ///
    /// Returns `false` if the edge is not live.
    pub fn flag_false_positive(&self, edge_id: &EdgeId, reason: &str) -> bool {
        let now = Instant::now();
        let mut book = self.book.write();
        let Some(edge) = book.active.get_mut(edge_id) else {
            debug!(edge_id = %edge_id, "Ignoring false positive flag for edge that is not live");
            return false;
        };

        edge.false_positive_signals += 1;
        let signals = edge.false_positive_signals;
        let rule = self.rule(edge.edge_type);
        let verdict = retirement_violation(edge, &rule, now);
        book.counters.false_positive_flags += 1;
        warn!(edge_id = %edge_id, count = signals, reason, "False positive signal for edge");

        if let Some(reason) = verdict {
            Self::retire_locked(&mut book, edge_id, reason, now, self.config.history_size);
        }
        true
    }

    /// Retire a live edge by hand. Returns `false` if it is not live.
    pub fn retire_edge(&self, edge_id: &EdgeId, reason: DecayReason) -> bool {
        let now = Instant::now();
        let mut book = self.book.write();
        Self::retire_locked(&mut book, edge_id, reason, now, self.config.history_size).is_some()
    }

    /// Apply an update produced by a valuation run.
    pub fn apply(&self, update: EdgeUpdate) -> EdgeChange {
        match update {
            EdgeUpdate::Create(new) => match self.create_edge(new) {
                Some(_) => EdgeChange::Created,
                None => EdgeChange::Ignored,
            },
            EdgeUpdate::Observe(obs) => match self.update_edge(obs) {
                Some(edge) if edge.status == EdgeStatus::Retired => EdgeChange::Retired,
                Some(_) => EdgeChange::Updated,
                None => EdgeChange::Ignored,
            },
            EdgeUpdate::Retire { edge_id, reason } => {
                if self.retire_edge(&edge_id, reason) {
                    EdgeChange::Retired
                } else {
                    EdgeChange::Ignored
                }
            }
        }
    }

    /// Re-score and re-check every live edge. Returns how many were retired.
    ///
    /// Safety net for edges that stopped receiving observations.
    pub fn cleanup_stale_edges(&self) -> usize {
        let now = Instant::now();
        let mut book = self.book.write();

        let mut doomed = Vec::new();
        for edge in book.active.values_mut() {
            let rule = self.rule(edge.edge_type);
            if let Some(reason) = self.evaluate(edge, &rule, now) {
                doomed.push((edge.id.clone(), reason));
            }
        }

        let cleaned = doomed.len();
        for (edge_id, reason) in doomed {
            Self::retire_locked(&mut book, &edge_id, reason, now, self.config.history_size);
        }
        info!(cleaned, remaining = book.active.len(), "Cleaned up stale edges");
        cleaned
    }

    /// Look an edge up among live edges, then retired ones.
    #[must_use]
    pub fn get_edge(&self, edge_id: &EdgeId) -> Option<Edge> {
        let book = self.book.read();
        book.active
            .get(edge_id)
            .or_else(|| book.retired.get(edge_id))
            .cloned()
    }

    /// ACTIVE edges whose score is at least `min_persistence_score`.
    #[must_use]
    pub fn get_active_edges(&self, min_persistence_score: f64) -> Vec<Edge> {
        self.book
            .read()
            .active
            .values()
            .filter(|e| {
                e.status == EdgeStatus::Active && e.persistence_score() >= min_persistence_score
            })
            .cloned()
            .collect()
    }

    /// Live edges for a game, ACTIVE and DECAYING alike.
    #[must_use]
    pub fn get_edges_by_game(&self, game_id: &GameId) -> Vec<Edge> {
        self.book
            .read()
            .active
            .values()
            .filter(|e| &e.game_id == game_id)
            .cloned()
            .collect()
    }

    /// Live edges of a type, ACTIVE and DECAYING alike.
    #[must_use]
    pub fn get_edges_by_type(&self, edge_type: EdgeType) -> Vec<Edge> {
        self.book
            .read()
            .active
            .values()
            .filter(|e| e.edge_type == edge_type)
            .cloned()
            .collect()
    }

    /// Number of live edges.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.book.read().active.len()
    }

    /// Most recent retirements, oldest first.
    #[must_use]
    pub fn retirement_history(&self, limit: usize) -> Vec<RetiredEdgeRecord> {
        let book = self.book.read();
        let skip = book.history.len().saturating_sub(limit);
        book.history.iter().skip(skip).cloned().collect()
    }

    #[must_use]
    pub fn get_edge_quality_summary(&self) -> EdgeQualitySummary {
        let now = Instant::now();
        let book = self.book.read();
        Self::quality_locked(&book, now)
    }

    /// Build the metrics export and cache it.
    pub fn export_metrics(&self) -> EdgeMetricsExport {
        let now = Instant::now();
        let export = {
            let book = self.book.read();
            let mut retirement_reasons: BTreeMap<DecayReason, usize> = BTreeMap::new();
            for record in &book.history {
                *retirement_reasons.entry(record.reason).or_default() += 1;
            }
            let mut persistence_distribution = PersistenceDistribution::default();
            for edge in book.active.values() {
                persistence_distribution.add(edge.persistence_score());
            }
            EdgeMetricsExport {
                exported_at: Utc::now(),
                quality: Self::quality_locked(&book, now),
                retirement_reasons,
                persistence_distribution,
            }
        };

        self.cache
            .set(EDGE_METRICS_KEY, &export, self.config.metrics_ttl());
        export
    }

    /// Re-score an edge and derive its status.
    ///
    /// Returns the retirement reason if the edge must retire.
    fn evaluate(&self, edge: &mut Edge, rule: &RetirementRule, now: Instant) -> Option<DecayReason> {
        let score = persistence_score(edge, rule, now, self.config.volatility_penalty_threshold);
        edge.persistence_score = score;

        if score < self.config.retire_threshold {
            return Some(DecayReason::TimeBased);
        }
        edge.status = if score < self.config.decaying_threshold {
            EdgeStatus::Decaying
        } else {
            EdgeStatus::Active
        };

        retirement_violation(edge, rule, now)
    }

    fn retire_locked(
        book: &mut EdgeBook,
        edge_id: &EdgeId,
        reason: DecayReason,
        now: Instant,
        history_size: usize,
    ) -> Option<Edge> {
        let mut edge = book.active.remove(edge_id)?;
        edge.retire(reason, now);

        book.counters.edges_retired += 1;
        if reason == DecayReason::FalsePositive {
            book.counters.false_positives_detected += 1;
        }

        let lifespan_hours = edge.lifespan_hours.unwrap_or_default();
        book.history.push_back(RetiredEdgeRecord {
            edge_id: edge.id.clone(),
            edge_type: edge.edge_type,
            lifespan_hours,
            initial_ev: edge.initial_ev,
            final_ev: edge.current_ev,
            reason,
            retired_at: edge.retired_at.unwrap_or_else(Utc::now),
        });
        while book.history.len() > history_size {
            book.history.pop_front();
        }

        info!(
            edge_id = %edge.id,
            reason = %reason,
            age_hours = lifespan_hours,
            final_ev = edge.current_ev,
            "Retired edge"
        );
        book.retired.insert(edge.id.clone(), edge.clone());
        Some(edge)
    }

    fn quality_locked(book: &EdgeBook, now: Instant) -> EdgeQualitySummary {
        let active: Vec<&Edge> = book.active.values().collect();

        let mut edge_types: BTreeMap<EdgeType, TypeQuality> = BTreeMap::new();
        for edge_type in EdgeType::ALL {
            let of_type: Vec<&&Edge> = active.iter().filter(|e| e.edge_type == edge_type).collect();
            if of_type.is_empty() {
                continue;
            }
            edge_types.insert(
                edge_type,
                TypeQuality {
                    count: of_type.len(),
                    avg_persistence: mean(of_type.iter().map(|e| e.persistence_score())),
                    avg_age_hours: mean(of_type.iter().map(|e| e.age_hours(now))),
                },
            );
        }

        EdgeQualitySummary {
            active_edges: active.len(),
            decaying_edges: active
                .iter()
                .filter(|e| e.status == EdgeStatus::Decaying)
                .count(),
            average_persistence: mean(active.iter().map(|e| e.persistence_score())),
            average_ev: mean(active.iter().map(|e| e.current_ev)),
            average_confidence: mean(active.iter().map(|e| e.confidence_score)),
            edge_types,
            average_lifespan_hours: mean(book.history.iter().map(|r| r.lifespan_hours)),
            counters: book.counters.clone(),
        }
    }
}
