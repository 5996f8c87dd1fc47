//! Edge quality summaries and metric exports.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::edge::{DecayReason, EdgeType};
use crate::domain::id::EdgeId;

/// Lifetime counters of the edge book.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EdgeCounters {
    pub edges_created: u64,
    pub edges_retired: u64,
    /// Edges retired for crossing the false-positive threshold.
    pub false_positives_detected: u64,
    /// False-positive signals received, whether or not they retired the edge.
    pub false_positive_flags: u64,
}

/// A retired edge as kept for lifespan analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetiredEdgeRecord {
    pub edge_id: EdgeId,
    pub edge_type: EdgeType,
    pub lifespan_hours: f64,
    pub initial_ev: f64,
    pub final_ev: f64,
    pub reason: DecayReason,
    pub retired_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TypeQuality {
    pub count: usize,
    pub avg_persistence: f64,
    pub avg_age_hours: f64,
}

/// Quality of the live edge book.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EdgeQualitySummary {
    pub active_edges: usize,
    pub decaying_edges: usize,
    pub average_persistence: f64,
    pub average_ev: f64,
    pub average_confidence: f64,
    pub edge_types: BTreeMap<EdgeType, TypeQuality>,
    pub average_lifespan_hours: f64,
    pub counters: EdgeCounters,
}

/// Live edges bucketed by persistence score.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PersistenceDistribution {
    /// Score at or above 0.7.
    pub high: usize,
    /// Score in `[0.3, 0.7)`.
    pub medium: usize,
    /// Score below 0.3.
    pub low: usize,
}

impl PersistenceDistribution {
    pub(crate) fn add(&mut self, score: f64) {
        if score >= 0.7 {
            self.high += 1;
        } else if score >= 0.3 {
            self.medium += 1;
        } else {
            self.low += 1;
        }
    }
}

/// Full metrics export, also cached for host applications.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeMetricsExport {
    pub exported_at: DateTime<Utc>,
    pub quality: EdgeQualitySummary,
    pub retirement_reasons: BTreeMap<DecayReason, usize>,
    pub persistence_distribution: PersistenceDistribution,
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
