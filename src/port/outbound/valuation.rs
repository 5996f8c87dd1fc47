//! Valuation engine port.
//!
//! The engine that actually prices props and detects edges lives outside this
//! crate. The scheduler hands it a job by value and applies the edge updates
//! it returns.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{edge::EdgeUpdate, recompute::RecomputeJob};
use crate::error::ValuationError;

/// What a recompute produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Valuation {
    /// Number of props whose valuation was refreshed.
    pub props_updated: usize,
    /// Edge mutations to apply, in order.
    #[serde(default)]
    pub edge_updates: Vec<EdgeUpdate>,
}

/// Port for the external valuation engine.
///
/// Implementations should return promptly; the scheduler enforces the
/// FAST/FULL timeout budget and abandons calls that exceed it.
#[async_trait]
pub trait ValuationEngine: Send + Sync {
    /// Recompute valuations for the job's game and props.
    async fn recompute(&self, job: RecomputeJob) -> Result<Valuation, ValuationError>;

    /// Name used in logs.
    fn name(&self) -> &'static str {
        "valuation"
    }
}
