//! Edge persistence configuration.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use crate::domain::edge::{EdgeType, RetirementRule};
use crate::error::ConfigError;

/// Partial override of a built-in retirement rule.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuleOverride {
    pub decay_rate: Option<f64>,
    pub max_age_hours: Option<f64>,
    pub min_ev: Option<f64>,
    pub min_confidence: Option<f64>,
    pub max_line_movement: Option<f64>,
    pub max_volatility: Option<f64>,
    pub false_positive_threshold: Option<u32>,
}

impl RuleOverride {
    fn apply(&self, mut rule: RetirementRule) -> RetirementRule {
        if let Some(v) = self.decay_rate {
            rule.decay_rate = v;
        }
        if let Some(v) = self.max_age_hours {
            rule.max_age_hours = v;
        }
        if let Some(v) = self.min_ev {
            rule.min_ev = v;
        }
        if let Some(v) = self.min_confidence {
            rule.min_confidence = v;
        }
        if let Some(v) = self.max_line_movement {
            rule.max_line_movement = v;
        }
        if let Some(v) = self.max_volatility {
            rule.max_volatility = v;
        }
        if let Some(v) = self.false_positive_threshold {
            rule.false_positive_threshold = v;
        }
        rule
    }
}

/// Configuration for the edge persistence model.
#[derive(Debug, Clone, Deserialize)]
pub struct EdgeConfig {
    /// Interval of the stale-edge sweep. Defaults to 300 seconds.
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,

    /// Scores below this mark an edge as decaying. Defaults to 0.2.
    #[serde(default = "default_decaying_threshold")]
    pub decaying_threshold: f64,

    /// Scores below this retire the edge. Defaults to 0.1.
    #[serde(default = "default_retire_threshold")]
    pub retire_threshold: f64,

    /// EV volatility above this is penalized in the score. Defaults to 0.05.
    #[serde(default = "default_volatility_penalty_threshold")]
    pub volatility_penalty_threshold: f64,

    /// Retired edges kept for lifespan analysis. Defaults to 1000.
    #[serde(default = "default_history_size")]
    pub history_size: usize,

    /// TTL of the cached metrics export. Defaults to 300 seconds.
    #[serde(default = "default_metrics_ttl_secs")]
    pub metrics_ttl_secs: u64,

    /// Per-type overrides of the built-in retirement rules.
    #[serde(default)]
    pub rules: HashMap<EdgeType, RuleOverride>,
}

impl EdgeConfig {
    #[must_use]
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    #[must_use]
    pub fn metrics_ttl(&self) -> Duration {
        Duration::from_secs(self.metrics_ttl_secs)
    }

    /// Effective retirement rule for a type: built-in values plus overrides.
    #[must_use]
    pub fn rule_for(&self, edge_type: EdgeType) -> RetirementRule {
        let base = RetirementRule::for_type(edge_type);
        match self.rules.get(&edge_type) {
            Some(over) => over.apply(base),
            None => base,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.retire_threshold)
            || !(0.0..=1.0).contains(&self.decaying_threshold)
        {
            return Err(ConfigError::InvalidValue {
                field: "edges.thresholds",
                reason: "score thresholds must be within [0, 1]".into(),
            });
        }
        if self.retire_threshold > self.decaying_threshold {
            return Err(ConfigError::InvalidValue {
                field: "edges.retire_threshold",
                reason: "must not exceed decaying_threshold".into(),
            });
        }
        if self.cleanup_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "edges.cleanup_interval_secs",
                reason: "must be greater than 0".into(),
            });
        }
        for edge_type in EdgeType::ALL {
            let rule = self.rule_for(edge_type);
            if rule.decay_rate < 0.0 {
                return Err(ConfigError::InvalidValue {
                    field: "edges.rules.decay_rate",
                    reason: format!("{edge_type}: must not be negative"),
                });
            }
            if rule.max_line_movement <= 0.0 {
                return Err(ConfigError::InvalidValue {
                    field: "edges.rules.max_line_movement",
                    reason: format!("{edge_type}: must be greater than 0"),
                });
            }
        }
        Ok(())
    }
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            cleanup_interval_secs: default_cleanup_interval_secs(),
            decaying_threshold: default_decaying_threshold(),
            retire_threshold: default_retire_threshold(),
            volatility_penalty_threshold: default_volatility_penalty_threshold(),
            history_size: default_history_size(),
            metrics_ttl_secs: default_metrics_ttl_secs(),
            rules: HashMap::new(),
        }
    }
}

const fn default_cleanup_interval_secs() -> u64 {
    300
}

const fn default_decaying_threshold() -> f64 {
    0.2
}

const fn default_retire_threshold() -> f64 {
    0.1
}

const fn default_volatility_penalty_threshold() -> f64 {
    0.05
}

const fn default_history_size() -> usize {
    1000
}

const fn default_metrics_ttl_secs() -> u64 {
    300
}
