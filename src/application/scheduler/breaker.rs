//! Sliding-window circuit breakers for recompute execution.
//!
//! The global breaker is open while the trailing window holds at least
//! `failure_threshold` failures, so it closes by itself as failures age out.
//! Prop breakers block a single prop after `prop_failure_threshold` recent
//! failures; one success for the prop clears it.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use super::config::BreakerConfig;
use crate::domain::id::PropId;

/// Breaker state for status reporting.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BreakerState {
    pub open: bool,
    pub recent_failures: usize,
    pub failure_threshold: usize,
    pub blocked_props: Vec<PropId>,
}

pub(crate) struct CircuitBreaker {
    failure_threshold: usize,
    prop_failure_threshold: usize,
    window: Duration,
    failures: VecDeque<Instant>,
    prop_failures: HashMap<PropId, VecDeque<Instant>>,
}

impl CircuitBreaker {
    pub fn new(config: &BreakerConfig) -> Self {
        Self {
            failure_threshold: config.failure_threshold,
            prop_failure_threshold: config.prop_failure_threshold,
            window: config.window(),
            failures: VecDeque::new(),
            prop_failures: HashMap::new(),
        }
    }

    fn prune(&mut self, now: Instant) {
        let Some(cutoff) = now.checked_sub(self.window) else {
            return;
        };
        while self.failures.front().is_some_and(|t| *t < cutoff) {
            self.failures.pop_front();
        }
        self.prop_failures.retain(|_, times| {
            while times.front().is_some_and(|t| *t < cutoff) {
                times.pop_front();
            }
            !times.is_empty()
        });
    }

    pub fn is_open(&mut self, now: Instant) -> bool {
        self.prune(now);
        self.failures.len() >= self.failure_threshold
    }

    /// First requested prop that is blocked, with its recent failure count.
    pub fn blocked_prop(&mut self, props: &[PropId], now: Instant) -> Option<(PropId, usize)> {
        self.prune(now);
        props.iter().find_map(|prop| {
            let failures = self.prop_failures.get(prop).map_or(0, VecDeque::len);
            (failures >= self.prop_failure_threshold).then(|| (prop.clone(), failures))
        })
    }

    /// Record a failed execution. Returns `true` when this failure opened the
    /// global breaker.
    pub fn record_failure(&mut self, props: &[PropId], now: Instant) -> bool {
        let was_open = self.is_open(now);
        self.failures.push_back(now);
        for prop in props {
            self.prop_failures
                .entry(prop.clone())
                .or_default()
                .push_back(now);
        }
        !was_open && self.failures.len() >= self.failure_threshold
    }

    /// A success clears the prop breakers of the job's props.
    pub fn record_success(&mut self, props: &[PropId]) {
        for prop in props {
            self.prop_failures.remove(prop);
        }
    }

    pub fn reset(&mut self) {
        self.failures.clear();
        self.prop_failures.clear();
    }

    pub fn reset_prop(&mut self, prop: &PropId) -> bool {
        self.prop_failures.remove(prop).is_some()
    }

    pub fn state(&mut self, now: Instant) -> BreakerState {
        let open = self.is_open(now);
        let mut blocked_props: Vec<PropId> = self
            .prop_failures
            .iter()
            .filter(|(_, times)| times.len() >= self.prop_failure_threshold)
            .map(|(prop, _)| prop.clone())
            .collect();
        blocked_props.sort();
        BreakerState {
            open,
            recent_failures: self.failures.len(),
            failure_threshold: self.failure_threshold,
            blocked_props,
        }
    }
}
