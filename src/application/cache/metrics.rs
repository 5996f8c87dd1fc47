//! TTL cache for exported metrics and alerts.
//!
//! Components publish serialized snapshots here under well-known keys so a
//! host application can serve them without touching component state.

use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use tokio::time::Instant;
use tracing::debug;

/// Key under which scheduler status is cached.
pub const RECOMPUTE_METRICS_KEY: &str = "recompute_metrics";
/// Key under which the edge persistence export is cached.
pub const EDGE_METRICS_KEY: &str = "edge_persistence_metrics";
/// Key under which the calibration export is cached.
pub const CALIBRATION_METRICS_KEY: &str = "calibration_metrics";

struct Entry {
    value: serde_json::Value,
    expires_at: Instant,
}

/// Thread-safe key/value cache with per-entry expiry.
pub struct MetricsCache {
    entries: DashMap<String, Entry>,
    max_entries: usize,
}

impl MetricsCache {
    /// Create a cache holding at most `max_entries` live entries.
    #[must_use]
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            max_entries: max_entries.max(1),
        }
    }

    /// Store a serializable value for `ttl`.
    ///
    /// Values that fail to serialize are dropped with a debug log; the cache
    /// is a convenience surface and never blocks the caller.
    pub fn set<T: Serialize>(&self, key: impl Into<String>, value: &T, ttl: Duration) {
        let key = key.into();
        match serde_json::to_value(value) {
            Ok(value) => {
                self.entries.insert(
                    key,
                    Entry {
                        value,
                        expires_at: Instant::now() + ttl,
                    },
                );
            }
            Err(e) => {
                debug!(key = %key, error = %e, "Skipping cache write for unserializable value");
                return;
            }
        }

        if self.entries.len() > self.max_entries {
            self.gc();
        }
    }

    /// Get a live value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        let now = Instant::now();
        let entry = self.entries.get(key)?;
        if entry.expires_at > now {
            Some(entry.value.clone())
        } else {
            drop(entry);
            self.entries.remove(key);
            None
        }
    }

    /// Live keys starting with `prefix`, sorted.
    #[must_use]
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let now = Instant::now();
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.key().starts_with(prefix) && e.value().expires_at > now)
            .map(|e| e.key().clone())
            .collect();
        keys.sort();
        keys
    }

    /// Remove expired entries.
    pub fn gc(&self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.expires_at > now);
    }

    /// Number of entries, including any not yet collected.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for MetricsCache {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let cache = MetricsCache::default();
        cache.set("k", &serde_json::json!({"a": 1}), Duration::from_secs(60));
        assert_eq!(cache.get("k").unwrap()["a"], 1);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(cache.get("k").is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn prefix_lookup_skips_expired() {
        let cache = MetricsCache::default();
        cache.set("alert:a", &1, Duration::from_secs(10));
        cache.set("alert:b", &2, Duration::from_secs(100));
        cache.set("other", &3, Duration::from_secs(100));

        tokio::time::advance(Duration::from_secs(20)).await;
        assert_eq!(cache.keys_with_prefix("alert:"), vec!["alert:b".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn gc_runs_when_over_capacity() {
        let cache = MetricsCache::new(2);
        cache.set("a", &1, Duration::from_secs(1));
        cache.set("b", &2, Duration::from_secs(1));
        tokio::time::advance(Duration::from_secs(2)).await;
        cache.set("c", &3, Duration::from_secs(10));
        assert_eq!(cache.len(), 1);
    }
}
