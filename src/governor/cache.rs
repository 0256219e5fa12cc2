//! Time-bounded response cache.
//!
//! Entries move through three ages:
//!
//! ```text
//! age <= fresh_ms            → fresh (served, no upstream call)
//! fresh_ms < age <= stale_ms → stale (served, caller should refresh)
//! age > stale_ms             → expired (evicted on access or by the janitor)
//! ```
//!
//! Writers for the same fingerprint simply overwrite each other; the last
//! write wins.

use dashmap::DashMap;
use std::sync::Arc;

use crate::config::CacheConfig;
use crate::governor::fingerprint::{validator_for, Fingerprint};
use crate::observability::metrics;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub payload: Arc<str>,
    pub stored_at_ms: u64,
    pub validator: String,
}

/// Result of a successful lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheHit {
    pub payload: Arc<str>,
    pub validator: String,
    pub is_stale: bool,
    /// Milliseconds until the entry stops being fresh (0 once stale).
    pub fresh_remaining_ms: u64,
}

/// Entry counts by age, for the admin API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct CacheSummary {
    pub fresh: usize,
    pub stale: usize,
    pub expired: usize,
}

/// A thread-safe fingerprint → payload cache.
#[derive(Clone)]
pub struct ResponseCache {
    inner: Arc<DashMap<Fingerprint, CacheEntry>>,
    fresh_ms: u64,
    stale_ms: u64,
}

impl ResponseCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            fresh_ms: config.fresh_ms,
            stale_ms: config.stale_ms,
        }
    }

    /// Look up `fingerprint` at `now_ms`, evicting it if it has expired.
    pub fn get(&self, fingerprint: &Fingerprint, now_ms: u64) -> Option<CacheHit> {
        let hit = {
            let entry = self.inner.get(fingerprint)?;
            let age = now_ms.saturating_sub(entry.stored_at_ms);
            if age > self.stale_ms {
                None
            } else {
                Some(CacheHit {
                    payload: entry.payload.clone(),
                    validator: entry.validator.clone(),
                    is_stale: age > self.fresh_ms,
                    fresh_remaining_ms: self.fresh_ms.saturating_sub(age),
                })
            }
        };

        if hit.is_none() {
            // Re-check under the write lock: a concurrent put may have refreshed it.
            let removed = self.inner.remove_if(fingerprint, |_, entry| {
                now_ms.saturating_sub(entry.stored_at_ms) > self.stale_ms
            });
            if removed.is_some() {
                tracing::debug!(fingerprint = %fingerprint.short(), "Evicted expired cache entry");
                metrics::record_cache_size(self.inner.len());
            }
        }
        hit
    }

    /// Store `payload`, overwriting any previous entry. Returns the new validator.
    pub fn put(&self, fingerprint: Fingerprint, payload: &str, now_ms: u64) -> String {
        let validator = validator_for(payload);
        self.inner.insert(
            fingerprint,
            CacheEntry {
                payload: Arc::from(payload),
                stored_at_ms: now_ms,
                validator: validator.clone(),
            },
        );
        metrics::record_cache_size(self.inner.len());
        validator
    }

    /// True when `token` equals the stored validator of a live entry.
    /// Never touches the entry's timestamp.
    pub fn validator_matches(&self, fingerprint: &Fingerprint, token: &str, now_ms: u64) -> bool {
        self.get(fingerprint, now_ms)
            .is_some_and(|hit| hit.validator == token)
    }

    /// Remove every expired entry. Returns the number evicted.
    pub fn purge_expired(&self, now_ms: u64) -> usize {
        let before = self.inner.len();
        self.inner
            .retain(|_, entry| now_ms.saturating_sub(entry.stored_at_ms) <= self.stale_ms);
        let evicted = before.saturating_sub(self.inner.len());
        metrics::record_cache_size(self.inner.len());
        evicted
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn summary(&self, now_ms: u64) -> CacheSummary {
        let mut summary = CacheSummary::default();
        for r in self.inner.iter() {
            let age = now_ms.saturating_sub(r.value().stored_at_ms);
            if age <= self.fresh_ms {
                summary.fresh += 1;
            } else if age <= self.stale_ms {
                summary.stale += 1;
            } else {
                summary.expired += 1;
            }
        }
        summary
    }
}
