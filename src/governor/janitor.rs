//! Periodic sweep of expired cache entries.
//!
//! Lookups already evict expired entries they touch; the janitor catches the
//! ones nobody asks for again.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time;

use crate::clock::Clock;
use crate::governor::cache::ResponseCache;

pub struct CacheJanitor {
    cache: ResponseCache,
    clock: Arc<dyn Clock>,
    interval: Duration,
}

impl CacheJanitor {
    pub fn new(cache: ResponseCache, clock: Arc<dyn Clock>, interval: Duration) -> Self {
        Self {
            cache,
            clock,
            interval,
        }
    }

    /// Sweep once. Returns the number of evicted entries.
    pub fn sweep(&self) -> usize {
        let evicted = self.cache.purge_expired(self.clock.now_ms());
        if evicted > 0 {
            tracing::debug!(evicted, remaining = self.cache.len(), "Cache sweep");
        }
        evicted
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval_secs = self.interval.as_secs(), "Cache janitor starting");

        let mut ticker = time::interval(self.interval);
        // The first tick completes immediately; skip it.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep();
                }
                _ = shutdown.recv() => {
                    tracing::info!("Cache janitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
