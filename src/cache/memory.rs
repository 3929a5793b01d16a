//! In-process cache store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::cache::{CacheStore, StoreResult};
use crate::lifecycle::Shutdown;

#[derive(Debug, Clone)]
struct Entry {
    value: Arc<[u8]>,
    expires_at: Instant,
}

/// A thread-safe TTL map used when no Redis URL is configured.
///
/// Expired entries are dropped lazily when read, or in bulk by [`MemoryStore::purge_expired`],
/// which [`MemoryStore::spawn_purger`] runs on a timer.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<DashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included until purged.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Drop every expired entry; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.inner.len();
        self.inner.retain(|_, entry| entry.expires_at > now);
        before.saturating_sub(self.inner.len())
    }

    /// Run [`MemoryStore::purge_expired`] every `every` until `shutdown` fires.
    pub fn spawn_purger(&self, every: Duration, shutdown: Shutdown) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let stopped = shutdown.wait();
            tokio::pin!(stopped);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = store.purge_expired();
                        if removed > 0 {
                            tracing::debug!(removed, remaining = store.len(), "Purged expired cache entries");
                        }
                    }
                    _ = &mut stopped => {
                        tracing::debug!("Cache purger received shutdown signal, exiting loop");
                        break;
                    }
                }
            }
        })
    }

    fn live(&self, key: &str) -> Option<Arc<[u8]>> {
        let now = Instant::now();
        {
            let entry = self.inner.get(key)?;
            if entry.expires_at > now {
                return Some(entry.value.clone());
            }
        }
        // Expired: remove unless a writer replaced it meanwhile.
        self.inner.remove_if(key, |_, entry| entry.expires_at <= now);
        None
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.live(key).map(|value| value.to_vec()))
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> StoreResult<()> {
        self.inner.insert(
            key.to_string(),
            Entry {
                value: Arc::from(value),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        Ok(self.live(key).is_some())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
