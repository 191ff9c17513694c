//! Moka store implementation.

use async_trait::async_trait;
use moka::future::Cache;
use routebox_core::{CacheEntry, CacheKey, LIVENESS_TOKEN, Raw, Store, StoreLabel, StoreResult};
use tracing::trace;

use crate::builder::MokaStoreBuilder;

/// In-memory cache store powered by Moka.
///
/// Cloning is cheap and clones share the same cache.
///
/// # Caveats
///
/// - Data is **not persisted**: the cache is lost on process restart
/// - Data is **not shared** across processes
#[derive(Clone)]
pub struct MokaStore {
    cache: Cache<CacheKey, CacheEntry>,
    label: StoreLabel,
}

impl std::fmt::Debug for MokaStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MokaStore")
            .field("label", &self.label)
            .field("entries", &self.cache.entry_count())
            .finish()
    }
}

impl MokaStore {
    /// Creates a builder for a store holding at most `max_entries` entries.
    ///
    /// Least recently used entries are evicted past that capacity.
    pub fn builder(max_entries: u64) -> MokaStoreBuilder {
        MokaStoreBuilder::new(max_entries)
    }

    pub(crate) fn from_parts(cache: Cache<CacheKey, CacheEntry>, label: StoreLabel) -> Self {
        Self { cache, label }
    }

    /// Returns the underlying Moka cache.
    pub fn cache(&self) -> &Cache<CacheKey, CacheEntry> {
        &self.cache
    }
}

#[async_trait]
impl Store for MokaStore {
    async fn get(&self, key: &CacheKey) -> StoreResult<Option<Raw>> {
        trace!(%key, "moka get");
        Ok(self
            .cache
            .get(key)
            .await
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.data().clone()))
    }

    async fn set(&self, entry: CacheEntry) -> StoreResult<()> {
        trace!(key = %entry.key(), ttl = ?entry.ttl(), "moka set");
        self.cache.insert(entry.key().clone(), entry).await;
        Ok(())
    }

    async fn ping(&self) -> StoreResult<String> {
        Ok(LIVENESS_TOKEN.to_owned())
    }

    fn label(&self) -> StoreLabel {
        self.label.clone()
    }

    fn target(&self) -> String {
        format!("memory://{}", self.label)
    }
}
