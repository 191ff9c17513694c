//! Builder for configuring [`MokaStore`].

use std::time::{Duration, Instant};

use chrono::Utc;
use moka::Expiry;
use moka::future::{Cache, CacheBuilder};
use routebox_core::{CacheEntry, CacheKey, StoreLabel};

use crate::store::MokaStore;

/// Expiration policy reading the TTL from each [`CacheEntry`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct Expiration;

impl Expiry<CacheKey, CacheEntry> for Expiration {
    fn expire_after_create(
        &self,
        _key: &CacheKey,
        value: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(Self::remaining(value))
    }

    fn expire_after_update(
        &self,
        _key: &CacheKey,
        value: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        // A replaced entry takes the new entry's TTL, not what was left of the old one.
        Some(Self::remaining(value))
    }
}

impl Expiration {
    fn remaining(value: &CacheEntry) -> Duration {
        let millis = (value.expire() - Utc::now()).num_milliseconds();
        if millis <= 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(millis as u64)
        }
    }
}

/// Builder for creating a [`MokaStore`].
///
/// ```
/// use routebox_moka::MokaStore;
///
/// let store = MokaStore::builder(10_000).label("local").build();
/// ```
#[derive(Debug, Clone)]
pub struct MokaStoreBuilder {
    max_entries: u64,
    label: StoreLabel,
}

impl MokaStoreBuilder {
    pub(crate) fn new(max_entries: u64) -> Self {
        Self {
            max_entries,
            label: StoreLabel::new_static("moka"),
        }
    }

    /// Sets a custom label for this store.
    ///
    /// # Default
    ///
    /// `"moka"`
    pub fn label(mut self, label: impl Into<StoreLabel>) -> Self {
        self.label = label.into();
        self
    }

    /// Builds the store.
    pub fn build(self) -> MokaStore {
        let cache: Cache<CacheKey, CacheEntry> = CacheBuilder::new(self.max_entries)
            .expire_after(Expiration)
            .build();
        MokaStore::from_parts(cache, self.label)
    }
}
