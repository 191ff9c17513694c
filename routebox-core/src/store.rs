//! Cache store client contract.
//!
//! The store itself (Redis, an in-process Moka cache, ...) lives outside this
//! crate. [`Store`] is the narrow contract the proxy needs from it:
//!
//! - `get(key)` returns the cached body or nothing
//! - `set(entry)` writes a body with a TTL
//! - `ping()` returns the store's liveness token
//!
//! Store read failures are surfaced through [`Lookup::Unavailable`] so callers
//! decide explicitly how an outage is handled instead of propagating errors.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{CacheKey, Raw, StoreLabel, response::CacheStatus};

/// Token a healthy store answers to `ping()`.
pub const LIVENESS_TOKEN: &str = "PONG";

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Error type for store operations.
///
/// Store specific errors (e.g. the Redis client's) convert into one of these
/// groups.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Internal store error, state or computation error.
    ///
    /// Any error not bound to network interaction.
    #[error(transparent)]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
    /// Network interaction error: unreachable store, dropped connection, timeout.
    #[error(transparent)]
    ConnectionError(Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    /// Returns `true` for network interaction errors.
    pub fn is_connection(&self) -> bool {
        matches!(self, StoreError::ConnectionError(_))
    }
}

/// A cached optimization result with its lifetime.
///
/// Entries are created once per successful forward and never mutated; the
/// store drops them when they expire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    key: CacheKey,
    data: Raw,
    created: DateTime<Utc>,
    expire: DateTime<Utc>,
    time_to_live: Duration,
}

impl CacheEntry {
    /// Creates an entry that expires `ttl` from now.
    pub fn new(key: CacheKey, data: Raw, ttl: Duration) -> Self {
        let created = Utc::now();
        let expire = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| created.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            key,
            data,
            created,
            expire,
            time_to_live: ttl,
        }
    }

    /// Returns the entry key.
    #[inline]
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Returns the cached response body.
    #[inline]
    pub fn data(&self) -> &Raw {
        &self.data
    }

    /// Returns when the entry was created.
    #[inline]
    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    /// Returns when the entry expires.
    #[inline]
    pub fn expire(&self) -> DateTime<Utc> {
        self.expire
    }

    /// Time to live the entry was created with.
    #[inline]
    pub fn time_to_live(&self) -> Duration {
        self.time_to_live
    }

    /// Remaining time to live, zero once expired.
    pub fn ttl(&self) -> Duration {
        (self.expire - Utc::now()).to_std().unwrap_or(Duration::ZERO)
    }

    /// Returns `true` once the expiration time has passed.
    pub fn is_expired(&self) -> bool {
        self.expire <= Utc::now()
    }

    /// Consumes the entry, returning its key and body.
    pub fn into_parts(self) -> (CacheKey, Raw) {
        (self.key, self.data)
    }
}

/// Outcome of a store read.
///
/// Collapsed into a binary [`CacheStatus`] at the handler boundary: an
/// unavailable store counts as a miss.
#[derive(Debug)]
pub enum Lookup {
    /// The key was found.
    Hit(Raw),
    /// The key was not found.
    Miss,
    /// The store could not be read.
    Unavailable(StoreError),
}

impl Lookup {
    /// Disposition reported to the client for this lookup.
    pub fn status(&self) -> CacheStatus {
        match self {
            Lookup::Hit(_) => CacheStatus::Hit,
            Lookup::Miss | Lookup::Unavailable(_) => CacheStatus::Miss,
        }
    }
}

/// Client contract of a cache store shared across requests.
#[async_trait]
pub trait Store: Send + Sync {
    /// Reads the body stored under `key`.
    async fn get(&self, key: &CacheKey) -> StoreResult<Option<Raw>>;

    /// Writes an entry, replacing any previous value and TTL for its key.
    async fn set(&self, entry: CacheEntry) -> StoreResult<()>;

    /// Liveness check, a healthy store answers [`LIVENESS_TOKEN`].
    async fn ping(&self) -> StoreResult<String>;

    /// Returns the label of this store.
    fn label(&self) -> StoreLabel {
        StoreLabel::new_static("store")
    }

    /// Returns the connection target shown in health reports.
    fn target(&self) -> String {
        self.label().to_string()
    }

    /// Reads `key`, folding errors into [`Lookup::Unavailable`].
    async fn lookup(&self, key: &CacheKey) -> Lookup {
        match self.get(key).await {
            Ok(Some(data)) => Lookup::Hit(data),
            Ok(None) => Lookup::Miss,
            Err(error) => Lookup::Unavailable(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn entry_expires_after_ttl() {
        let entry = CacheEntry::new(
            CacheKey::new("vroom", "abc"),
            Bytes::from_static(b"{}"),
            Duration::from_secs(3600),
        );

        assert!(!entry.is_expired());
        assert!(entry.ttl() > Duration::from_secs(3590));
        assert_eq!(entry.expire() - entry.created(), chrono::Duration::seconds(3600));
        assert_eq!(entry.time_to_live(), Duration::from_secs(3600));
    }

    #[test]
    fn zero_ttl_entry_is_expired() {
        let entry = CacheEntry::new(CacheKey::new("vroom", "abc"), Bytes::new(), Duration::ZERO);

        assert!(entry.is_expired());
        assert_eq!(entry.ttl(), Duration::ZERO);
    }

    #[test]
    fn unavailable_lookup_counts_as_miss() {
        let lookup = Lookup::Unavailable(StoreError::ConnectionError(Box::new(
            std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
        )));

        assert_eq!(lookup.status(), CacheStatus::Miss);
        assert_eq!(Lookup::Hit(Bytes::new()).status(), CacheStatus::Hit);
    }
}
