//! Redis store implementation.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use redis::{Client, aio::ConnectionManager};
use routebox_core::{CacheEntry, CacheKey, Raw, Store, StoreLabel, StoreResult};
use tokio::sync::OnceCell;
use tracing::trace;

use crate::error::Error;

/// Default bound for a single Redis operation, connection setup included.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(2);

/// Redis cache store based on the redis-rs crate.
///
/// Uses a [`ConnectionManager`] created lazily on first use, so building the
/// store never touches the network.
///
/// [`ConnectionManager`]: redis::aio::ConnectionManager
#[derive(Clone)]
pub struct RedisStore {
    client: Client,
    connection: OnceCell<ConnectionManager>,
    connection_info: String,
    operation_timeout: Duration,
    label: StoreLabel,
}

impl RedisStore {
    /// Creates new RedisStore builder with default settings.
    #[must_use]
    pub fn builder() -> RedisStoreBuilder {
        RedisStoreBuilder::default()
    }

    /// Create lazy connection to redis via [`ConnectionManager`].
    pub async fn connection(&self) -> Result<&ConnectionManager, Error> {
        trace!("Get connection manager");
        let manager = self
            .connection
            .get_or_try_init(|| {
                trace!("Initialize new redis connection manager");
                self.client.get_connection_manager()
            })
            .await?;
        Ok(manager)
    }

    async fn bounded<T, F>(&self, operation: F) -> Result<T, Error>
    where
        F: Future<Output = Result<T, Error>>,
    {
        tokio::time::timeout(self.operation_timeout, operation)
            .await
            .map_err(|_| Error::Timeout(self.operation_timeout))?
    }
}

/// Part of builder pattern implementation for RedisStore.
pub struct RedisStoreBuilder {
    connection_info: String,
    operation_timeout: Duration,
    label: StoreLabel,
}

impl Default for RedisStoreBuilder {
    fn default() -> Self {
        Self {
            connection_info: "redis://127.0.0.1:6379/".to_owned(),
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
            label: StoreLabel::new_static("redis"),
        }
    }
}

impl RedisStoreBuilder {
    /// Set connection info (host, port, database, etc.) for RedisStore.
    pub fn server(mut self, connection_info: impl Into<String>) -> Self {
        self.connection_info = connection_info.into();
        self
    }

    /// Set the bound applied to every Redis operation.
    pub fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Set a custom label for this store.
    pub fn label(mut self, label: impl Into<StoreLabel>) -> Self {
        self.label = label.into();
        self
    }

    /// Create new instance of Redis store with passed settings.
    pub fn build(self) -> Result<RedisStore, Error> {
        Ok(RedisStore {
            client: Client::open(self.connection_info.as_str())?,
            connection: OnceCell::new(),
            connection_info: self.connection_info,
            operation_timeout: self.operation_timeout,
            label: self.label,
        })
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn get(&self, key: &CacheKey) -> StoreResult<Option<Raw>> {
        let data = self
            .bounded(async {
                let mut con = self.connection().await?.clone();
                let data: Option<Vec<u8>> = redis::cmd("GET")
                    .arg(key.as_str())
                    .query_async(&mut con)
                    .await?;
                Ok(data)
            })
            .await?;
        trace!(%key, hit = data.is_some(), "redis get");
        Ok(data.map(Bytes::from))
    }

    async fn set(&self, entry: CacheEntry) -> StoreResult<()> {
        // Redis rejects `EX 0`; a zero TTL means the entry is not written.
        let Some(ttl) = expire_seconds(entry.time_to_live()) else {
            return Ok(());
        };
        self.bounded(async {
            let mut con = self.connection().await?.clone();
            redis::cmd("SET")
                .arg(entry.key().as_str())
                .arg(entry.data().as_ref())
                .arg("EX")
                .arg(ttl)
                .query_async::<()>(&mut con)
                .await?;
            Ok(())
        })
        .await?;
        trace!(key = %entry.key(), ttl, "redis set");
        Ok(())
    }

    async fn ping(&self) -> StoreResult<String> {
        let reply = self
            .bounded(async {
                let mut con = self.connection().await?.clone();
                let reply: String = redis::cmd("PING").query_async(&mut con).await?;
                Ok(reply)
            })
            .await?;
        Ok(reply)
    }

    fn label(&self) -> StoreLabel {
        self.label.clone()
    }

    fn target(&self) -> String {
        redact_credentials(&self.connection_info)
    }
}

/// Whole seconds sent as `EX`, rounded up so sub-second TTLs still expire.
fn expire_seconds(ttl: Duration) -> Option<u64> {
    if ttl.is_zero() {
        return None;
    }
    Some(ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0))
}

/// Hides the user info part of a connection URL.
fn redact_credentials(connection_info: &str) -> String {
    let Some((scheme, rest)) = connection_info.split_once("://") else {
        return connection_info.to_owned();
    };
    let authority_end = rest.find('/').unwrap_or(rest.len());
    match rest[..authority_end].rfind('@') {
        Some(at) => format!("{scheme}://***@{}", &rest[at + 1..]),
        None => connection_info.to_owned(),
    }
}
