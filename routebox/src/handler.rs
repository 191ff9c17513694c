//! Cache-aside request handling.
//!
//! For every optimization request [`CacheAside`]:
//!
//! 1. derives the cache key from the request body
//! 2. looks the key up in the store and serves a hit directly
//! 3. otherwise forwards the body upstream
//! 4. writes a `200` answer back to the store with the policy TTL
//!
//! Store failures never fail a request: a failed read is treated as a miss
//! and a failed write is logged and dropped.

use std::sync::Arc;
use std::time::Instant;

use routebox_core::{
    CacheEntry, CacheKey, Forward, ForwardOutcome, KeyDeriver, Lookup, ProxyResponse, Store,
};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::metrics;
use crate::policy::CachePolicy;

/// Cache-aside handler over a shared store and forwarder.
///
/// Cheap to clone, all clones share the same store and forwarder.
pub struct CacheAside<S, F>
where
    S: Store + ?Sized,
    F: Forward + ?Sized,
{
    store: Arc<S>,
    forwarder: Arc<F>,
    keys: KeyDeriver,
    policy: CachePolicy,
}

impl<S, F> Clone for CacheAside<S, F>
where
    S: Store + ?Sized,
    F: Forward + ?Sized,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            forwarder: Arc::clone(&self.forwarder),
            keys: self.keys.clone(),
            policy: self.policy,
        }
    }
}

impl<S, F> CacheAside<S, F>
where
    S: Store + ?Sized,
    F: Forward + ?Sized,
{
    /// Creates a handler with the default key namespace and TTL.
    pub fn new(store: Arc<S>, forwarder: Arc<F>) -> Self {
        Self {
            store,
            forwarder,
            keys: KeyDeriver::default(),
            policy: CachePolicy::default(),
        }
    }

    /// Replaces the key deriver.
    #[must_use]
    pub fn keys(mut self, keys: KeyDeriver) -> Self {
        self.keys = keys;
        self
    }

    /// Replaces the write-back policy.
    #[must_use]
    pub fn policy(mut self, policy: CachePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Returns the store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Returns the forwarder.
    pub fn forwarder(&self) -> &Arc<F> {
        &self.forwarder
    }

    /// Handles one optimization request.
    ///
    /// Never fails: every path resolves to a [`ProxyResponse`] carrying its
    /// cache disposition.
    #[instrument(skip_all, fields(key))]
    pub async fn handle(&self, body: &Value) -> ProxyResponse {
        let response = self.respond(body).await;
        metrics::record_cache_status(response.cache_status);
        response
    }

    async fn respond(&self, body: &Value) -> ProxyResponse {
        let key = match self.keys.derive(body) {
            Ok(key) => key,
            Err(error) => {
                warn!(%error, "failed to derive cache key");
                return ProxyResponse::internal_error();
            }
        };
        tracing::Span::current().record("key", key.as_str());

        match self.store.lookup(&key).await {
            Lookup::Hit(data) => {
                debug!("cache hit");
                return ProxyResponse::hit(data);
            }
            Lookup::Miss => debug!("cache miss"),
            Lookup::Unavailable(error) => {
                warn!(%error, store = %self.store.label(), "cache read failed, forwarding");
                metrics::record_store_error(self.store.label().as_str(), "read");
            }
        }

        let started = Instant::now();
        let outcome = self.forwarder.forward(body).await;
        metrics::record_forward(&outcome, started.elapsed());

        match &outcome {
            ForwardOutcome::Success { .. } => {}
            ForwardOutcome::UpstreamError { status, .. } => {
                debug!(status = status.as_u16(), "upstream answered with error status");
            }
            ForwardOutcome::TransportFailure(code) => {
                debug!(%code, upstream = self.forwarder.target(), "upstream unreachable");
            }
            ForwardOutcome::UnexpectedFailure(reason) => {
                debug!(%reason, upstream = self.forwarder.target(), "forward failed");
            }
        }

        if self.policy.should_cache(&outcome) {
            self.write_back(key, &outcome).await;
        }

        outcome.into_response()
    }

    async fn write_back(&self, key: CacheKey, outcome: &ForwardOutcome) {
        let ForwardOutcome::Success { body, .. } = outcome else {
            return;
        };
        let entry = CacheEntry::new(key, body.clone(), self.policy.ttl);
        if let Err(error) = self.store.set(entry).await {
            warn!(%error, store = %self.store.label(), "cache write failed");
            metrics::record_store_error(self.store.label().as_str(), "write");
        }
    }
}
