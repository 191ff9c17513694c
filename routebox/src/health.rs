//! Concurrent health aggregation.
//!
//! [`HealthAggregator`] runs the cache store probe, every optimizer profile
//! probe and every map-routing probe at once. Each probe is bounded by the
//! configured timeout, so one hung dependency only delays the report by that
//! bound and never hides the results of its siblings.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use routebox_core::{
    HealthProbeResult, HealthReport, LIVENESS_TOKEN, Probe, ProbeTarget, ServiceHealth, Store,
};
use tracing::{debug, warn};

use crate::metrics;

/// Default time bound of a single probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Service name the store probe reports under.
pub const CACHE_SERVICE: &str = "cache";

/// Probes the cache store with `ping`.
///
/// Healthy iff the store answers [`LIVENESS_TOKEN`].
pub struct StoreProbe {
    store: Arc<dyn Store>,
    target: ProbeTarget,
}

impl StoreProbe {
    /// Creates a probe for `store`.
    pub fn new(store: Arc<dyn Store>) -> Self {
        let target = ProbeTarget::new(CACHE_SERVICE, store.target());
        Self { store, target }
    }
}

#[async_trait]
impl Probe for StoreProbe {
    fn target(&self) -> &ProbeTarget {
        &self.target
    }

    async fn probe(&self) -> HealthProbeResult {
        match self.store.ping().await {
            Ok(token) if token == LIVENESS_TOKEN => {
                HealthProbeResult::new(&self.target, 0, true, token)
            }
            Ok(token) => HealthProbeResult::new(
                &self.target,
                0,
                false,
                format!("unexpected ping answer: {token}"),
            ),
            Err(error) => {
                let code = if error.is_connection() {
                    "ECONNREFUSED"
                } else {
                    "ESTORE"
                };
                HealthProbeResult::unreachable(&self.target, code, error)
            }
        }
    }
}

/// Named set of probes, one per profile of a service.
#[derive(Clone)]
pub struct ProbeGroup {
    name: String,
    probes: Vec<Arc<dyn Probe>>,
}

impl ProbeGroup {
    /// Creates an empty group.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            probes: Vec::new(),
        }
    }

    /// Adds a probe.
    #[must_use]
    pub fn probe(mut self, probe: impl Probe + 'static) -> Self {
        self.probes.push(Arc::new(probe));
        self
    }

    /// Adds an already shared probe.
    #[must_use]
    pub fn shared(mut self, probe: Arc<dyn Probe>) -> Self {
        self.probes.push(probe);
        self
    }

    /// Group name, used as the key in the report.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of probes in the group.
    pub fn len(&self) -> usize {
        self.probes.len()
    }

    /// `true` when the group has no probes.
    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }

    async fn check(&self, timeout: Duration) -> ServiceHealth {
        let checks = self
            .probes
            .iter()
            .map(|probe| bounded(probe.as_ref(), timeout));
        let results = join_all(checks).await;
        ServiceHealth::new(self.name.clone(), results)
    }
}

async fn bounded(probe: &dyn Probe, timeout: Duration) -> HealthProbeResult {
    let result = match tokio::time::timeout(timeout, probe.probe()).await {
        Ok(result) => result,
        Err(_) => {
            warn!(
                service = %probe.target().service,
                profile = ?probe.target().profile,
                timeout_ms = timeout.as_millis() as u64,
                "probe timed out"
            );
            HealthProbeResult::timed_out(probe.target(), timeout)
        }
    };
    metrics::record_probe(&result);
    result
}

/// Aggregates every dependency probe into a [`HealthReport`].
#[derive(Clone)]
pub struct HealthAggregator {
    store: Arc<dyn Probe>,
    optimizer: ProbeGroup,
    routing: ProbeGroup,
    timeout: Duration,
}

impl HealthAggregator {
    /// Creates a builder.
    pub fn builder() -> HealthAggregatorBuilder {
        HealthAggregatorBuilder::default()
    }

    /// Per probe time bound.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Runs every probe concurrently and assembles the report.
    ///
    /// Never fails: failing or hung probes are reported with `ok = false`.
    pub async fn check_all(&self) -> HealthReport {
        let (optimizer, cache, routing) = tokio::join!(
            self.optimizer.check(self.timeout),
            bounded(self.store.as_ref(), self.timeout),
            self.routing.check(self.timeout),
        );
        let report = HealthReport::new(optimizer, cache, routing);
        debug!(ok = report.ok(), probes = report.probes().count(), "health check finished");
        report
    }
}

/// Builder for [`HealthAggregator`].
pub struct HealthAggregatorBuilder {
    store: Option<Arc<dyn Probe>>,
    optimizer: ProbeGroup,
    routing: ProbeGroup,
    timeout: Duration,
}

impl Default for HealthAggregatorBuilder {
    fn default() -> Self {
        Self {
            store: None,
            optimizer: ProbeGroup::new("vroom"),
            routing: ProbeGroup::new("osrm"),
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }
}

impl HealthAggregatorBuilder {
    /// Probes `store` with `ping`.
    pub fn store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = Some(Arc::new(StoreProbe::new(store)));
        self
    }

    /// Uses a custom probe for the cache slot.
    pub fn store_probe(mut self, probe: impl Probe + 'static) -> Self {
        self.store = Some(Arc::new(probe));
        self
    }

    /// Sets the optimizer probe group.
    pub fn optimizer(mut self, group: ProbeGroup) -> Self {
        self.optimizer = group;
        self
    }

    /// Sets the map-routing probe group.
    pub fn routing(mut self, group: ProbeGroup) -> Self {
        self.routing = group;
        self
    }

    /// Sets the per probe time bound.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds the aggregator.
    ///
    /// Without a store the cache slot always reports unhealthy.
    pub fn build(self) -> HealthAggregator {
        let store = self.store.unwrap_or_else(|| Arc::new(MissingStore::default()));
        HealthAggregator {
            store,
            optimizer: self.optimizer,
            routing: self.routing,
            timeout: self.timeout,
        }
    }
}

struct MissingStore {
    target: ProbeTarget,
}

impl Default for MissingStore {
    fn default() -> Self {
        Self {
            target: ProbeTarget::new(CACHE_SERVICE, ""),
        }
    }
}

#[async_trait]
impl Probe for MissingStore {
    fn target(&self) -> &ProbeTarget {
        &self.target
    }

    async fn probe(&self) -> HealthProbeResult {
        HealthProbeResult::new(&self.target, 0, false, "no cache store configured")
    }
}
