//! Proxy configuration.
//!
//! Loaded from YAML; every field has a default, so an empty document is a
//! valid configuration:
//!
//! ```yaml
//! listen: 0.0.0.0:8080
//! store:
//!   type: Redis
//!   connection_string: redis://127.0.0.1:6379/
//!   operation_timeout: 2s
//! upstream:
//!   url: http://127.0.0.1:3000/
//!   timeout: 60s
//! cache:
//!   namespace: vroom
//!   ttl: 1h
//!   key_mode: strict
//! health:
//!   probe_timeout: 5s
//!   optimizer:
//!     service: vroom
//!     profiles: [car]
//!   routing:
//!     service: osrm
//!     backends:
//!       - profile: car
//!         url: http://127.0.0.1:5000
//! ```

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use routebox_core::{KeyDeriver, KeyMode, ProbeCoordinates, Store};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::health::{CACHE_SERVICE, DEFAULT_PROBE_TIMEOUT};
use crate::policy::{CachePolicy, DEFAULT_TTL};

/// Default shared store.
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379/";

/// Default upstream optimization endpoint.
pub const DEFAULT_UPSTREAM_URL: &str = "http://127.0.0.1:3000/";

/// Default listen address.
pub const DEFAULT_LISTEN: &str = "0.0.0.0:8080";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    /// The configuration document is malformed.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_saphyr::Error),
    /// The configuration is well-formed but inconsistent.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// The configured store is not compiled in or cannot be created.
    #[error("store not available: {0}")]
    StoreNotAvailable(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Listen address of the HTTP surface.
    pub listen: Option<SocketAddr>,
    /// Cache store.
    pub store: StoreConfig,
    /// Upstream optimization service.
    pub upstream: UpstreamConfig,
    /// Key derivation and write-back.
    pub cache: CacheConfig,
    /// Health probe topology.
    pub health: HealthConfig,
}

impl Config {
    /// Parses a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_saphyr::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml(&yaml)
    }

    /// Checks that the report groups can be told apart.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let optimizer = &self.health.optimizer.service;
        let routing = &self.health.routing.service;
        if optimizer.is_empty() || routing.is_empty() {
            return Err(ConfigError::Invalid("service names must not be empty".into()));
        }
        if optimizer == routing {
            return Err(ConfigError::Invalid(format!(
                "optimizer and routing services share the name `{optimizer}`"
            )));
        }
        if optimizer == CACHE_SERVICE || routing == CACHE_SERVICE {
            return Err(ConfigError::Invalid(format!(
                "`{CACHE_SERVICE}` is reserved for the store probe"
            )));
        }
        if self.cache.namespace.is_empty() {
            return Err(ConfigError::Invalid("cache namespace must not be empty".into()));
        }
        Ok(())
    }

    /// Listen address, falling back to [`DEFAULT_LISTEN`].
    pub fn listen_addr(&self) -> SocketAddr {
        self.listen
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 8080)))
    }
}

/// Cache store selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StoreConfig {
    /// Shared Redis store.
    Redis(RedisConfig),
    /// In-process store, not shared between proxy instances.
    Memory(MemoryConfig),
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Redis(RedisConfig::default())
    }
}

/// Redis store settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    /// Connection URL.
    pub connection_string: String,
    /// Bound of a single store command.
    #[serde(with = "humantime_serde")]
    pub operation_timeout: Duration,
    /// Label used in logs and metrics.
    pub label: Option<String>,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            connection_string: DEFAULT_REDIS_URL.to_owned(),
            operation_timeout: Duration::from_secs(2),
            label: None,
        }
    }
}

/// In-process store settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Maximum number of cached responses.
    pub max_entries: u64,
    /// Label used in logs and metrics.
    pub label: Option<String>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            label: None,
        }
    }
}

impl StoreConfig {
    /// Creates the configured store.
    ///
    /// Redis connects lazily, so this succeeds for an unreachable server.
    pub fn into_store(self) -> Result<Arc<dyn Store>, ConfigError> {
        match self {
            StoreConfig::Redis(config) => config.into_store(),
            StoreConfig::Memory(config) => config.into_store(),
        }
    }
}

impl RedisConfig {
    #[cfg(feature = "redis")]
    fn into_store(self) -> Result<Arc<dyn Store>, ConfigError> {
        use routebox_redis::RedisStore;

        let mut builder = RedisStore::builder()
            .server(self.connection_string)
            .operation_timeout(self.operation_timeout);
        if let Some(label) = self.label {
            builder = builder.label(label);
        }
        let store = builder
            .build()
            .map_err(|e| ConfigError::StoreNotAvailable(format!("Redis: {e}")))?;
        Ok(Arc::new(store))
    }

    #[cfg(not(feature = "redis"))]
    fn into_store(self) -> Result<Arc<dyn Store>, ConfigError> {
        Err(ConfigError::StoreNotAvailable("Redis".to_string()))
    }
}

impl MemoryConfig {
    #[cfg(feature = "moka")]
    fn into_store(self) -> Result<Arc<dyn Store>, ConfigError> {
        use routebox_moka::MokaStore;

        let mut builder = MokaStore::builder(self.max_entries);
        if let Some(label) = self.label {
            builder = builder.label(label);
        }
        Ok(Arc::new(builder.build()))
    }

    #[cfg(not(feature = "moka"))]
    fn into_store(self) -> Result<Arc<dyn Store>, ConfigError> {
        Err(ConfigError::StoreNotAvailable("Memory".to_string()))
    }
}

/// Upstream optimization service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// URL requests and optimizer probes are posted to.
    pub url: String,
    /// Bound of a forwarded request.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_UPSTREAM_URL.to_owned(),
            timeout: Duration::from_secs(60),
        }
    }
}

/// Key derivation and write-back settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Prefix of every cache key.
    pub namespace: String,
    /// Time to live of a cached response.
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
    /// Whether field order of a request body is significant.
    pub key_mode: KeyMode,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            namespace: routebox_core::DEFAULT_NAMESPACE.to_owned(),
            ttl: DEFAULT_TTL,
            key_mode: KeyMode::default(),
        }
    }
}

impl CacheConfig {
    /// Key deriver for these settings.
    pub fn key_deriver(&self) -> KeyDeriver {
        KeyDeriver::new(self.namespace.as_str()).mode(self.key_mode)
    }

    /// Write-back policy for these settings.
    pub fn policy(&self) -> CachePolicy {
        CachePolicy::new(self.ttl)
    }
}

/// Health probe topology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Bound of a single probe.
    #[serde(with = "humantime_serde")]
    pub probe_timeout: Duration,
    /// Points used by synthetic queries.
    pub coordinates: ProbeCoordinates,
    /// Optimizer probes, one per profile.
    pub optimizer: OptimizerProbes,
    /// Map-routing probes, one per backend.
    pub routing: RoutingProbes,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            coordinates: ProbeCoordinates::default(),
            optimizer: OptimizerProbes::default(),
            routing: RoutingProbes::default(),
        }
    }
}

/// Optimizer profiles to probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerProbes {
    /// Name of the group in the report.
    pub service: String,
    /// Vehicle profiles.
    pub profiles: Vec<String>,
}

impl Default for OptimizerProbes {
    fn default() -> Self {
        Self {
            service: "vroom".to_owned(),
            profiles: vec!["car".to_owned()],
        }
    }
}

/// Map-routing backends to probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingProbes {
    /// Name of the group in the report.
    pub service: String,
    /// One backend per profile.
    pub backends: Vec<RoutingBackend>,
}

impl Default for RoutingProbes {
    fn default() -> Self {
        Self {
            service: "osrm".to_owned(),
            backends: vec![
                RoutingBackend::new("car", "http://127.0.0.1:5000"),
                RoutingBackend::new("bike", "http://127.0.0.1:5001"),
                RoutingBackend::new("foot", "http://127.0.0.1:5002"),
            ],
        }
    }
}

/// A map-routing backend serving one profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingBackend {
    /// Routing profile, e.g. `car`.
    pub profile: String,
    /// Base URL of the backend.
    pub url: String,
}

impl RoutingBackend {
    /// Creates a backend entry.
    pub fn new(profile: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            profile: profile.into(),
            url: url.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_document_uses_defaults() {
        let config = Config::from_yaml("{}").unwrap();

        assert_eq!(config, Config::default());
        assert_eq!(config.listen_addr().to_string(), DEFAULT_LISTEN);
        assert_eq!(config.cache.ttl, Duration::from_secs(3600));
        assert_eq!(config.upstream.timeout, Duration::from_secs(60));
        assert_eq!(config.health.probe_timeout, Duration::from_secs(5));
        assert_eq!(config.health.routing.backends.len(), 3);
    }

    #[test]
    fn parses_full_document() {
        let yaml = r#"
listen: 127.0.0.1:9000
store:
  type: Memory
  max_entries: 500
upstream:
  url: http://vroom:3000/
  timeout: 30s
cache:
  namespace: vrp
  ttl: 10m
  key_mode: canonical
health:
  probe_timeout: 2s
  optimizer:
    service: vroom
    profiles: [car, truck]
  routing:
    service: osrm
    backends:
      - profile: car
        url: http://osrm-car:5000
"#;

        let config = Config::from_yaml(yaml).unwrap();

        assert_eq!(config.listen_addr().to_string(), "127.0.0.1:9000");
        assert_eq!(
            config.store,
            StoreConfig::Memory(MemoryConfig {
                max_entries: 500,
                label: None,
            })
        );
        assert_eq!(config.upstream.url, "http://vroom:3000/");
        assert_eq!(config.upstream.timeout, Duration::from_secs(30));
        assert_eq!(config.cache.policy().ttl, Duration::from_secs(600));
        assert_eq!(config.cache.key_deriver().key_mode(), KeyMode::Canonical);
        assert_eq!(config.cache.key_deriver().namespace(), "vrp");
        assert_eq!(config.health.probe_timeout, Duration::from_secs(2));
        assert_eq!(config.health.optimizer.profiles, vec!["car", "truck"]);
        assert_eq!(
            config.health.routing.backends,
            vec![RoutingBackend::new("car", "http://osrm-car:5000")]
        );
    }

    #[test]
    fn redis_store_keeps_timeout() {
        let yaml = r#"
store:
  type: Redis
  connection_string: redis://cache:6379/
  operation_timeout: 500ms
"#;

        let config = Config::from_yaml(yaml).unwrap();

        let StoreConfig::Redis(redis) = config.store else {
            panic!("expected Redis store");
        };
        assert_eq!(redis.connection_string, "redis://cache:6379/");
        assert_eq!(redis.operation_timeout, Duration::from_millis(500));
    }

    #[test]
    fn rejects_colliding_service_names() {
        let yaml = r#"
health:
  optimizer:
    service: cache
"#;
        assert!(matches!(
            Config::from_yaml(yaml),
            Err(ConfigError::Invalid(_))
        ));

        let yaml = r#"
health:
  optimizer:
    service: osrm
"#;
        assert!(matches!(
            Config::from_yaml(yaml),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn rejects_malformed_document() {
        assert!(matches!(
            Config::from_yaml("cache: [1, 2"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[cfg(feature = "moka")]
    #[test]
    fn memory_store_is_created() {
        let store = StoreConfig::Memory(MemoryConfig::default())
            .into_store()
            .unwrap();

        assert_eq!(store.label().as_str(), "moka");
    }

    #[cfg(feature = "moka")]
    #[test]
    fn configured_label_names_the_store() {
        let config = MemoryConfig {
            label: Some("local-cache".to_owned()),
            ..MemoryConfig::default()
        };
        let store = StoreConfig::Memory(config).into_store().unwrap();

        assert_eq!(store.label().as_str(), "local-cache");
    }
}
