#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

pub mod config;
pub mod handler;
pub mod health;
pub mod metrics;
pub mod policy;

pub use config::{Config, ConfigError, StoreConfig};
pub use handler::CacheAside;
pub use health::{
    DEFAULT_PROBE_TIMEOUT, HealthAggregator, HealthAggregatorBuilder, ProbeGroup, StoreProbe,
};
pub use policy::{CachePolicy, DEFAULT_TTL};

pub use routebox_core::{
    CACHE_STATUS_HEADER, CacheStatus, Forward, ForwardOutcome, HealthReport, KeyDeriver, KeyMode,
    ProxyResponse, Store,
};
