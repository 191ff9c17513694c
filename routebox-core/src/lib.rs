#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

pub mod forward;
pub mod health;
pub mod key;
pub mod label;
pub mod response;
pub mod store;

pub use forward::{Forward, ForwardOutcome, TransportFailureCode};
pub use health::{
    HealthProbeResult, HealthReport, Probe, ProbeCoordinates, ProbeTarget, ServiceHealth,
};
pub use key::{CacheKey, DEFAULT_NAMESPACE, KeyDeriver, KeyError, KeyMode};
pub use label::StoreLabel;
pub use response::{CACHE_STATUS_HEADER, CacheStatus, ProxyResponse};
pub use store::{CacheEntry, LIVENESS_TOKEN, Lookup, Store, StoreError, StoreResult};

/// Raw byte data type used for cached and forwarded bodies.
/// Using `Bytes` provides efficient zero-copy cloning via reference counting.
pub type Raw = bytes::Bytes;
