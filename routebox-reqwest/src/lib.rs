#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

pub mod forwarder;
pub mod probe;
pub mod transport;

pub use forwarder::{DEFAULT_FORWARD_TIMEOUT, ReqwestForwarder};
pub use probe::{OptimizerProbe, RoutingProbe};
pub use transport::transport_code;
