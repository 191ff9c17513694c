//! Upstream forwarding contract and outcome taxonomy.
//!
//! A [`Forward`] implementation sends a request body to the optimization
//! service and classifies what happened into exactly one [`ForwardOutcome`]:
//!
//! | Outcome | Meaning | Client sees |
//! |---------|---------|-------------|
//! | `Success` | upstream answered 200 | same status and body |
//! | `UpstreamError` | upstream answered any other status | same status and body |
//! | `TransportFailure` | upstream never answered | 502 with failure code |
//! | `UnexpectedFailure` | anything else | 500 generic body |
//!
//! Only `Success` is ever written to the cache.

use std::fmt;

use async_trait::async_trait;
use http::StatusCode;
use serde_json::Value;

use crate::{Raw, response::ProxyResponse};

/// Machine-readable reason why the upstream never responded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportFailureCode {
    /// Connection actively refused.
    ConnectionRefused,
    /// Connect or response wait exceeded its bound.
    TimedOut,
    /// Host name could not be resolved.
    NotFound,
    /// Connection reset or dropped mid-exchange.
    ConnectionReset,
    /// Any other transport level failure.
    Other,
}

impl TransportFailureCode {
    /// Returns the code exposed to clients.
    pub const fn as_str(&self) -> &'static str {
        match self {
            TransportFailureCode::ConnectionRefused => "ECONNREFUSED",
            TransportFailureCode::TimedOut => "ETIMEDOUT",
            TransportFailureCode::NotFound => "ENOTFOUND",
            TransportFailureCode::ConnectionReset => "ECONNRESET",
            TransportFailureCode::Other => "EUPSTREAM",
        }
    }
}

impl fmt::Display for TransportFailureCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a single forward attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardOutcome {
    /// Upstream answered with status 200.
    Success {
        /// Upstream status.
        status: StatusCode,
        /// Upstream body, verbatim.
        body: Raw,
    },
    /// Upstream answered with a non-200 status.
    UpstreamError {
        /// Upstream status.
        status: StatusCode,
        /// Upstream body, verbatim.
        body: Raw,
    },
    /// Upstream never answered.
    TransportFailure(TransportFailureCode),
    /// Any other failure during the call.
    UnexpectedFailure(String),
}

impl ForwardOutcome {
    /// Classifies a received upstream response.
    pub fn from_response(status: StatusCode, body: Raw) -> Self {
        if status == StatusCode::OK {
            ForwardOutcome::Success { status, body }
        } else {
            ForwardOutcome::UpstreamError { status, body }
        }
    }

    /// Only a `Success` with status exactly 200 may be cached.
    pub fn is_cacheable(&self) -> bool {
        matches!(self, ForwardOutcome::Success { status, .. } if *status == StatusCode::OK)
    }

    /// Short label used in logs and metrics.
    pub const fn as_str(&self) -> &'static str {
        match self {
            ForwardOutcome::Success { .. } => "success",
            ForwardOutcome::UpstreamError { .. } => "upstream_error",
            ForwardOutcome::TransportFailure(_) => "transport_failure",
            ForwardOutcome::UnexpectedFailure(_) => "unexpected_failure",
        }
    }

    /// Maps the outcome to the response returned to the client.
    pub fn into_response(self) -> ProxyResponse {
        match self {
            ForwardOutcome::Success { status, body }
            | ForwardOutcome::UpstreamError { status, body } => ProxyResponse::miss(status, body),
            ForwardOutcome::TransportFailure(code) => ProxyResponse::bad_gateway(code.as_str()),
            ForwardOutcome::UnexpectedFailure(_) => ProxyResponse::internal_error(),
        }
    }
}

/// Sends request bodies to the upstream optimization service.
///
/// Implementations never fail: every attempt resolves to a [`ForwardOutcome`].
#[async_trait]
pub trait Forward: Send + Sync {
    /// Forwards `body` and classifies the result.
    async fn forward(&self, body: &Value) -> ForwardOutcome;

    /// Upstream URL requests are sent to.
    fn target(&self) -> &str;
}
