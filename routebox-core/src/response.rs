//! Client-facing responses and cache disposition.

use bytes::Bytes;
use http::{HeaderName, HeaderValue, StatusCode};
use serde_json::json;

use crate::Raw;

/// Response header carrying the cache disposition (`HIT` / `MISS`).
pub const CACHE_STATUS_HEADER: HeaderName = HeaderName::from_static("x-cache");

/// Whether the response was served from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheStatus {
    /// Served from the cache store.
    Hit,
    /// Forwarded upstream.
    #[default]
    Miss,
}

impl CacheStatus {
    /// Returns the status as it appears in the response header.
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }

    /// Returns the status as a header value.
    pub const fn header_value(&self) -> HeaderValue {
        HeaderValue::from_static(self.as_str())
    }
}

/// An HTTP-shaped response produced by the cache-aside handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyResponse {
    /// Status code returned to the client.
    pub status: StatusCode,
    /// JSON body returned to the client.
    pub body: Raw,
    /// Cache disposition of this response.
    pub cache_status: CacheStatus,
}

impl ProxyResponse {
    /// A cached body served with status 200.
    pub fn hit(body: Raw) -> Self {
        Self {
            status: StatusCode::OK,
            body,
            cache_status: CacheStatus::Hit,
        }
    }

    /// A forwarded response.
    pub fn miss(status: StatusCode, body: Raw) -> Self {
        Self {
            status,
            body,
            cache_status: CacheStatus::Miss,
        }
    }

    /// 502 response for an unreachable upstream.
    pub fn bad_gateway(code: &str) -> Self {
        let body = json!({
            "error": "Upstream optimization service unavailable",
            "code": code,
        });
        Self::miss(StatusCode::BAD_GATEWAY, Bytes::from(body.to_string()))
    }

    /// 500 response that carries no internal details.
    pub fn internal_error() -> Self {
        let body = json!({ "error": "Internal server error" });
        Self::miss(StatusCode::INTERNAL_SERVER_ERROR, Bytes::from(body.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn bad_gateway_carries_failure_code() {
        let response = ProxyResponse::bad_gateway("ECONNREFUSED");
        let body: Value = serde_json::from_slice(&response.body).unwrap();

        assert_eq!(response.status, StatusCode::BAD_GATEWAY);
        assert_eq!(response.cache_status, CacheStatus::Miss);
        assert_eq!(body["code"], "ECONNREFUSED");
    }

    #[test]
    fn internal_error_is_generic() {
        let response = ProxyResponse::internal_error();
        let body: Value = serde_json::from_slice(&response.body).unwrap();

        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, serde_json::json!({"error": "Internal server error"}));
    }
}
