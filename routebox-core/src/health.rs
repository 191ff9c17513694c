//! Health probe contract and report types.
//!
//! Every [`Probe`] resolves to a [`HealthProbeResult`], never to an error: an
//! unreachable dependency is reported as `status = 0, ok = false`.

use std::time::Duration;

use async_trait::async_trait;
use http::StatusCode;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

/// What a probe checks: service name, optional profile and URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProbeTarget {
    /// Service name, e.g. `vroom` or `osrm`.
    pub service: String,
    /// Profile or variant of the service, e.g. `car`.
    pub profile: Option<String>,
    /// URL the probe talks to.
    pub url: String,
}

impl ProbeTarget {
    /// Creates a target without a profile.
    pub fn new(service: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            profile: None,
            url: url.into(),
        }
    }

    /// Sets the profile label.
    #[must_use]
    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }
}

/// Fixed `[longitude, latitude]` pair used by synthetic routing queries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProbeCoordinates {
    /// Start point.
    pub from: [f64; 2],
    /// End point.
    pub to: [f64; 2],
}

impl Default for ProbeCoordinates {
    fn default() -> Self {
        // Two points in central Berlin, covered by the OSRM demo extracts.
        Self {
            from: [13.388860, 52.517037],
            to: [13.397634, 52.529407],
        }
    }
}

impl ProbeCoordinates {
    /// Formats the pair as an OSRM coordinate list: `lon,lat;lon,lat`.
    pub fn to_osrm_path(&self) -> String {
        format!(
            "{},{};{},{}",
            self.from[0], self.from[1], self.to[0], self.to[1]
        )
    }
}

/// Result of a single probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthProbeResult {
    /// Service name.
    pub service: String,
    /// Profile label, if the service has several.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    /// Probed URL.
    pub url: String,
    /// Response status, `0` when nothing was received.
    pub status: u16,
    /// Whether the dependency is considered healthy.
    pub ok: bool,
    /// Human readable summary.
    pub message: String,
}

impl HealthProbeResult {
    /// Creates a result for `target`.
    pub fn new(target: &ProbeTarget, status: u16, ok: bool, message: impl Into<String>) -> Self {
        Self {
            service: target.service.clone(),
            profile: target.profile.clone(),
            url: target.url.clone(),
            status,
            ok,
            message: message.into(),
        }
    }

    /// Result for a received HTTP status: anything below 400 is healthy.
    pub fn from_status(target: &ProbeTarget, status: StatusCode) -> Self {
        let code = status.as_u16();
        let reason = status.canonical_reason().unwrap_or("Unknown");
        let message = if status.is_server_error() {
            format!("server error: {code} {reason}")
        } else if status.is_client_error() {
            format!("client error: {code} {reason}")
        } else {
            format!("reachable: {code} {reason}")
        };
        Self::new(target, code, code < 400, message)
    }

    /// Result for a dependency that never answered.
    pub fn unreachable(target: &ProbeTarget, code: &str, detail: impl std::fmt::Display) -> Self {
        Self::new(target, 0, false, format!("{code}: {detail}"))
    }

    /// Result for a probe that exceeded its time bound.
    pub fn timed_out(target: &ProbeTarget, timeout: Duration) -> Self {
        Self::new(
            target,
            0,
            false,
            format!("ETIMEDOUT: no answer within {}ms", timeout.as_millis()),
        )
    }
}

/// A synthetic request assessing one dependency.
#[async_trait]
pub trait Probe: Send + Sync {
    /// What this probe checks.
    fn target(&self) -> &ProbeTarget;

    /// Runs the probe. Failures are captured in the returned result.
    async fn probe(&self) -> HealthProbeResult;
}

/// Probe results of one named service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceHealth {
    /// Service name, used as the key in the report.
    pub name: String,
    /// One result per profile.
    pub probes: Vec<HealthProbeResult>,
}

impl ServiceHealth {
    /// Creates a service entry.
    pub fn new(name: impl Into<String>, probes: Vec<HealthProbeResult>) -> Self {
        Self {
            name: name.into(),
            probes,
        }
    }

    /// `true` when every probe of the service is ok.
    pub fn ok(&self) -> bool {
        self.probes.iter().all(|probe| probe.ok)
    }
}

/// Composite health of the proxy and everything behind it.
///
/// Serializes as:
///
/// ```json
/// { "ok": false, "services": { "vroom": [..], "cache": {..}, "osrm": [..] } }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthReport {
    ok: bool,
    optimizer: ServiceHealth,
    cache: HealthProbeResult,
    routing: ServiceHealth,
}

impl HealthReport {
    /// Builds a report; `ok` is the AND over every probe.
    pub fn new(optimizer: ServiceHealth, cache: HealthProbeResult, routing: ServiceHealth) -> Self {
        let ok = optimizer.ok() && cache.ok && routing.ok();
        Self {
            ok,
            optimizer,
            cache,
            routing,
        }
    }

    /// Aggregate health.
    pub fn ok(&self) -> bool {
        self.ok
    }

    /// Optimizer profile results.
    pub fn optimizer(&self) -> &ServiceHealth {
        &self.optimizer
    }

    /// Cache store result.
    pub fn cache(&self) -> &HealthProbeResult {
        &self.cache
    }

    /// Routing backend results.
    pub fn routing(&self) -> &ServiceHealth {
        &self.routing
    }

    /// Iterates over every probe result in report order.
    pub fn probes(&self) -> impl Iterator<Item = &HealthProbeResult> {
        self.optimizer
            .probes
            .iter()
            .chain(std::iter::once(&self.cache))
            .chain(self.routing.probes.iter())
    }
}

struct Services<'a>(&'a HealthReport);

impl Serialize for Services<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let report = self.0;
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry(&report.optimizer.name, &report.optimizer.probes)?;
        map.serialize_entry("cache", &report.cache)?;
        map.serialize_entry(&report.routing.name, &report.routing.probes)?;
        map.end()
    }
}

impl Serialize for HealthReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("ok", &self.ok)?;
        map.serialize_entry("services", &Services(self))?;
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn target() -> ProbeTarget {
        ProbeTarget::new("osrm", "http://osrm:5000").profile("car")
    }

    #[test]
    fn status_below_400_is_healthy() {
        assert!(HealthProbeResult::from_status(&target(), StatusCode::OK).ok);
        assert!(HealthProbeResult::from_status(&target(), StatusCode::NOT_MODIFIED).ok);
        assert!(!HealthProbeResult::from_status(&target(), StatusCode::BAD_REQUEST).ok);

        let server_error = HealthProbeResult::from_status(&target(), StatusCode::BAD_GATEWAY);
        assert_eq!(server_error.status, 502);
        assert!(!server_error.ok);
        assert!(server_error.message.starts_with("server error"));
    }

    #[test]
    fn coordinates_format_as_osrm_path() {
        assert_eq!(
            ProbeCoordinates::default().to_osrm_path(),
            "13.38886,52.517037;13.397634,52.529407"
        );
    }

    #[test]
    fn report_is_and_of_all_probes() {
        let healthy = HealthProbeResult::from_status(&target(), StatusCode::OK);
        let cache = HealthProbeResult::new(&ProbeTarget::new("cache", "redis"), 0, true, "PONG");
        let down = HealthProbeResult::unreachable(&target(), "ECONNREFUSED", "connection refused");

        let ok = HealthReport::new(
            ServiceHealth::new("vroom", vec![healthy.clone()]),
            cache.clone(),
            ServiceHealth::new("osrm", vec![healthy.clone()]),
        );
        let degraded = HealthReport::new(
            ServiceHealth::new("vroom", vec![healthy.clone()]),
            cache,
            ServiceHealth::new("osrm", vec![healthy, down]),
        );

        assert!(ok.ok());
        assert!(!degraded.ok());
        assert_eq!(degraded.probes().count(), 4);
    }

    #[test]
    fn report_serializes_grouped_services() {
        let optimizer_target = ProbeTarget::new("vroom", "http://vroom:3000").profile("car");
        let cache_target = ProbeTarget::new("cache", "redis://cache:6379");
        let report = HealthReport::new(
            ServiceHealth::new(
                "vroom",
                vec![HealthProbeResult::from_status(&optimizer_target, StatusCode::OK)],
            ),
            HealthProbeResult::new(&cache_target, 0, true, "PONG"),
            ServiceHealth::new("osrm", vec![]),
        );

        let value = serde_json::to_value(&report).unwrap();

        assert_eq!(
            value,
            json!({
                "ok": true,
                "services": {
                    "vroom": [{
                        "service": "vroom",
                        "profile": "car",
                        "url": "http://vroom:3000",
                        "status": 200,
                        "ok": true,
                        "message": "reachable: 200 OK",
                    }],
                    "cache": {
                        "service": "cache",
                        "url": "redis://cache:6379",
                        "status": 0,
                        "ok": true,
                        "message": "PONG",
                    },
                    "osrm": [],
                }
            })
        );
    }
}
