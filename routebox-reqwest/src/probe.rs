//! HTTP health probes for the optimizer and the map-routing backends.
//!
//! Both probes share the same rule: a response with status below 400 is
//! healthy, any other status is reported as is, and a request that never got
//! an answer is reported with status 0.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use routebox_core::{
    HealthProbeResult, Probe, ProbeCoordinates, ProbeTarget, TransportFailureCode,
};
use serde_json::{Value, json};
use tracing::debug;

use crate::transport::transport_code;

async fn run(target: &ProbeTarget, request: RequestBuilder) -> HealthProbeResult {
    let result = match request.send().await {
        Ok(response) => HealthProbeResult::from_status(target, response.status()),
        Err(failure) => {
            let code = transport_code(&failure).unwrap_or(TransportFailureCode::Other);
            HealthProbeResult::unreachable(target, code.as_str(), failure)
        }
    };
    debug!(
        service = %target.service,
        profile = ?target.profile,
        status = result.status,
        ok = result.ok,
        "probe finished"
    );
    result
}

/// Synthetic route query against one map-routing backend variant.
///
/// Issues `GET {base}/route/v1/{profile}/{lon,lat;lon,lat}?overview=false`.
#[derive(Debug, Clone)]
pub struct RoutingProbe {
    client: Client,
    target: ProbeTarget,
}

impl RoutingProbe {
    /// Creates a probe for the `profile` backend served at `base_url`.
    pub fn new(
        client: Client,
        service: impl Into<String>,
        profile: impl Into<String>,
        base_url: &str,
        coordinates: &ProbeCoordinates,
    ) -> Self {
        let profile = profile.into();
        let url = format!(
            "{}/route/v1/{}/{}?overview=false",
            base_url.trim_end_matches('/'),
            profile,
            coordinates.to_osrm_path()
        );
        Self {
            client,
            target: ProbeTarget::new(service, url).profile(profile),
        }
    }
}

#[async_trait]
impl Probe for RoutingProbe {
    fn target(&self) -> &ProbeTarget {
        &self.target
    }

    async fn probe(&self) -> HealthProbeResult {
        run(&self.target, self.client.get(&self.target.url)).await
    }
}

/// Minimal optimization problem posted to the optimizer for one profile.
///
/// Uses the same upstream URL as live traffic.
#[derive(Debug, Clone)]
pub struct OptimizerProbe {
    client: Client,
    target: ProbeTarget,
    problem: Value,
}

impl OptimizerProbe {
    /// Creates a probe for `profile` on the optimizer at `url`.
    pub fn new(
        client: Client,
        service: impl Into<String>,
        profile: impl Into<String>,
        url: impl Into<String>,
        coordinates: &ProbeCoordinates,
    ) -> Self {
        let profile = profile.into();
        let problem = json!({
            "vehicles": [{
                "id": 1,
                "profile": profile,
                "start": coordinates.from,
                "end": coordinates.from,
            }],
            "jobs": [{
                "id": 1,
                "location": coordinates.to,
            }],
        });
        Self {
            client,
            target: ProbeTarget::new(service, url).profile(profile),
            problem,
        }
    }

    /// The request body this probe sends.
    pub fn problem(&self) -> &Value {
        &self.problem
    }
}

#[async_trait]
impl Probe for OptimizerProbe {
    fn target(&self) -> &ProbeTarget {
        &self.target
    }

    async fn probe(&self) -> HealthProbeResult {
        run(
            &self.target,
            self.client.post(&self.target.url).json(&self.problem),
        )
        .await
    }
}
