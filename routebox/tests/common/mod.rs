//! Store, forwarder and probe fakes shared by the integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::StatusCode;
use routebox_core::{
    CacheEntry, CacheKey, Forward, ForwardOutcome, HealthProbeResult, Probe, ProbeTarget, Raw,
    Store, StoreError, StoreLabel, StoreResult,
};
use serde_json::Value;

fn refused() -> StoreError {
    StoreError::ConnectionError(Box::new(std::io::Error::from(
        std::io::ErrorKind::ConnectionRefused,
    )))
}

/// Store that is never reachable.
#[derive(Clone, Default)]
pub struct FailingStore {
    writes: Arc<AtomicUsize>,
}

impl FailingStore {
    /// Number of attempted writes.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Store for FailingStore {
    async fn get(&self, _key: &CacheKey) -> StoreResult<Option<Raw>> {
        Err(refused())
    }

    async fn set(&self, _entry: CacheEntry) -> StoreResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        Err(refused())
    }

    async fn ping(&self) -> StoreResult<String> {
        Err(refused())
    }

    fn label(&self) -> StoreLabel {
        StoreLabel::new_static("failing")
    }
}

/// Forwarder answering every request with the same outcome.
#[derive(Clone)]
pub struct StubForwarder {
    outcome: ForwardOutcome,
    calls: Arc<AtomicUsize>,
}

impl StubForwarder {
    pub fn new(outcome: ForwardOutcome) -> Self {
        Self {
            outcome,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn responding(status: StatusCode, body: &'static str) -> Self {
        Self::new(ForwardOutcome::from_response(
            status,
            Bytes::from_static(body.as_bytes()),
        ))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Forward for StubForwarder {
    async fn forward(&self, _body: &Value) -> ForwardOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }

    fn target(&self) -> &str {
        "stub://upstream"
    }
}

/// Probe returning a fixed result after an optional delay.
pub struct FixedProbe {
    target: ProbeTarget,
    ok: bool,
    delay: Duration,
}

impl FixedProbe {
    pub fn healthy(service: &str, profile: &str) -> Self {
        Self::new(service, profile, true, Duration::ZERO)
    }

    pub fn failing(service: &str, profile: &str) -> Self {
        Self::new(service, profile, false, Duration::ZERO)
    }

    pub fn slow(service: &str, profile: &str, delay: Duration) -> Self {
        Self::new(service, profile, true, delay)
    }

    fn new(service: &str, profile: &str, ok: bool, delay: Duration) -> Self {
        Self {
            target: ProbeTarget::new(service, format!("http://{service}/{profile}"))
                .profile(profile),
            ok,
            delay,
        }
    }
}

#[async_trait]
impl Probe for FixedProbe {
    fn target(&self) -> &ProbeTarget {
        &self.target
    }

    async fn probe(&self) -> HealthProbeResult {
        tokio::time::sleep(self.delay).await;
        let status = if self.ok {
            StatusCode::OK
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        };
        HealthProbeResult::from_status(&self.target, status)
    }
}
