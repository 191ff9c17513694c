#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

pub mod cli;

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use http::StatusCode;
use http::header::{CONTENT_TYPE, HeaderValue};
use reqwest::Client;
use routebox::{CacheAside, Config, ConfigError, HealthAggregator, ProbeGroup};
use routebox_core::{CACHE_STATUS_HEADER, Forward, ProxyResponse, Store};
use routebox_reqwest::{OptimizerProbe, ReqwestForwarder, RoutingProbe};
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Largest accepted optimization request.
pub const MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

/// Handler shared by every request.
pub type Handler = CacheAside<dyn Store, dyn Forward>;

/// Shared state of the router.
#[derive(Clone)]
pub struct AppState {
    handler: Arc<Handler>,
    health: Arc<HealthAggregator>,
}

impl AppState {
    /// Creates state from already assembled parts.
    pub fn new(handler: Handler, health: HealthAggregator) -> Self {
        Self {
            handler: Arc::new(handler),
            health: Arc::new(health),
        }
    }

    /// Assembles the store, forwarder and probes described by `config`.
    ///
    /// Forwarder and probes share `client`.
    pub fn from_config(config: &Config, client: Client) -> Result<Self, ConfigError> {
        let store = config.store.clone().into_store()?;
        Ok(Self::with_store(config, client, store))
    }

    /// Same as [`AppState::from_config`] with an explicit store.
    pub fn with_store(config: &Config, client: Client, store: Arc<dyn Store>) -> Self {
        let forwarder: Arc<dyn Forward> = Arc::new(
            ReqwestForwarder::with_client(client.clone(), config.upstream.url.clone())
                .timeout(config.upstream.timeout),
        );
        let handler = CacheAside::new(Arc::clone(&store), forwarder)
            .keys(config.cache.key_deriver())
            .policy(config.cache.policy());

        let health = &config.health;
        let optimizer = health.optimizer.profiles.iter().fold(
            ProbeGroup::new(health.optimizer.service.as_str()),
            |group, profile| {
                group.probe(OptimizerProbe::new(
                    client.clone(),
                    health.optimizer.service.as_str(),
                    profile.as_str(),
                    config.upstream.url.as_str(),
                    &health.coordinates,
                ))
            },
        );
        let routing = health.routing.backends.iter().fold(
            ProbeGroup::new(health.routing.service.as_str()),
            |group, backend| {
                group.probe(RoutingProbe::new(
                    client.clone(),
                    health.routing.service.as_str(),
                    backend.profile.as_str(),
                    &backend.url,
                    &health.coordinates,
                ))
            },
        );
        let aggregator = HealthAggregator::builder()
            .store(store)
            .optimizer(optimizer)
            .routing(routing)
            .timeout(health.probe_timeout)
            .build();

        Self::new(handler, aggregator)
    }

    /// The cache-aside handler.
    pub fn handler(&self) -> &Handler {
        &self.handler
    }

    /// The health aggregator.
    pub fn health(&self) -> &HealthAggregator {
        &self.health
    }
}

/// Builds the HTTP router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", post(optimize))
        .route("/optimize", post(optimize))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn optimize(State(state): State<AppState>, Json(body): Json<Value>) -> Response {
    into_http(state.handler.handle(&body).await)
}

async fn health(State(state): State<AppState>) -> Response {
    let report = state.health.check_all().await;
    let status = if report.ok() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report)).into_response()
}

fn into_http(response: ProxyResponse) -> Response {
    (
        response.status,
        [
            (CONTENT_TYPE, HeaderValue::from_static("application/json")),
            (CACHE_STATUS_HEADER, response.cache_status.header_value()),
        ],
        response.body,
    )
        .into_response()
}
