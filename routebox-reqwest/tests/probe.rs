//! Integration tests for the HTTP health probes.

use reqwest::Client;
use routebox_core::{Probe, ProbeCoordinates};
use routebox_reqwest::{OptimizerProbe, RoutingProbe};
use serde_json::json;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn routing_probe_queries_fixed_route() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(
            "/route/v1/car/13.38886,52.517037;13.397634,52.529407",
        ))
        .and(query_param("overview", "false"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": "Ok"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let probe = RoutingProbe::new(
        Client::new(),
        "osrm",
        "car",
        &format!("{}/", mock_server.uri()),
        &ProbeCoordinates::default(),
    );
    let result = probe.probe().await;

    assert!(result.ok);
    assert_eq!(result.status, 200);
    assert_eq!(result.service, "osrm");
    assert_eq!(result.profile.as_deref(), Some("car"));
    assert!(result.url.starts_with(&mock_server.uri()));
}

#[tokio::test]
async fn routing_probe_reports_error_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let probe = RoutingProbe::new(
        Client::new(),
        "osrm",
        "bike",
        &mock_server.uri(),
        &ProbeCoordinates::default(),
    );
    let result = probe.probe().await;

    assert!(!result.ok);
    assert_eq!(result.status, 503);
}

#[tokio::test]
async fn routing_probe_reports_unreachable_backend_as_status_zero() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let probe = RoutingProbe::new(
        Client::new(),
        "osrm",
        "foot",
        &format!("http://{addr}"),
        &ProbeCoordinates::default(),
    );
    let result = probe.probe().await;

    assert!(!result.ok);
    assert_eq!(result.status, 0);
    assert!(!result.message.is_empty());
}

#[tokio::test]
async fn optimizer_probe_posts_minimal_problem() {
    let mock_server = MockServer::start().await;
    let coordinates = ProbeCoordinates::default();
    let expected = json!({
        "vehicles": [{"id": 1, "profile": "car", "start": coordinates.from, "end": coordinates.from}],
        "jobs": [{"id": 1, "location": coordinates.to}],
    });

    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_json(&expected))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": 0})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let probe = OptimizerProbe::new(
        Client::new(),
        "vroom",
        "car",
        format!("{}/", mock_server.uri()),
        &coordinates,
    );
    let result = probe.probe().await;

    assert!(result.ok);
    assert_eq!(probe.problem(), &expected);
    assert_eq!(probe.target().profile.as_deref(), Some("car"));
}

#[tokio::test]
async fn optimizer_probe_fails_on_server_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"code": 3})))
        .mount(&mock_server)
        .await;

    let probe = OptimizerProbe::new(
        Client::new(),
        "vroom",
        "car",
        mock_server.uri(),
        &ProbeCoordinates::default(),
    );
    let result = probe.probe().await;

    assert!(!result.ok);
    assert_eq!(result.status, 500);
    assert!(result.message.starts_with("server error"));
}
