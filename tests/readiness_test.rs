//! Readiness gate against a mocked extraction backend.

use std::sync::Arc;
use std::time::Duration;

use huginn::extraction::Extractor;
use huginn::{Readiness, ReadinessGate, TensorClient};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const READY_PATH: &str = "/v2/models/docling_granite_python/ready";

fn gate(server: &MockServer) -> ReadinessGate {
    let client = TensorClient::builder(server.uri())
        .ready_timeout(Duration::from_millis(200))
        .build()
        .unwrap();
    ReadinessGate::new(Extractor::new(Arc::new(client), "docling_granite_python"))
}

#[tokio::test]
async fn disabled_extraction_is_vacuously_ready() {
    let gate = ReadinessGate::new(Extractor::disabled());
    assert_eq!(gate.check_ready().await, Readiness::Ready);
}

#[tokio::test]
async fn ready_model_is_ready() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(READY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ready": true})))
        .expect(1)
        .mount(&server)
        .await;

    assert!(gate(&server).check_ready().await.is_ready());
}

#[tokio::test]
async fn unready_model_names_the_model() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(READY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ready": false})))
        .mount(&server)
        .await;

    match gate(&server).check_ready().await {
        Readiness::NotReady(reason) => assert!(reason.contains("docling_granite_python")),
        Readiness::Ready => panic!("expected NotReady"),
    }
}

#[tokio::test]
async fn probe_failure_is_not_ready() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(READY_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string("model loading"))
        .mount(&server)
        .await;

    let readiness = gate(&server).check_ready().await;
    assert!(!readiness.is_ready());
    assert!(readiness.to_string().contains("model loading"));
}

#[tokio::test]
async fn slow_probe_is_not_ready() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(READY_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"ready": true}))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    assert!(!gate(&server).check_ready().await.is_ready());
}
