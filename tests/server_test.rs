//! HTTP surface tests, driving the router with `tower::ServiceExt::oneshot`.
#![cfg(feature = "server")]

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use huginn::server::router;
use huginn::{Huginn, InferResponse, InferenceBackend, Result, TensorDescriptor, WhitespaceTokenizer};

const LABELS: usize = 9;
const TEXT: &str = "Port Tromsø FLAG: Norway";
// [CLS] port tromsø flag: norway [SEP]
const HOT: [usize; 6] = [0, 0, 3, 0, 6, 0];

struct FixedBackend {
    ready: bool,
}

#[async_trait]
impl InferenceBackend for FixedBackend {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn infer(&self, model: &str, inputs: &[TensorDescriptor]) -> Result<InferResponse> {
        let seq = inputs[0].shape()[1];
        let mut data = vec![0.0; seq * LABELS];
        for i in 0..seq {
            data[i * LABELS + HOT.get(i).copied().unwrap_or(0)] = 6.0;
        }
        Ok(InferResponse {
            model_name: model.to_string(),
            model_version: "1".to_string(),
            outputs: vec![TensorDescriptor::fp32("logits", vec![1, seq, LABELS], data)?],
        })
    }

    async fn ready(&self, _model: &str) -> Result<bool> {
        Ok(self.ready)
    }
}

fn app() -> Router {
    let gateway = Huginn::builder()
        .backend(Arc::new(FixedBackend { ready: true }))
        .tokenizer(Arc::new(WhitespaceTokenizer))
        .build()
        .unwrap();
    router(gateway)
}

fn app_with_unready_extraction() -> Router {
    let gateway = Huginn::builder()
        .backend(Arc::new(FixedBackend { ready: false }))
        .tokenizer(Arc::new(WhitespaceTokenizer))
        .extraction("docling_granite_python")
        .build()
        .unwrap();
    router(gateway)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, headers, body)
}

// ============================================================================
// /health and /setup
// ============================================================================

#[tokio::test]
async fn health_ok_is_not_cached() {
    let (status, headers, body) = send(app(), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"ok": true}));
    assert_eq!(headers[header::CACHE_CONTROL], "no-store");
}

#[tokio::test]
async fn health_unready_is_503() {
    let (status, headers, body) = send(app_with_unready_extraction(), get("/health")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "backend_unavailable");
    assert_eq!(headers[header::CACHE_CONTROL], "no-store");
}

#[tokio::test]
async fn setup_lists_labels() {
    let (status, _, body) = send(app(), get("/setup")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["model_name"], "ner-distilbert");
    assert_eq!(body["status"], "ready");
    assert_eq!(body["labels"].as_array().unwrap().len(), 9);
}

// ============================================================================
// /predict
// ============================================================================

#[tokio::test]
async fn predict_returns_entities() {
    let (status, _, body) = send(app(), post_json("/predict", json!({"text": TEXT}))).await;
    assert_eq!(status, StatusCode::OK);
    let entities = body["entities"].as_array().unwrap();
    assert_eq!(entities.len(), 2);
    assert_eq!(entities[0]["label"], "PORT");
    assert_eq!(entities[0]["text"], "Tromsø");
    // byte offsets on the direct endpoint
    assert_eq!(entities[0]["start_offset"], 5);
    assert_eq!(entities[0]["end_offset"], 12);
    assert_eq!(entities[1]["label"], "FLAG");
    assert!(body["run_id"].as_str().unwrap().starts_with("huginn-"));
}

#[tokio::test]
async fn predict_raw_task_returns_outputs() {
    let (status, _, body) = send(
        app(),
        post_json("/predict", json!({"text": "Oslo", "task": "logits"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outputs"][0]["name"], "logits");
    assert_eq!(body["outputs"][0]["datatype"], "FP32");
}

#[tokio::test]
async fn malformed_json_is_400() {
    let request = Request::builder()
        .method("POST")
        .uri("/predict")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, headers, body) = send(app(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_input");
    assert_eq!(headers[header::CACHE_CONTROL], "no-store");
}

#[tokio::test]
async fn missing_text_is_400() {
    let (status, _, body) = send(app(), post_json("/predict", json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_input");
}

#[tokio::test]
async fn document_without_extraction_is_501() {
    let (status, _, body) = send(
        app(),
        post_json("/predict", json!({"pdf_base64": STANDARD.encode(b"%PDF")})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
    assert_eq!(body["error"]["code"], "backend_disabled");
}

// ============================================================================
// /predict_ls
// ============================================================================

#[tokio::test]
async fn predict_ls_uses_character_indices() {
    let (status, _, body) = send(
        app(),
        post_json("/predict_ls", json!({"tasks": [{"id": 1, "data": {"text": TEXT}}]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["model"], "bert-base-uncased");

    let regions = results[0]["result"].as_array().unwrap();
    assert_eq!(regions.len(), 2);
    assert_eq!(regions[0]["value"]["text"], "Tromsø");
    assert_eq!(regions[0]["value"]["start"], 5);
    assert_eq!(regions[0]["value"]["end"], 11);
    assert_eq!(regions[0]["value"]["labels"], json!(["PORT"]));
    assert_eq!(regions[0]["from_name"], "label");
    assert_eq!(regions[0]["to_name"], "text");
    assert_eq!(regions[0]["type"], "labels");
    // byte offset 19, char index 18
    assert_eq!(regions[1]["value"]["start"], 18);
    assert_eq!(regions[1]["value"]["text"], "Norway");
}

#[tokio::test]
async fn predict_ls_answers_failed_tasks_with_empty_predictions() {
    let (status, _, body) = send(
        app(),
        post_json(
            "/predict_ls",
            json!({"tasks": [{"data": {"text": TEXT}}, {"data": {}}]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["result"].as_array().unwrap().len(), 2);
    assert!(results[1]["result"].as_array().unwrap().is_empty());
    assert_eq!(results[1]["score"], 0.0);
}

#[tokio::test]
async fn predict_ls_with_every_task_failing_is_an_error() {
    let (status, _, body) = send(
        app(),
        post_json("/predict_ls", json!({"tasks": [{"data": {}}]})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_input");
}

#[tokio::test]
async fn predict_ls_without_tasks_is_400() {
    let (status, _, _) = send(app(), post_json("/predict_ls", json!({"tasks": []}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ============================================================================
// /train
// ============================================================================

#[tokio::test]
async fn train_queues_request() {
    let (status, _, body) = send(
        app(),
        post_json("/train", json!({"annotations": [{"id": 1}]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "queued");
    assert_eq!(body["async"], true);
    assert!(body["request_id"].as_str().unwrap().starts_with("trn-"));
}

#[tokio::test]
async fn train_tolerates_unparseable_body() {
    let request = Request::builder()
        .method("POST")
        .uri("/train")
        .body(Body::from("annotations=1"))
        .unwrap();
    let (status, _, body) = send(app(), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Training request accepted");
}
