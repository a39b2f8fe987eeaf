//! HTTP routes of the annotation-tool backend.
//!
//! | Route          | Method | Gateway operation                 |
//! |----------------|--------|-----------------------------------|
//! | `/health`      | GET    | [`NerGateway::health`]            |
//! | `/setup`       | GET    | [`NerGateway::setup`]             |
//! | `/predict`     | POST   | [`NerGateway::predict`]           |
//! | `/predict_ls`  | POST   | [`NerGateway::predict_batch`]     |
//! | `/train`       | POST   | [`NerGateway::train`]             |

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde_json::{Value, json};
use tracing::warn;

use super::convert::{LabelStudioPrediction, LabelStudioResponse};
use super::error::{ApiError, no_store};
use crate::gateway::{NerGateway, PredictOutcome, PredictRequest, SetupInfo, TrainReceipt};
use crate::readiness::Readiness;

/// Build the service router around a gateway.
pub fn router(gateway: NerGateway) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/setup", get(setup))
        .route("/predict", post(predict))
        .route("/predict_ls", post(predict_ls))
        .route("/train", post(train))
        .with_state(gateway)
}

async fn health(State(gateway): State<NerGateway>) -> Result<Response, ApiError> {
    match gateway.health().await {
        Readiness::Ready => Ok(no_store(Json(json!({ "ok": true })).into_response())),
        Readiness::NotReady(reason) => Err(ApiError::unavailable(format!(
            "extraction backend is not ready: {reason}"
        ))),
    }
}

async fn setup(State(gateway): State<NerGateway>) -> Json<SetupInfo> {
    Json(gateway.setup())
}

async fn predict(
    State(gateway): State<NerGateway>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<PredictOutcome>, ApiError> {
    let Json(request) = payload?;
    Ok(Json(gateway.predict(request).await?))
}

/// Batch prediction in annotation-tool form.
///
/// Fails only when every task failed; otherwise failed tasks are answered
/// with an empty prediction so the batch keeps its order.
async fn predict_ls(
    State(gateway): State<NerGateway>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<LabelStudioResponse>, ApiError> {
    let Json(payload) = payload?;
    let outcomes = gateway.predict_batch(&payload).await?;

    if outcomes.iter().all(Result::is_err) {
        if let Some(Err(first)) = outcomes.into_iter().next() {
            return Err(first.into());
        }
        return Ok(Json(LabelStudioResponse { results: vec![] }));
    }

    let results = outcomes
        .iter()
        .enumerate()
        .map(|(index, outcome)| match outcome {
            Ok(task) => LabelStudioPrediction::from(task),
            Err(e) => {
                warn!(task = index, error = %e, "task prediction failed, answering empty");
                LabelStudioPrediction::from_prediction(&gateway.empty_prediction(), "")
            }
        })
        .collect();
    Ok(Json(LabelStudioResponse { results }))
}

/// Accept a training request. An unreadable body still queues a job.
async fn train(State(gateway): State<NerGateway>, body: Bytes) -> Json<TrainReceipt> {
    let body = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or_else(|e| {
            warn!(error = %e, "train request body is not JSON");
            Value::Null
        })
    };
    Json(gateway.train(&body).await)
}
