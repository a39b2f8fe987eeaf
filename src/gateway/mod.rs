//! The NER gateway: every inbound operation of the service.
//!
//! ```text
//! predict ──► (extract) ──► tokenize ──► infer ──► decode ──► PredictionResult
//! ```
//!
//! The gateway is immutable after [`HuginnBuilder::build`] and cheap to
//! clone; concurrent requests share the backend client, tokenizer and
//! label set without locking.

mod builder;
mod request;

pub use builder::{
    DEFAULT_MODEL_ID, DEFAULT_MODEL_VERSION, DEFAULT_NER_MODEL, DEFAULT_RUN_PREFIX, Huginn,
    HuginnBuilder,
};
pub use request::{
    AnnotationTask, NER_TASK, PredictOutcome, PredictRequest, SetupInfo, TaskData,
    TaskPrediction, TrainReceipt, annotation_count, tasks_from_payload,
};

use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use futures_util::future::join_all;
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::extraction::Extractor;
use crate::ner::NerDecoder;
use crate::protocol::{InferResponse, InferenceBackend};
use crate::readiness::{Readiness, ReadinessGate};
use crate::sinks::{JobDispatcher, ObjectStore, TableSink, TrainingJobTemplate, parse_object_url};
use crate::telemetry;
use crate::tokenizer::TokenizerProvider;
use crate::types::{ExtractionResult, LabelSet, PredictionResult, TokenEncoding, run_id};
use crate::{HuginnError, Result};

pub(crate) struct GatewayInner {
    backend: Arc<dyn InferenceBackend>,
    backend_url: String,
    tokenizer: Arc<dyn TokenizerProvider>,
    decoder: NerDecoder,
    extractor: Extractor,
    readiness: ReadinessGate,
    ner_model: String,
    model_version: String,
    run_prefix: String,
    object_store: Option<Arc<dyn ObjectStore>>,
    tables: Option<TableSink>,
    training: TrainingJobTemplate,
    dispatcher: Arc<dyn JobDispatcher>,
    train_async: bool,
    train_dry_run: bool,
    hf_token: Option<String>,
}

/// Gateway between the annotation tool and the inference backend.
#[derive(Clone)]
pub struct NerGateway {
    inner: Arc<GatewayInner>,
}

impl NerGateway {
    pub fn labels(&self) -> &LabelSet {
        self.inner.decoder.labels()
    }

    pub fn ner_model(&self) -> &str {
        &self.inner.ner_model
    }

    pub fn extractor(&self) -> &Extractor {
        &self.inner.extractor
    }

    /// Predict entities (or raw outputs) for one request.
    #[instrument(skip(self, request), fields(operation = "predict"))]
    pub async fn predict(&self, request: PredictRequest) -> Result<PredictOutcome> {
        let model = request
            .model
            .clone()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| self.inner.ner_model.clone());
        let task = request
            .task
            .clone()
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| NER_TASK.to_string());

        let text = self.request_text(&request).await?;
        let start = Instant::now();
        let result = self.infer_text(&model, &text).await;
        telemetry::record_request("predict", &model, start, result.is_ok());
        let (encoding, response) = result?;

        if task == NER_TASK {
            let run = run_id(&self.inner.run_prefix);
            Ok(PredictOutcome::Entities(
                self.inner
                    .decoder
                    .decode_response(&response, &encoding, &text, &run),
            ))
        } else {
            Ok(PredictOutcome::Raw(response))
        }
    }

    /// Predict every task of an annotation-tool payload concurrently.
    ///
    /// Only a malformed payload fails as a whole; each task carries its own
    /// outcome.
    pub async fn predict_batch(&self, payload: &Value) -> Result<Vec<Result<TaskPrediction>>> {
        let tasks = tasks_from_payload(payload)?;
        info!(tasks = tasks.len(), "batch prediction");
        Ok(join_all(tasks.iter().map(|task| self.predict_task(task))).await)
    }

    /// Predict one annotation task, fetching its document when it has no text.
    #[instrument(skip(self, task), fields(operation = "predict_task", task_id = task.id))]
    pub async fn predict_task(&self, task: &AnnotationTask) -> Result<TaskPrediction> {
        let text = match (&task.data.text, &task.data.file_upload) {
            (Some(text), _) => text.clone(),
            (None, Some(url)) if url.starts_with("s3://") => self.task_document_text(task, url).await?,
            _ => {
                return Err(HuginnError::InvalidInput(
                    "task payload must include text or file_upload".to_string(),
                ));
            }
        };

        let model = self.inner.ner_model.clone();
        let start = Instant::now();
        let result = self.infer_text(&model, &text).await;
        telemetry::record_request("predict", &model, start, result.is_ok());
        let (encoding, response) = result?;

        let run = run_id(&self.inner.run_prefix);
        let prediction = self
            .inner
            .decoder
            .decode_response(&response, &encoding, &text, &run);
        Ok(TaskPrediction {
            task_id: task.id,
            text,
            prediction,
        })
    }

    /// A prediction with no entities, stamped with this gateway's model and a fresh run id.
    pub fn empty_prediction(&self) -> PredictionResult {
        PredictionResult::empty(self.inner.decoder.model_id(), run_id(&self.inner.run_prefix))
    }

    /// Readiness of the extraction backend.
    pub async fn health(&self) -> Readiness {
        self.inner.readiness.check_ready().await
    }

    pub fn setup(&self) -> SetupInfo {
        SetupInfo {
            model_version: self.inner.model_version.clone(),
            status: "ready",
            model_name: self.inner.ner_model.clone(),
            labels: self.labels().as_slice().to_vec(),
        }
    }

    /// Accept a training request and dispatch the job.
    ///
    /// Dispatch failures are logged, never returned; the receipt only says
    /// the request was accepted.
    pub async fn train(&self, body: &Value) -> TrainReceipt {
        let inner = &self.inner;
        let count = annotation_count(body);
        let request_id = format!(
            "trn-{}",
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or_default()
        );
        info!(
            request_id = %request_id,
            annotations = count,
            async_dispatch = inner.train_async,
            dry_run = inner.train_dry_run,
            "training request received"
        );

        let job = inner.training.build(
            &request_id,
            count,
            &inner.backend_url,
            &inner.ner_model,
            inner.hf_token.as_deref(),
        );
        let dispatcher = inner.dispatcher.clone();
        let dispatch = async move {
            let result = dispatcher.dispatch(&job).await;
            if let Err(e) = &result {
                warn!(error = %e, job = %job.name, dispatcher = dispatcher.name(), "training job dispatch failed");
            }
            telemetry::record_side_effect("training_job", result.is_ok());
        };
        if inner.train_async {
            tokio::spawn(dispatch);
        } else {
            dispatch.await;
        }

        TrainReceipt {
            status: "queued",
            message: "Training request accepted",
            request_id,
            async_dispatch: inner.train_async,
            dry_run: inner.train_dry_run,
            job_namespace: inner.training.namespace.clone(),
        }
    }

    async fn request_text(&self, request: &PredictRequest) -> Result<String> {
        if let Some(text) = request.text.as_ref().filter(|t| !t.is_empty()) {
            return Ok(text.clone());
        }

        let (encoded, field, default_name) = match (&request.pdf_base64, &request.image_base64) {
            (Some(pdf), _) if !pdf.is_empty() => (pdf, "pdf_base64", "document.pdf"),
            (_, Some(image)) if !image.is_empty() => (image, "image_base64", "image.jpg"),
            _ => {
                return Err(HuginnError::InvalidInput(
                    "provide text or pdf_base64/image_base64 in the request".to_string(),
                ));
            }
        };
        let document = STANDARD
            .decode(encoded)
            .map_err(|e| HuginnError::InvalidInput(format!("failed to decode {field}: {e}")))?;
        let filename = request.file_name.as_deref().unwrap_or(default_name);

        let extracted = self.inner.extractor.extract(&document, filename).await?;
        info!(chars = extracted.char_count, filename, "extracted document text");

        if let (Some(project), Some(task)) = (request.project_id, request.task_id) {
            if project > 0 && task > 0 {
                self.spawn_tables(None, project, task, &extracted);
            }
        }
        Ok(extracted.text)
    }

    async fn task_document_text(&self, task: &AnnotationTask, url: &str) -> Result<String> {
        let (bucket, key) = parse_object_url(url).ok_or_else(|| {
            HuginnError::InvalidInput("file_upload must be of the form s3://bucket/key".to_string())
        })?;
        let store = self.inner.object_store.as_ref().ok_or_else(|| {
            HuginnError::Configuration("object store not configured for document tasks".to_string())
        })?;

        let document = store.get(bucket, key).await?;
        let filename = key.rsplit('/').next().unwrap_or(key);
        let extracted = self.inner.extractor.extract(&document, filename).await?;
        info!(chars = extracted.char_count, filename, "extracted task document text");

        if let Some((project, task_id)) = task.scope() {
            self.spawn_tables(Some(bucket.to_string()), project, task_id, &extracted);
        }
        Ok(extracted.text)
    }

    fn spawn_tables(
        &self,
        bucket: Option<String>,
        project_id: i64,
        task_id: i64,
        extracted: &ExtractionResult,
    ) {
        if extracted.tables.is_empty() {
            return;
        }
        match &self.inner.tables {
            Some(sink) => {
                sink.spawn(bucket, project_id, task_id, extracted.tables.clone());
            }
            None => warn!(
                tables = extracted.tables.len(),
                "extracted tables dropped: no table sink configured"
            ),
        }
    }

    async fn infer_text(&self, model: &str, text: &str) -> Result<(TokenEncoding, InferResponse)> {
        let encoding = self.inner.tokenizer.encode(text)?;
        if encoding.is_empty() {
            return Err(HuginnError::InvalidInput(
                "text is empty after tokenization".to_string(),
            ));
        }
        let inputs = encoding.input_tensors()?;
        let response = self.inner.backend.infer(model, &inputs).await?;
        Ok((encoding, response))
    }
}

impl std::fmt::Debug for NerGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NerGateway")
            .field("backend", &self.inner.backend.name())
            .field("ner_model", &self.inner.ner_model)
            .field("extractor", &self.inner.extractor)
            .field("labels", &self.labels().len())
            .finish()
    }
}
