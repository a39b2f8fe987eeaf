//! Document text extraction through a document-understanding model.
//!
//! The extraction model takes two BYTES slots, the binary document and a
//! text channel (always sent, empty for binary input), and answers with a
//! single BYTES output holding a JSON extraction record.
//!
//! Failures are classified so callers can tell "backend down" from
//! "document has no text":
//!
//! | Condition                              | Error                          |
//! |----------------------------------------|--------------------------------|
//! | extraction not enabled                 | [`ExtractionError::Disabled`]  |
//! | empty document bytes                   | [`ExtractionError::EmptyDocument`] |
//! | transport, status or decode failure    | [`ExtractionError::Unavailable`] |
//! | record decoded but text is blank       | [`ExtractionError::NoText`]    |
//!
//! There is no retry and no secondary extractor.

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, instrument, warn};

use crate::ExtractionError;
use crate::protocol::InferenceBackend;
use crate::telemetry;
use crate::types::{ExtractionResult, RawExtractionRecord, TensorDescriptor};

/// Default extraction model on the inference server.
pub const DEFAULT_EXTRACTION_MODEL: &str = "docling_granite_python";

/// Input slot carrying the binary document.
pub const DOCUMENT_INPUT: &str = "pdf_data";
/// Input slot carrying plain text; required by the model, empty for documents.
pub const TEXT_INPUT: &str = "text";
/// Output slot holding the JSON record.
pub const RECORD_OUTPUT: &str = "response";

/// Extracts text (and tables) from documents.
#[derive(Clone)]
pub struct Extractor {
    backend: Option<Arc<dyn InferenceBackend>>,
    model: String,
}

impl Extractor {
    /// An extractor backed by `backend`, calling `model`.
    pub fn new(backend: Arc<dyn InferenceBackend>, model: impl Into<String>) -> Self {
        Self {
            backend: Some(backend),
            model: model.into(),
        }
    }

    /// An extractor that refuses every document without touching the network.
    pub fn disabled() -> Self {
        Self {
            backend: None,
            model: DEFAULT_EXTRACTION_MODEL.to_string(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub(crate) fn backend(&self) -> Option<&Arc<dyn InferenceBackend>> {
        self.backend.as_ref()
    }

    /// Extract text from `document`. `filename` is used for logging only.
    #[instrument(skip(self, document), fields(operation = "extract", bytes = document.len()))]
    pub async fn extract(
        &self,
        document: &[u8],
        filename: &str,
    ) -> Result<ExtractionResult, ExtractionError> {
        let Some(backend) = &self.backend else {
            return Err(ExtractionError::Disabled);
        };
        if document.is_empty() {
            return Err(ExtractionError::EmptyDocument);
        }

        let start = Instant::now();
        let result = self.call_backend(backend.as_ref(), document).await;
        telemetry::record_request("extract", &self.model, start, result.is_ok());

        let result = result.map_err(|e| {
            warn!(error = %e, "extraction backend call failed");
            e
        })?;

        if result.text.trim().is_empty() {
            warn!(pages = result.page_count, "extraction produced no text");
            return Err(ExtractionError::NoText);
        }

        info!(
            words = result.word_count,
            tables = result.tables.len(),
            formulas = result.formulas.len(),
            "extraction succeeded"
        );
        Ok(result)
    }

    async fn call_backend(
        &self,
        backend: &dyn InferenceBackend,
        document: &[u8],
    ) -> Result<ExtractionResult, ExtractionError> {
        let inputs = [
            TensorDescriptor::bytes_scalar(DOCUMENT_INPUT, document.to_vec()),
            TensorDescriptor::bytes_scalar(TEXT_INPUT, Vec::new()),
        ];

        let response = backend
            .infer(&self.model, &inputs)
            .await
            .map_err(|e| ExtractionError::Unavailable(e.to_string()))?;

        let output = response
            .output_or_first(RECORD_OUTPUT)
            .ok_or_else(|| ExtractionError::Unavailable("no outputs in response".to_string()))?;

        let payload = output.first_bytes().ok_or_else(|| {
            ExtractionError::Unavailable(format!(
                "output '{}' is {} with {} elements, expected one BYTES element",
                output.name(),
                output.datatype(),
                output.data().len()
            ))
        })?;

        let record: RawExtractionRecord = serde_json::from_slice(payload).map_err(|e| {
            ExtractionError::Unavailable(format!("failed to parse extraction record: {e}"))
        })?;

        Ok(record.into())
    }
}

impl std::fmt::Debug for Extractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extractor")
            .field("enabled", &self.is_enabled())
            .field("model", &self.model)
            .finish()
    }
}
