//! Token-classification decoding.
//!
//! Turns a `[batch, sequence, labels]` logits tensor plus the token
//! encoding it was computed from into character-offset entity spans:
//!
//! 1. validate the tensor shape against the encoding
//! 2. per-token softmax and arg-max
//! 3. merge consecutive same-label tokens, closing on the non-entity
//!    label, structural tokens and out-of-range label indices
//! 4. clamp every span into the original text
//!
//! Decoding never fails. A tensor that does not fit the encoding, or that
//! carries fewer labels than configured, degrades to an empty prediction
//! with a warning and a
//! [`DECODE_DEGRADED_TOTAL`](crate::telemetry::DECODE_DEGRADED_TOTAL) count.

mod softmax;
mod spans;

pub use softmax::{argmax, softmax};
pub use spans::repair_bounds;

use std::sync::Arc;

use tracing::{debug, warn};

use crate::HuginnError;
use crate::protocol::InferResponse;
use crate::telemetry;
use crate::types::{LabelSet, PredictionResult, TensorDescriptor, TokenEncoding};
use spans::SpanMerger;

/// Output tensor holding per-token logits.
pub const LOGITS_OUTPUT: &str = "logits";

/// Token strings that never belong to an entity.
pub const DEFAULT_SPECIAL_TOKENS: &[&str] = &["[CLS]", "[SEP]", "[PAD]", "<s>", "</s>", "<pad>"];

/// Predicted label index and its probability for one token.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenPrediction {
    pub label_index: usize,
    pub confidence: f32,
}

/// Why a logits tensor could not be decoded.
struct Degraded {
    reason: &'static str,
    detail: String,
}

impl Degraded {
    fn new(reason: &'static str, detail: String) -> Self {
        Self { reason, detail }
    }
}

/// Decoder for one model's token-classification output.
///
/// Immutable and cheap to clone; share one per label configuration.
#[derive(Debug, Clone)]
pub struct NerDecoder {
    labels: LabelSet,
    model_id: String,
    special_tokens: Arc<[String]>,
}

impl NerDecoder {
    pub fn new(labels: LabelSet, model_id: impl Into<String>) -> Self {
        Self {
            labels,
            model_id: model_id.into(),
            special_tokens: DEFAULT_SPECIAL_TOKENS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Replace the structural token list.
    pub fn with_special_tokens<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.special_tokens = tokens.into_iter().map(Into::into).collect();
        self
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Decode `logits` for `encoding` of `text` into a prediction.
    pub fn decode(
        &self,
        logits: &TensorDescriptor,
        encoding: &TokenEncoding,
        text: &str,
        run_id: &str,
    ) -> PredictionResult {
        let predictions = match self.predict_tokens(logits, encoding) {
            Ok(predictions) => predictions,
            Err(degraded) => return self.degraded(degraded, run_id),
        };

        let mut merger = SpanMerger::new(text);
        let tokens = encoding.tokens();
        let offsets = encoding.offsets();
        let mask = encoding.attention_mask();

        for (i, prediction) in predictions.iter().enumerate() {
            if self.is_structural(&tokens[i], offsets[i], mask[i]) {
                merger.close();
                continue;
            }
            if self.labels.is_non_entity(prediction.label_index) {
                merger.close();
                continue;
            }
            let Some(label) = self.labels.get(prediction.label_index) else {
                warn!(
                    token = i,
                    label_index = prediction.label_index,
                    configured = self.labels.len(),
                    "label index out of range, treating token as non-entity"
                );
                merger.close();
                continue;
            };
            merger.push(label, offsets[i], &tokens[i], prediction.confidence);
        }

        let entities = merger.finish();
        for entity in &entities {
            metrics::counter!(telemetry::ENTITIES_TOTAL, "label" => entity.label.clone())
                .increment(1);
        }
        debug!(entities = entities.len(), tokens = predictions.len(), "decoded prediction");
        PredictionResult::new(&self.model_id, run_id, entities)
    }

    /// Decode the logits output of an infer response.
    ///
    /// Falls back to the first output when none is named `logits`; a
    /// response with no outputs at all degrades like a shape mismatch.
    pub fn decode_response(
        &self,
        response: &InferResponse,
        encoding: &TokenEncoding,
        text: &str,
        run_id: &str,
    ) -> PredictionResult {
        match response.output_or_first(LOGITS_OUTPUT) {
            Some(logits) => self.decode(logits, encoding, text, run_id),
            None => self.degraded(
                Degraded::new("shape", "response carries no output tensors".to_string()),
                run_id,
            ),
        }
    }

    /// Validate and reshape the tensor, then pick the best label per token.
    fn predict_tokens(
        &self,
        logits: &TensorDescriptor,
        encoding: &TokenEncoding,
    ) -> Result<Vec<TokenPrediction>, Degraded> {
        let shape = logits.shape();
        let [batch, seq_len, num_labels] = *shape else {
            return Err(Degraded::new(
                "shape",
                format!("expected rank-3 logits, got shape {shape:?}"),
            ));
        };
        if batch != 1 {
            return Err(Degraded::new(
                "shape",
                format!("expected batch size 1, got {batch}"),
            ));
        }
        if num_labels == 0 {
            return Err(Degraded::new("shape", "logits have zero labels".to_string()));
        }

        let data = logits.as_f32().ok_or_else(|| {
            Degraded::new(
                "datatype",
                format!("logits must be numeric, got {}", logits.datatype()),
            )
        })?;
        if data.len() != seq_len * num_labels {
            return Err(Degraded::new(
                "shape",
                format!(
                    "logits size mismatch: expected {} values, got {}",
                    seq_len * num_labels,
                    data.len()
                ),
            ));
        }
        if num_labels < self.labels.len() {
            return Err(Degraded::new(
                "labels",
                format!(
                    "model emits {num_labels} labels, configured set has {}",
                    self.labels.len()
                ),
            ));
        }
        if seq_len != encoding.len() {
            return Err(Degraded::new(
                "length",
                format!(
                    "sequence length {seq_len} does not match {} encoded tokens",
                    encoding.len()
                ),
            ));
        }
        if num_labels > self.labels.len() {
            warn!(
                model_labels = num_labels,
                configured_labels = self.labels.len(),
                "model emits more labels than configured, extra indices are non-entity"
            );
        }

        Ok(data
            .chunks_exact(num_labels)
            .map(|row| {
                let probs = softmax(row);
                let (label_index, confidence) = argmax(&probs).unwrap_or((0, 0.0));
                TokenPrediction {
                    label_index,
                    confidence,
                }
            })
            .collect())
    }

    fn is_structural(&self, token: &str, (start, end): (usize, usize), mask: i64) -> bool {
        mask == 0 || start == end || self.special_tokens.iter().any(|s| s == token)
    }

    fn degraded(&self, degraded: Degraded, run_id: &str) -> PredictionResult {
        let err = HuginnError::DecodeDegraded(degraded.detail);
        warn!(reason = degraded.reason, error = %err, "returning empty prediction");
        metrics::counter!(telemetry::DECODE_DEGRADED_TOTAL, "reason" => degraded.reason)
            .increment(1);
        PredictionResult::empty(&self.model_id, run_id)
    }
}
