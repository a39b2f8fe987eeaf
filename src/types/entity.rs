//! Decoded entities and prediction results.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// A labelled span of the original text.
///
/// Invariant: `start_offset < end_offset <= text.len()`, both on char
/// boundaries, and `confidence` in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub label: String,
    /// Byte offset of the first character.
    pub start_offset: usize,
    /// Byte offset one past the last character.
    pub end_offset: usize,
    /// The covered slice of the original text.
    pub text: String,
    pub contributing_tokens: Vec<String>,
    pub confidence: f32,
}

/// Outcome of one NER inference call. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub model_id: String,
    pub run_id: String,
    pub entities: Vec<Entity>,
    /// Mean entity confidence, `0.0` when there are no entities.
    pub aggregate_score: f32,
}

impl PredictionResult {
    pub fn new(model_id: impl Into<String>, run_id: impl Into<String>, entities: Vec<Entity>) -> Self {
        let aggregate_score = if entities.is_empty() {
            0.0
        } else {
            entities.iter().map(|e| e.confidence).sum::<f32>() / entities.len() as f32
        };
        Self {
            model_id: model_id.into(),
            run_id: run_id.into(),
            entities,
            aggregate_score,
        }
    }

    /// A prediction with no entities.
    pub fn empty(model_id: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self::new(model_id, run_id, Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Run identifier of the form `{prefix}-{unix_seconds}`.
pub fn run_id(prefix: &str) -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    format!("{prefix}-{secs}")
}
