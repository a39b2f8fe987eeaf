//! Conversion of predictions to the annotation tool's result format.
//!
//! The annotation tool addresses text by character index, the decoder by
//! UTF-8 byte offset; everything crossing this boundary is converted here.

use serde::Serialize;

use crate::gateway::TaskPrediction;
use crate::types::{Entity, PredictionResult};

/// Control name of the labelling widget.
pub const FROM_NAME: &str = "label";
/// Object name of the text being labelled.
pub const TO_NAME: &str = "text";
/// Result type for span labels.
pub const RESULT_TYPE: &str = "labels";

/// One prediction in annotation-tool form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelStudioPrediction {
    pub model: String,
    pub model_run: String,
    pub result: Vec<LabelStudioResult>,
    pub score: f32,
}

/// One labelled region.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelStudioResult {
    pub value: SpanValue,
    pub from_name: &'static str,
    pub to_name: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub score: f32,
}

/// Character-indexed span with its label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpanValue {
    pub start: usize,
    pub end: usize,
    pub text: String,
    pub labels: Vec<String>,
}

/// Envelope of the batch prediction endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelStudioResponse {
    pub results: Vec<LabelStudioPrediction>,
}

impl LabelStudioPrediction {
    /// Convert a prediction decoded against `text`.
    pub fn from_prediction(prediction: &PredictionResult, text: &str) -> Self {
        Self {
            model: prediction.model_id.clone(),
            model_run: prediction.run_id.clone(),
            result: prediction
                .entities
                .iter()
                .map(|entity| LabelStudioResult::from_entity(entity, text))
                .collect(),
            score: prediction.aggregate_score,
        }
    }
}

impl From<&TaskPrediction> for LabelStudioPrediction {
    fn from(task: &TaskPrediction) -> Self {
        Self::from_prediction(&task.prediction, &task.text)
    }
}

impl LabelStudioResult {
    pub fn from_entity(entity: &Entity, text: &str) -> Self {
        Self {
            value: SpanValue {
                start: char_index(text, entity.start_offset),
                end: char_index(text, entity.end_offset),
                text: entity.text.clone(),
                labels: vec![entity.label.clone()],
            },
            from_name: FROM_NAME,
            to_name: TO_NAME,
            kind: RESULT_TYPE,
            score: entity.confidence,
        }
    }
}

/// Character index of a byte offset. Offsets past the end map to the char count.
fn char_index(text: &str, byte_offset: usize) -> usize {
    let mut offset = byte_offset.min(text.len());
    while !text.is_char_boundary(offset) {
        offset -= 1;
    }
    text[..offset].chars().count()
}
