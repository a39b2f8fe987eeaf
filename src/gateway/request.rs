//! Inbound request and response shapes of the gateway.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::protocol::InferResponse;
use crate::types::PredictionResult;
use crate::{HuginnError, Result};

/// Task name that selects entity decoding.
pub const NER_TASK: &str = "ner";

/// A direct prediction request.
///
/// Either `text` or one of the base64 document fields must be set; text
/// wins when both are present.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PredictRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_base64: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_base64: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    /// Backend model; defaults to the configured NER model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// `ner` (default) decodes entities; anything else returns raw outputs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<i64>,
}

impl PredictRequest {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn pdf_base64(data: impl Into<String>) -> Self {
        Self {
            pdf_base64: Some(data.into()),
            ..Default::default()
        }
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn task(mut self, task: impl Into<String>) -> Self {
        self.task = Some(task.into());
        self
    }
}

/// Result of [`predict`](super::NerGateway::predict).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PredictOutcome {
    Entities(PredictionResult),
    /// Undecoded backend response, for non-NER tasks.
    Raw(InferResponse),
}

impl PredictOutcome {
    pub fn entities(&self) -> Option<&PredictionResult> {
        match self {
            Self::Entities(result) => Some(result),
            Self::Raw(_) => None,
        }
    }
}

/// Prediction for one annotation task, with the text it was decoded against.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskPrediction {
    pub task_id: Option<i64>,
    pub text: String,
    pub prediction: PredictionResult,
}

/// Text source of an annotation task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TaskData {
    #[serde(default)]
    pub text: Option<String>,
    /// `s3://bucket/key` of the source document.
    #[serde(default)]
    pub file_upload: Option<String>,
}

/// One annotation-tool task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationTask {
    pub id: Option<i64>,
    pub project_id: Option<i64>,
    pub data: TaskData,
}

impl AnnotationTask {
    /// Read a task object. Without a `data` object the task itself is the data.
    pub fn from_value(value: &Value) -> Result<Self> {
        let Value::Object(map) = value else {
            return Err(HuginnError::InvalidInput("task must be a JSON object".to_string()));
        };
        let data = match map.get("data") {
            Some(data @ Value::Object(_)) => data,
            _ => value,
        };
        let data = TaskData::deserialize(data)
            .map_err(|e| HuginnError::InvalidInput(format!("malformed task data: {e}")))?;

        let project_id = match map.get("project") {
            Some(Value::Object(project)) => project.get("id").and_then(Value::as_i64),
            Some(project) => project.as_i64(),
            None => None,
        };

        Ok(Self {
            id: map.get("id").and_then(Value::as_i64),
            project_id,
            data,
        })
    }

    /// Project and task ids, when both are positive.
    pub fn scope(&self) -> Option<(i64, i64)> {
        match (self.project_id, self.id) {
            (Some(project), Some(task)) if project > 0 && task > 0 => Some((project, task)),
            _ => None,
        }
    }
}

/// Pull the task list out of an annotation-tool payload.
///
/// Accepts `{"tasks":[...]}`, `{"data":[...]}`, `{"data":{...}}` or a bare task.
pub fn tasks_from_payload(payload: &Value) -> Result<Vec<AnnotationTask>> {
    let tasks: Vec<&Value> = match (payload.get("tasks"), payload.get("data")) {
        (Some(Value::Array(tasks)), _) => tasks.iter().collect(),
        (_, Some(Value::Array(data))) => data.iter().collect(),
        (_, Some(data)) => vec![data],
        _ => vec![payload],
    };
    if tasks.is_empty() {
        return Err(HuginnError::InvalidInput("no tasks provided".to_string()));
    }
    tasks.into_iter().map(AnnotationTask::from_value).collect()
}

/// Static description returned by [`setup`](super::NerGateway::setup).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetupInfo {
    pub model_version: String,
    pub status: &'static str,
    pub model_name: String,
    pub labels: Vec<String>,
}

/// Immediate answer to a training request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrainReceipt {
    pub status: &'static str,
    pub message: &'static str,
    pub request_id: String,
    #[serde(rename = "async")]
    pub async_dispatch: bool,
    pub dry_run: bool,
    pub job_namespace: String,
}

/// Best-effort annotation count of a training payload.
pub fn annotation_count(body: &Value) -> usize {
    ["annotations", "data"]
        .iter()
        .find_map(|field| body.get(field).and_then(Value::as_array))
        .map_or(0, Vec::len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tasks_array() {
        let tasks = tasks_from_payload(&json!({
            "tasks": [
                {"id": 3, "project": 9, "data": {"text": "Oslo"}},
                {"id": 4, "project": {"id": 9}, "data": {"file_upload": "s3://b/k.pdf"}}
            ]
        }))
        .unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].scope(), Some((9, 3)));
        assert_eq!(tasks[0].data.text.as_deref(), Some("Oslo"));
        assert_eq!(tasks[1].project_id, Some(9));
        assert_eq!(tasks[1].data.file_upload.as_deref(), Some("s3://b/k.pdf"));
    }

    #[test]
    fn data_object_is_a_single_task() {
        let tasks = tasks_from_payload(&json!({"data": {"text": "Bergen"}})).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].data.text.as_deref(), Some("Bergen"));
        assert_eq!(tasks[0].scope(), None);
    }

    #[test]
    fn bare_task() {
        let tasks = tasks_from_payload(&json!({"text": "Tromsø"})).unwrap();
        assert_eq!(tasks[0].data.text.as_deref(), Some("Tromsø"));
    }

    #[test]
    fn empty_task_list_is_invalid() {
        let err = tasks_from_payload(&json!({"tasks": []})).unwrap_err();
        assert!(matches!(err, HuginnError::InvalidInput(_)));
    }

    #[test]
    fn non_object_task_is_invalid() {
        assert!(tasks_from_payload(&json!({"tasks": ["Oslo"]})).is_err());
    }

    #[test]
    fn counts_annotations_then_data() {
        assert_eq!(annotation_count(&json!({"annotations": [1, 2, 3]})), 3);
        assert_eq!(annotation_count(&json!({"data": [1]})), 1);
        assert_eq!(annotation_count(&json!({"other": true})), 0);
        assert_eq!(annotation_count(&Value::Null), 0);
    }

    #[test]
    fn receipt_uses_async_key() {
        let receipt = TrainReceipt {
            status: "queued",
            message: "Training request accepted",
            request_id: "trn-1".into(),
            async_dispatch: true,
            dry_run: false,
            job_namespace: "apps".into(),
        };
        let json = serde_json::to_value(&receipt).unwrap();
        assert_eq!(json["async"], true);
    }
}
