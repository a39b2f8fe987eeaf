//! Retraining job submission.
//!
//! The job description is orchestrator-neutral JSON: image, namespace, env,
//! resource requests and node selector. Whatever sits behind the dispatch
//! URL turns it into a real workload.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{HuginnError, Result};

const DISPATCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Static part of every training job, loaded from configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TrainingJobTemplate {
    pub image: String,
    pub namespace: String,
    pub ttl_seconds: u32,
    pub dataset_repo: String,
    pub model_repo: String,
    pub cpu: String,
    pub memory: String,
    /// Extended resource name for accelerators; empty disables the request.
    pub gpu_resource: String,
    /// Accelerator count; `"0"` or empty disables the request.
    pub gpu_count: String,
    /// `key=value` node selector.
    pub node_selector: Option<String>,
    /// Secret holding the hub token; preferred over passing the token inline.
    pub hf_secret_name: Option<String>,
    pub hf_secret_key: String,
}

impl Default for TrainingJobTemplate {
    fn default() -> Self {
        Self {
            image: "training-worker:latest".to_string(),
            namespace: "apps".to_string(),
            ttl_seconds: 3600,
            dataset_repo: String::new(),
            model_repo: String::new(),
            cpu: "4".to_string(),
            memory: "8Gi".to_string(),
            gpu_resource: "nvidia.com/gpu".to_string(),
            gpu_count: "1".to_string(),
            node_selector: Some("node-role.kubernetes.io/gpu=true".to_string()),
            hf_secret_name: None,
            hf_secret_key: "token".to_string(),
        }
    }
}

/// Reference to a key inside an orchestrator-managed secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecretRef {
    pub name: String,
    pub key: String,
}

/// One environment variable of the training container.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct EnvVar {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_from: Option<SecretRef>,
}

impl EnvVar {
    fn plain(name: &str, value: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            value: Some(value.into()),
            value_from: None,
        }
    }
}

impl std::fmt::Debug for EnvVar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = match (&self.value, self.name.as_str()) {
            (Some(_), "HF_TOKEN") => Some("<redacted>"),
            (Some(v), _) => Some(v.as_str()),
            (None, _) => None,
        };
        f.debug_struct("EnvVar")
            .field("name", &self.name)
            .field("value", &value)
            .field("value_from", &self.value_from)
            .finish()
    }
}

/// Resource requests and limits, keyed by resource name.
pub type ResourceRequests = BTreeMap<String, String>;

/// A fully resolved training job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingJob {
    pub name: String,
    pub request_id: String,
    pub namespace: String,
    pub image: String,
    pub labels: BTreeMap<String, String>,
    pub backoff_limit: u32,
    pub ttl_seconds_after_finished: u32,
    pub env: Vec<EnvVar>,
    pub resources: ResourceRequests,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub node_selector: BTreeMap<String, String>,
}

impl TrainingJob {
    pub fn env_value(&self, name: &str) -> Option<&str> {
        self.env
            .iter()
            .find(|e| e.name == name)
            .and_then(|e| e.value.as_deref())
    }
}

impl TrainingJobTemplate {
    /// Resolve the template for one training request.
    pub fn build(
        &self,
        request_id: &str,
        annotation_count: usize,
        backend_url: &str,
        backend_model: &str,
        hf_token: Option<&str>,
    ) -> TrainingJob {
        let mut env = Vec::with_capacity(6);
        match (&self.hf_secret_name, hf_token) {
            (Some(secret), _) if !secret.is_empty() => env.push(EnvVar {
                name: "HF_TOKEN".to_string(),
                value: None,
                value_from: Some(SecretRef {
                    name: secret.clone(),
                    key: self.hf_secret_key.clone(),
                }),
            }),
            (_, Some(token)) if !token.is_empty() => env.push(EnvVar::plain("HF_TOKEN", token)),
            _ => {}
        }
        env.push(EnvVar::plain("HF_DATASET_REPO", &self.dataset_repo));
        env.push(EnvVar::plain("HF_MODEL_REPO", &self.model_repo));
        env.push(EnvVar::plain("ANNOTATION_COUNT", annotation_count.to_string()));
        env.push(EnvVar::plain("TRITON_URL", backend_url));
        env.push(EnvVar::plain("TRITON_MODEL_NAME", backend_model));

        let mut resources = ResourceRequests::new();
        resources.insert("cpu".to_string(), self.cpu.clone());
        resources.insert("memory".to_string(), self.memory.clone());
        if !self.gpu_resource.is_empty() && !self.gpu_count.is_empty() && self.gpu_count != "0" {
            resources.insert(self.gpu_resource.clone(), self.gpu_count.clone());
        }

        let node_selector = self
            .node_selector
            .as_deref()
            .and_then(|s| s.split_once('='))
            .map(|(k, v)| (k.trim(), v.trim()))
            .filter(|(k, v)| !k.is_empty() && !v.is_empty())
            .map(|(k, v)| BTreeMap::from([(k.to_string(), v.to_string())]))
            .unwrap_or_default();

        TrainingJob {
            name: format!("train-{}", request_id.trim_start_matches("trn-")),
            request_id: request_id.to_string(),
            namespace: self.namespace.clone(),
            image: self.image.clone(),
            labels: BTreeMap::from([
                ("app".to_string(), "training-worker".to_string()),
                ("trigger".to_string(), "label-studio".to_string()),
            ]),
            backoff_limit: 0,
            ttl_seconds_after_finished: self.ttl_seconds,
            env,
            resources,
            node_selector,
        }
    }
}

/// Submits training jobs to an external orchestrator.
#[async_trait]
pub trait JobDispatcher: Send + Sync {
    fn name(&self) -> &str;

    async fn dispatch(&self, job: &TrainingJob) -> Result<()>;
}

/// POSTs the job JSON to a submission endpoint.
#[derive(Debug, Clone)]
pub struct HttpJobDispatcher {
    http: Client,
    url: String,
}

impl HttpJobDispatcher {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let http = Client::builder().build().map_err(|e| {
            HuginnError::Configuration(format!("failed to build HTTP client: {e}"))
        })?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }
}

#[async_trait]
impl JobDispatcher for HttpJobDispatcher {
    fn name(&self) -> &str {
        "http"
    }

    async fn dispatch(&self, job: &TrainingJob) -> Result<()> {
        let response = self
            .http
            .post(&self.url)
            .timeout(DISPATCH_TIMEOUT)
            .json(job)
            .send()
            .await
            .map_err(|e| HuginnError::from_transport(e, DISPATCH_TIMEOUT))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(HuginnError::Api {
                status: status.as_u16(),
                message,
            });
        }
        info!(job = %job.name, namespace = %job.namespace, image = %job.image, "training job submitted");
        Ok(())
    }
}

/// Logs the job instead of submitting it.
#[derive(Debug, Clone, Default)]
pub struct DryRunDispatcher;

#[async_trait]
impl JobDispatcher for DryRunDispatcher {
    fn name(&self) -> &str {
        "dry-run"
    }

    async fn dispatch(&self, job: &TrainingJob) -> Result<()> {
        info!(
            job = %job.name,
            namespace = %job.namespace,
            annotations = job.env_value("ANNOTATION_COUNT").unwrap_or("0"),
            "dry-run: would create training job"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_resolves_env_and_resources() {
        let template = TrainingJobTemplate {
            dataset_repo: "org/annotations".into(),
            model_repo: "org/ner".into(),
            ..Default::default()
        };
        let job = template.build("trn-17", 12, "http://triton:8000", "ner-distilbert", None);

        assert_eq!(job.name, "train-17");
        assert_eq!(job.env_value("ANNOTATION_COUNT"), Some("12"));
        assert_eq!(job.env_value("HF_DATASET_REPO"), Some("org/annotations"));
        assert_eq!(job.env_value("TRITON_MODEL_NAME"), Some("ner-distilbert"));
        assert_eq!(job.env_value("HF_TOKEN"), None);
        assert_eq!(job.resources.get("nvidia.com/gpu").map(String::as_str), Some("1"));
        assert_eq!(
            job.node_selector.get("node-role.kubernetes.io/gpu").map(String::as_str),
            Some("true")
        );
    }

    #[test]
    fn secret_ref_wins_over_inline_token() {
        let template = TrainingJobTemplate {
            hf_secret_name: Some("hf".into()),
            ..Default::default()
        };
        let job = template.build("trn-1", 0, "u", "m", Some("hf_abc"));
        let token = job.env.iter().find(|e| e.name == "HF_TOKEN").unwrap();
        assert_eq!(token.value, None);
        assert_eq!(token.value_from.as_ref().unwrap().name, "hf");
    }

    #[test]
    fn inline_token_is_redacted_in_debug() {
        let job = TrainingJobTemplate::default().build("trn-1", 0, "u", "m", Some("hf_abc"));
        assert_eq!(job.env_value("HF_TOKEN"), Some("hf_abc"));
        assert!(!format!("{job:?}").contains("hf_abc"));
    }

    #[test]
    fn zero_gpus_requests_none() {
        let template = TrainingJobTemplate {
            gpu_count: "0".into(),
            node_selector: None,
            ..Default::default()
        };
        let job = template.build("trn-1", 0, "u", "m", None);
        assert_eq!(job.resources.len(), 2);
        assert!(job.node_selector.is_empty());
    }
}
