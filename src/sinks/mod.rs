//! External collaborators reached through narrow interfaces.
//!
//! - [`ObjectStore`]: put/get of opaque objects (extracted tables, source
//!   documents)
//! - [`WebhookNotifier`]: signed task-created notifications for uploaded tables
//! - [`JobDispatcher`]: retraining job submission
//!
//! Request handlers never await these directly. They are spawned onto the
//! runtime and failures end up in the log and in
//! [`SIDE_EFFECTS_TOTAL`](crate::telemetry::SIDE_EFFECTS_TOTAL).

mod jobs;
mod tables;
mod webhook;

pub use jobs::{
    DryRunDispatcher, EnvVar, HttpJobDispatcher, JobDispatcher, ResourceRequests, SecretRef,
    TrainingJob, TrainingJobTemplate,
};
pub use tables::{TableSink, table_key};
pub use webhook::{SIGNATURE_HEADER, WebhookNotifier, sign_payload};

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::{HuginnError, Result};

/// Default bound on object store and webhook calls.
pub const DEFAULT_SINK_TIMEOUT: Duration = Duration::from_secs(10);

/// Bucketed key/value object storage.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, bucket: &str, key: &str, body: Vec<u8>, content_type: &str) -> Result<()>;

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;
}

/// Object store speaking plain path-style HTTP: `PUT`/`GET {base}/{bucket}/{key}`.
#[derive(Debug, Clone)]
pub struct HttpObjectStore {
    http: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpObjectStore {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = Client::builder().build().map_err(|e| {
            HuginnError::Configuration(format!("failed to build HTTP client: {e}"))
        })?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: DEFAULT_SINK_TIMEOUT,
        })
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn url(&self, bucket: &str, key: &str) -> String {
        format!("{}/{}/{}", self.base_url, bucket, key.trim_start_matches('/'))
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn put(&self, bucket: &str, key: &str, body: Vec<u8>, content_type: &str) -> Result<()> {
        let size = body.len();
        let response = self
            .http
            .put(self.url(bucket, key))
            .timeout(self.timeout)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await
            .map_err(|e| HuginnError::from_transport(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HuginnError::Api {
                status: status.as_u16(),
                message: format!("object store rejected put of {bucket}/{key}"),
            });
        }
        debug!(bucket, key, bytes = size, "stored object");
        Ok(())
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let response = self
            .http
            .get(self.url(bucket, key))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| HuginnError::from_transport(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HuginnError::Api {
                status: status.as_u16(),
                message: format!("object store could not fetch {bucket}/{key}"),
            });
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| HuginnError::from_transport(e, self.timeout))?;
        Ok(bytes.to_vec())
    }
}

/// Split `s3://bucket/key` into its parts.
pub fn parse_object_url(url: &str) -> Option<(&str, &str)> {
    let rest = url.strip_prefix("s3://")?;
    let (bucket, key) = rest.split_once('/')?;
    (!bucket.is_empty() && !key.is_empty()).then_some((bucket, key))
}
