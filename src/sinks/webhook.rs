//! Signed task-created webhooks for uploaded tables.

use std::time::Duration;

use hmac::{Hmac, Mac};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use sha2::Sha256;
use tracing::info;

use super::DEFAULT_SINK_TIMEOUT;
use crate::{HuginnError, Result};

/// Header carrying `hex(HMAC-SHA256(secret, body))`.
pub const SIGNATURE_HEADER: &str = "X-Label-Studio-Signature";

const ACTION_TASK_CREATED: &str = "TASK_CREATED";

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    action: &'static str,
    task: WebhookTask<'a>,
}

#[derive(Debug, Serialize)]
struct WebhookTask<'a> {
    id: i64,
    project: i64,
    data: WebhookData<'a>,
}

#[derive(Debug, Serialize)]
struct WebhookData<'a> {
    file_upload: String,
    meta: WebhookMeta<'a>,
}

#[derive(Debug, Serialize)]
struct WebhookMeta<'a> {
    source_type: &'a str,
    source_name: &'a str,
    doc_type: &'a str,
}

/// Posts one signed notification per uploaded object.
#[derive(Clone)]
pub struct WebhookNotifier {
    http: Client,
    url: String,
    secret: Option<String>,
    timeout: Duration,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, secret: Option<String>) -> Result<Self> {
        let http = Client::builder().build().map_err(|e| {
            HuginnError::Configuration(format!("failed to build HTTP client: {e}"))
        })?;
        Ok(Self {
            http,
            url: url.into(),
            secret: secret.filter(|s| !s.is_empty()),
            timeout: DEFAULT_SINK_TIMEOUT,
        })
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Announce `s3://{bucket}/{key}` as a new task of `project_id`.
    ///
    /// Only 200 and 202 count as delivered.
    pub async fn notify_table(
        &self,
        task_id: i64,
        project_id: i64,
        bucket: &str,
        key: &str,
    ) -> Result<()> {
        let secret = self
            .secret
            .as_deref()
            .ok_or_else(|| HuginnError::Sink("webhook secret not configured".to_string()))?;

        let payload = WebhookPayload {
            action: ACTION_TASK_CREATED,
            task: WebhookTask {
                id: task_id,
                project: project_id,
                data: WebhookData {
                    file_upload: format!("s3://{bucket}/{key}"),
                    meta: WebhookMeta {
                        source_type: "extraction",
                        source_name: "huginn",
                        doc_type: "extracted-table",
                    },
                },
            },
        };
        let body = serde_json::to_vec(&payload)?;
        let signature = sign_payload(secret, &body)?;

        let response = self
            .http
            .post(&self.url)
            .timeout(self.timeout)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(SIGNATURE_HEADER, signature)
            .body(body)
            .send()
            .await
            .map_err(|e| HuginnError::from_transport(e, self.timeout))?;

        let status = response.status();
        if status != StatusCode::OK && status != StatusCode::ACCEPTED {
            return Err(HuginnError::Sink(format!(
                "webhook returned status {} for {key}",
                status.as_u16()
            )));
        }
        info!(key, task_id, project_id, "table webhook delivered");
        Ok(())
    }
}

impl std::fmt::Debug for WebhookNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookNotifier")
            .field("url", &self.url)
            .field("signed", &self.secret.is_some())
            .finish()
    }
}

/// Lower-case hex HMAC-SHA256 of `body` under `secret`.
pub fn sign_payload(secret: &str, body: &[u8]) -> Result<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|e| HuginnError::Sink(format!("invalid webhook secret: {e}")))?;
    mac.update(body);
    Ok(mac
        .finalize()
        .into_bytes()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_matches_known_vector() {
        // RFC 4231 test case 2
        assert_eq!(
            sign_payload("Jefe", b"what do ya want for nothing?").unwrap(),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn empty_secret_counts_as_missing() {
        let notifier = WebhookNotifier::new("http://localhost/webhook", Some(String::new())).unwrap();
        assert!(!format!("{notifier:?}").contains("signed: true"));
    }

    #[tokio::test]
    async fn missing_secret_fails_without_sending() {
        let notifier = WebhookNotifier::new("http://127.0.0.1:9/webhook", None).unwrap();
        let err = notifier.notify_table(1, 2, "b", "k").await.unwrap_err();
        assert!(matches!(err, HuginnError::Sink(_)));
    }
}
