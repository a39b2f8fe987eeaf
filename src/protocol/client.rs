//! HTTP client for the JSON tensor protocol.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use super::{
    CLIENT_ID_HEADER, CLIENT_SECRET_HEADER, InferResponse, InferenceBackend, WireInferResponse,
};
use crate::telemetry;
use crate::types::TensorDescriptor;
use crate::{HuginnError, Result};

/// Default bound on an infer call.
pub const DEFAULT_INFER_TIMEOUT: Duration = Duration::from_secs(30);
/// Default bound on a readiness probe.
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(5);

/// Longest error body kept as diagnostic.
const MAX_ERROR_BODY: usize = 1024;

/// Static credential pair attached to every call.
#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Client for a tensor inference server.
///
/// Stateless per call and cheap to clone; the inner reqwest client pools
/// connections and is safe for concurrent use.
#[derive(Clone, Debug)]
pub struct TensorClient {
    http: Client,
    base_url: String,
    credentials: Option<Credentials>,
    infer_timeout: Duration,
    ready_timeout: Duration,
}

/// Builder for [`TensorClient`].
pub struct TensorClientBuilder {
    base_url: String,
    credentials: Option<Credentials>,
    infer_timeout: Duration,
    ready_timeout: Duration,
}

impl TensorClientBuilder {
    /// Attach the credential pair to every call.
    pub fn credentials(mut self, client_id: impl Into<String>, secret: impl Into<String>) -> Self {
        self.credentials = Some(Credentials {
            client_id: client_id.into(),
            client_secret: secret.into(),
        });
        self
    }

    pub fn infer_timeout(mut self, timeout: Duration) -> Self {
        self.infer_timeout = timeout;
        self
    }

    pub fn ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<TensorClient> {
        let http = Client::builder().build().map_err(|e| {
            HuginnError::Configuration(format!("failed to build HTTP client: {e}"))
        })?;
        Ok(TensorClient {
            http,
            base_url: self.base_url.trim_end_matches('/').to_string(),
            credentials: self.credentials,
            infer_timeout: self.infer_timeout,
            ready_timeout: self.ready_timeout,
        })
    }
}

#[derive(Serialize)]
struct InferRequest<'a> {
    inputs: &'a [TensorDescriptor],
}

#[derive(Deserialize)]
struct ReadyResponse {
    #[serde(default)]
    ready: bool,
}

impl TensorClient {
    /// Start configuring a client for the server at `base_url`.
    pub fn builder(base_url: impl Into<String>) -> TensorClientBuilder {
        TensorClientBuilder {
            base_url: base_url.into(),
            credentials: None,
            infer_timeout: DEFAULT_INFER_TIMEOUT,
            ready_timeout: DEFAULT_READY_TIMEOUT,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Run inference and return only the output tensors.
    pub async fn infer_outputs(
        &self,
        model: &str,
        inputs: &[TensorDescriptor],
    ) -> Result<Vec<TensorDescriptor>> {
        Ok(self.infer_response(model, inputs).await?.outputs)
    }

    #[instrument(skip(self, inputs), fields(operation = "infer", inputs = inputs.len()))]
    async fn infer_response(
        &self,
        model: &str,
        inputs: &[TensorDescriptor],
    ) -> Result<InferResponse> {
        let url = format!("{}/v2/models/{}/infer", self.base_url, model);
        let start = Instant::now();

        let result = async {
            let response = self
                .authorize(self.http.post(&url))
                .timeout(self.infer_timeout)
                .json(&InferRequest { inputs })
                .send()
                .await
                .map_err(|e| HuginnError::from_transport(e, self.infer_timeout))?;

            let response = Self::check_status(response).await?;

            let wire: WireInferResponse = response
                .json()
                .await
                .map_err(|e| HuginnError::Decode(e.to_string()))?;
            InferResponse::try_from(wire)
        }
        .await;

        telemetry::record_request("infer", model, start, result.is_ok());
        match &result {
            Ok(resp) => debug!(outputs = resp.outputs.len(), "infer succeeded"),
            Err(e) => warn!(error = %e, "infer failed"),
        }
        result
    }

    #[instrument(skip(self), fields(operation = "ready"))]
    async fn probe_ready(&self, model: &str) -> Result<bool> {
        let url = format!("{}/v2/models/{}/ready", self.base_url, model);
        let start = Instant::now();

        let result = async {
            let response = self
                .authorize(self.http.get(&url))
                .timeout(self.ready_timeout)
                .send()
                .await
                .map_err(|e| HuginnError::from_transport(e, self.ready_timeout))?;

            let response = Self::check_status(response).await?;

            let payload: ReadyResponse = response
                .json()
                .await
                .map_err(|e| HuginnError::Decode(format!("ready response: {e}")))?;
            Ok(payload.ready)
        }
        .await;

        telemetry::record_request("ready", model, start, result.is_ok());
        result
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Some(creds) => request
                .header(CLIENT_ID_HEADER, &creds.client_id)
                .header(CLIENT_SECRET_HEADER, &creds.client_secret),
            None => request,
        }
    }

    /// Pass successful responses through; turn anything else into `Api` with the body.
    async fn check_status(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let mut message = response.text().await.unwrap_or_default();
        if message.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !message.is_char_boundary(cut) {
                cut -= 1;
            }
            message.truncate(cut);
        }
        if message.is_empty() {
            message = status.to_string();
        }
        Err(HuginnError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl InferenceBackend for TensorClient {
    fn name(&self) -> &str {
        "tensor-http"
    }

    async fn infer(&self, model: &str, inputs: &[TensorDescriptor]) -> Result<InferResponse> {
        self.infer_response(model, inputs).await
    }

    async fn ready(&self, model: &str) -> Result<bool> {
        self.probe_ready(model).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_trims_trailing_slash() {
        let client = TensorClient::builder("http://triton:8000/").build().unwrap();
        assert_eq!(client.base_url(), "http://triton:8000");
    }

    #[test]
    fn credentials_debug_redacts_secret() {
        let creds = Credentials {
            client_id: "id".into(),
            client_secret: "hunter2".into(),
        };
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("id"));
        assert!(!rendered.contains("hunter2"));
    }
}
