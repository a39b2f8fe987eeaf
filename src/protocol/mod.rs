//! Tensor inference protocol.
//!
//! The backend speaks the generic JSON tensor protocol: `POST
//! {base}/v2/models/{model}/infer` with `{"inputs": [tensor...]}` and a
//! response carrying `{"outputs": [tensor...]}`, plus `GET
//! {base}/v2/models/{model}/ready` answering `{"ready": bool}`.
//!
//! Components depend on the [`InferenceBackend`] trait rather than on the
//! HTTP client, so tests and alternative transports can stand in for it.

mod client;

pub use client::{Credentials, TensorClient, TensorClientBuilder};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::types::{TensorDescriptor, WireTensor};

/// Header carrying the client id half of the static credential pair.
pub const CLIENT_ID_HEADER: &str = "CF-Access-Client-Id";
/// Header carrying the secret half of the static credential pair.
pub const CLIENT_SECRET_HEADER: &str = "CF-Access-Client-Secret";

/// Decoded response of an infer call.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InferResponse {
    pub model_name: String,
    pub model_version: String,
    pub outputs: Vec<TensorDescriptor>,
}

impl InferResponse {
    /// Output tensor by name.
    pub fn output(&self, name: &str) -> Option<&TensorDescriptor> {
        self.outputs.iter().find(|t| t.name() == name)
    }

    /// Output by name, or the first output when no tensor carries that name.
    pub fn output_or_first(&self, name: &str) -> Option<&TensorDescriptor> {
        self.output(name).or_else(|| self.outputs.first())
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireInferResponse {
    #[serde(default)]
    pub model_name: String,
    #[serde(default)]
    pub model_version: String,
    #[serde(default)]
    pub outputs: Vec<WireTensor>,
}

impl TryFrom<WireInferResponse> for InferResponse {
    type Error = crate::HuginnError;

    fn try_from(wire: WireInferResponse) -> Result<Self> {
        Ok(Self {
            model_name: wire.model_name,
            model_version: wire.model_version,
            outputs: wire
                .outputs
                .into_iter()
                .map(TensorDescriptor::try_from)
                .collect::<Result<_>>()?,
        })
    }
}

/// A remote service exposing tensor-in/tensor-out inference for named models.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Backend name for logging/debugging.
    fn name(&self) -> &str;

    /// Run one inference call. Never retried.
    async fn infer(&self, model: &str, inputs: &[TensorDescriptor]) -> Result<InferResponse>;

    /// Whether `model` is currently serving.
    async fn ready(&self, model: &str) -> Result<bool>;
}
