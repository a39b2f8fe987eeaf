//! Builder for configuring gateway instances

use std::sync::Arc;

use tracing::warn;

use super::{GatewayInner, NerGateway};
use crate::extraction::Extractor;
use crate::ner::NerDecoder;
use crate::protocol::{InferenceBackend, TensorClient};
use crate::readiness::ReadinessGate;
use crate::sinks::{DryRunDispatcher, JobDispatcher, ObjectStore, TableSink, TrainingJobTemplate};
use crate::tokenizer::TokenizerProvider;
use crate::types::LabelSet;
use crate::{HuginnError, Result};

/// Default backend model serving token classification.
pub const DEFAULT_NER_MODEL: &str = "ner-distilbert";
/// Default model id reported on predictions.
pub const DEFAULT_MODEL_ID: &str = "bert-base-uncased";
/// Default model version advertised by `setup`.
pub const DEFAULT_MODEL_VERSION: &str = "huginn-ner-v1";
/// Default run id prefix.
pub const DEFAULT_RUN_PREFIX: &str = "huginn";

/// Main entry point for creating gateway instances.
pub struct Huginn;

impl Huginn {
    /// Create a new builder for configuring the gateway.
    pub fn builder() -> HuginnBuilder {
        HuginnBuilder::new()
    }
}

/// Builder for configuring gateway instances.
pub struct HuginnBuilder {
    backend: Option<Arc<dyn InferenceBackend>>,
    backend_url: String,
    tokenizer: Option<Arc<dyn TokenizerProvider>>,
    labels: LabelSet,
    special_tokens: Option<Vec<String>>,
    model_id: String,
    ner_model: String,
    model_version: String,
    run_prefix: String,
    extraction_model: Option<String>,
    object_store: Option<Arc<dyn ObjectStore>>,
    tables: Option<TableSink>,
    training: TrainingJobTemplate,
    dispatcher: Option<Arc<dyn JobDispatcher>>,
    train_async: bool,
    train_dry_run: bool,
    hf_token: Option<String>,
}

impl HuginnBuilder {
    pub fn new() -> Self {
        Self {
            backend: None,
            backend_url: String::new(),
            tokenizer: None,
            labels: LabelSet::default(),
            special_tokens: None,
            model_id: DEFAULT_MODEL_ID.to_string(),
            ner_model: DEFAULT_NER_MODEL.to_string(),
            model_version: DEFAULT_MODEL_VERSION.to_string(),
            run_prefix: DEFAULT_RUN_PREFIX.to_string(),
            extraction_model: None,
            object_store: None,
            tables: None,
            training: TrainingJobTemplate::default(),
            dispatcher: None,
            train_async: true,
            train_dry_run: false,
            hf_token: None,
        }
    }

    /// Use a tensor protocol client as the inference backend.
    pub fn tensor_client(mut self, client: TensorClient) -> Self {
        self.backend_url = client.base_url().to_string();
        self.backend = Some(Arc::new(client));
        self
    }

    /// Use any inference backend.
    pub fn backend(mut self, backend: Arc<dyn InferenceBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Backend URL handed to training jobs.
    pub fn backend_url(mut self, url: impl Into<String>) -> Self {
        self.backend_url = url.into();
        self
    }

    pub fn tokenizer(mut self, tokenizer: Arc<dyn TokenizerProvider>) -> Self {
        self.tokenizer = Some(tokenizer);
        self
    }

    pub fn labels(mut self, labels: LabelSet) -> Self {
        self.labels = labels;
        self
    }

    /// Override the structural token list used by the decoder.
    pub fn special_tokens<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.special_tokens = Some(tokens.into_iter().map(Into::into).collect());
        self
    }

    pub fn model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    pub fn ner_model(mut self, model: impl Into<String>) -> Self {
        self.ner_model = model.into();
        self
    }

    pub fn model_version(mut self, version: impl Into<String>) -> Self {
        self.model_version = version.into();
        self
    }

    pub fn run_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.run_prefix = prefix.into();
        self
    }

    /// Enable document extraction through `model` on the same backend.
    pub fn extraction(mut self, model: impl Into<String>) -> Self {
        self.extraction_model = Some(model.into());
        self
    }

    /// Object store used to fetch `s3://` task documents.
    pub fn object_store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.object_store = Some(store);
        self
    }

    /// Upload extracted tables (and notify) after document predictions.
    pub fn tables(mut self, sink: TableSink) -> Self {
        self.tables = Some(sink);
        self
    }

    pub fn training(mut self, template: TrainingJobTemplate) -> Self {
        self.training = template;
        self
    }

    pub fn dispatcher(mut self, dispatcher: Arc<dyn JobDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Dispatch training jobs in the background (default) or inline.
    pub fn train_async(mut self, enabled: bool) -> Self {
        self.train_async = enabled;
        self
    }

    /// Log training jobs instead of dispatching them.
    pub fn train_dry_run(mut self, enabled: bool) -> Self {
        self.train_dry_run = enabled;
        self
    }

    /// Hub token passed to training jobs when no secret reference is configured.
    pub fn hf_token(mut self, token: impl Into<String>) -> Self {
        self.hf_token = Some(token.into());
        self
    }

    /// Build the gateway.
    pub fn build(self) -> Result<NerGateway> {
        let backend = self.backend.ok_or_else(|| {
            HuginnError::Configuration("no inference backend configured".to_string())
        })?;
        let tokenizer = self
            .tokenizer
            .ok_or_else(|| HuginnError::Configuration("no tokenizer configured".to_string()))?;

        let extractor = match self.extraction_model {
            Some(model) => Extractor::new(backend.clone(), model),
            None => Extractor::disabled(),
        };

        let mut decoder = NerDecoder::new(self.labels, self.model_id);
        if let Some(tokens) = self.special_tokens {
            decoder = decoder.with_special_tokens(tokens);
        }

        let dispatcher: Arc<dyn JobDispatcher> = match (self.train_dry_run, self.dispatcher) {
            (false, Some(dispatcher)) => dispatcher,
            (true, _) => Arc::new(DryRunDispatcher),
            (false, None) => {
                warn!("no training dispatcher configured, training requests will only be logged");
                Arc::new(DryRunDispatcher)
            }
        };

        Ok(NerGateway {
            inner: Arc::new(GatewayInner {
                backend,
                backend_url: self.backend_url,
                tokenizer,
                decoder,
                readiness: ReadinessGate::new(extractor.clone()),
                extractor,
                ner_model: self.ner_model,
                model_version: self.model_version,
                run_prefix: self.run_prefix,
                object_store: self.object_store,
                tables: self.tables,
                training: self.training,
                dispatcher,
                train_async: self.train_async,
                train_dry_run: self.train_dry_run,
                hf_token: self.hf_token,
            }),
        })
    }
}

impl Default for HuginnBuilder {
    fn default() -> Self {
        Self::new()
    }
}
