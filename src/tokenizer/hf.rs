//! HuggingFace tokenizers implementation.

use std::path::Path;

use super::TokenizerProvider;
use crate::error::{HuginnError, Result};
use crate::types::TokenEncoding;

/// HuggingFace tokenizers implementation.
pub struct HfTokenizer {
    inner: tokenizers::Tokenizer,
}

impl HfTokenizer {
    /// Load tokenizer from HuggingFace Hub.
    ///
    /// Downloads the tokenizer if not cached locally.
    pub fn from_hub(repo_id: &str) -> Result<Self> {
        let api = hf_hub::api::sync::Api::new().map_err(|e| {
            HuginnError::Configuration(format!("Failed to initialize HF API: {}", e))
        })?;

        let tokenizer_path = api.model(repo_id.to_string()).get("tokenizer.json").map_err(|e| {
            HuginnError::Configuration(format!(
                "Failed to download tokenizer from {}: {}",
                repo_id, e
            ))
        })?;

        Self::from_file(&tokenizer_path)
    }

    /// Load tokenizer from local file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let inner = tokenizers::Tokenizer::from_file(path).map_err(|e| {
            HuginnError::Configuration(format!(
                "Failed to load tokenizer from {:?}: {}",
                path, e
            ))
        })?;

        Ok(Self { inner })
    }
}

impl std::fmt::Debug for HfTokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HfTokenizer")
            .field("vocab_size", &self.inner.get_vocab_size(true))
            .finish()
    }
}

impl TokenizerProvider for HfTokenizer {
    fn encode(&self, text: &str) -> Result<TokenEncoding> {
        let encoding = self
            .inner
            .encode(text, true)
            .map_err(|e| HuginnError::Tokenization(e.to_string()))?;

        TokenEncoding::new(
            encoding.get_ids().iter().map(|&id| i64::from(id)).collect(),
            encoding.get_tokens().to_vec(),
            encoding.get_offsets().to_vec(),
            encoding
                .get_attention_mask()
                .iter()
                .map(|&m| i64::from(m))
                .collect(),
        )
    }
}
