//! Text → token encoding.
//!
//! The decoder needs ids, token strings, byte offsets into the original
//! text and an attention mask. Anything that can produce those implements
//! [`TokenizerProvider`].

#[cfg(feature = "hf-tokenizer")]
mod hf;

#[cfg(feature = "hf-tokenizer")]
pub use hf::HfTokenizer;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::TokenEncoding;

/// Trait for tokenizer implementations.
pub trait TokenizerProvider: Send + Sync {
    /// Encode `text`, including the model's boundary tokens.
    fn encode(&self, text: &str) -> Result<TokenEncoding>;
}

/// Where to load a tokenizer from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenizerSource {
    /// HuggingFace Hub repository containing `tokenizer.json`.
    HuggingFace { repo_id: String },
    /// Local `tokenizer.json`.
    Local { path: PathBuf },
}

impl TokenizerSource {
    /// Load the tokenizer this source points at.
    #[cfg(feature = "hf-tokenizer")]
    pub fn load(&self) -> Result<HfTokenizer> {
        match self {
            Self::HuggingFace { repo_id } => HfTokenizer::from_hub(repo_id),
            Self::Local { path } => HfTokenizer::from_file(path),
        }
    }
}

/// Lower-cased whitespace tokenizer wrapped in `[CLS]`/`[SEP]`.
///
/// Ids are positional. Useful for wiring tests and for models served
/// behind a server-side tokenizer where only offsets matter.
#[derive(Debug, Clone, Default)]
pub struct WhitespaceTokenizer;

impl TokenizerProvider for WhitespaceTokenizer {
    fn encode(&self, text: &str) -> Result<TokenEncoding> {
        let mut tokens = vec!["[CLS]".to_string()];
        let mut offsets = vec![(0, 0)];

        let mut start = None;
        for (idx, ch) in text.char_indices() {
            match (ch.is_whitespace(), start) {
                (false, None) => start = Some(idx),
                (true, Some(s)) => {
                    tokens.push(text[s..idx].to_lowercase());
                    offsets.push((s, idx));
                    start = None;
                }
                _ => {}
            }
        }
        if let Some(s) = start {
            tokens.push(text[s..].to_lowercase());
            offsets.push((s, text.len()));
        }

        tokens.push("[SEP]".to_string());
        offsets.push((0, 0));

        let n = tokens.len();
        TokenEncoding::new((0..n as i64).collect(), tokens, offsets, vec![1; n])
    }
}
