//! Huginn - NER inference bridge for an annotation tool
//!
//! This crate sits between a text-annotation tool and a tensor-serving
//! inference backend. It turns raw text (or documents, via a
//! document-understanding model) into token tensors, calls the backend,
//! and decodes per-token logits into labelled character spans.
//!
//! # Prediction Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use huginn::{Huginn, PredictRequest, TensorClient, WhitespaceTokenizer};
//!
//! #[tokio::main]
//! async fn main() -> huginn::Result<()> {
//!     let gateway = Huginn::builder()
//!         .tensor_client(TensorClient::builder("http://localhost:8000").build()?)
//!         .tokenizer(Arc::new(WhitespaceTokenizer))
//!         .build()?;
//!
//!     let outcome = gateway
//!         .predict(PredictRequest::text("VESSEL: Arctic Explorer IMO: 1234567"))
//!         .await?;
//!
//!     for entity in &outcome.entities().expect("ner task").entities {
//!         println!("{} {:?} ({:.2})", entity.label, entity.text, entity.confidence);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Document Extraction Example
//!
//! ```rust,no_run
//! use huginn::{Huginn, TensorClient, WhitespaceTokenizer};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> huginn::Result<()> {
//!     let gateway = Huginn::builder()
//!         .tensor_client(TensorClient::builder("http://localhost:8000").build()?)
//!         .tokenizer(Arc::new(WhitespaceTokenizer))
//!         .extraction("docling_granite_python")
//!         .build()?;
//!
//!     let pdf = std::fs::read("manifest.pdf").expect("read pdf");
//!     let extracted = gateway.extractor().extract(&pdf, "manifest.pdf").await?;
//!     println!("{} words, {} tables", extracted.word_count, extracted.tables.len());
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod extraction;
pub mod gateway;
pub mod ner;
pub mod protocol;
pub mod readiness;
#[cfg(feature = "server")]
pub mod server;
pub mod sinks;
pub mod telemetry;
pub mod tokenizer;
pub mod types;
mod version;

// Re-export main types at crate root
pub use error::{ErrorCode, ExtractionError, HuginnError, Result};
pub use extraction::Extractor;
pub use gateway::{
    Huginn, HuginnBuilder, NerGateway, PredictOutcome, PredictRequest, SetupInfo, TaskPrediction,
    TrainReceipt,
};
pub use ner::NerDecoder;
pub use protocol::{InferResponse, InferenceBackend, TensorClient};
pub use readiness::{Readiness, ReadinessGate};
pub use tokenizer::{TokenizerProvider, TokenizerSource, WhitespaceTokenizer};
pub use version::{GIT_BRANCH, GIT_SHA, PKG_VERSION, git_dirty, version_string};

// Re-export tokenizer types when feature is enabled
#[cfg(feature = "hf-tokenizer")]
pub use tokenizer::HfTokenizer;

// Re-export all types
pub use types::{
    DataType, Entity, ExtractionResult, LabelSet, PredictionResult, Table, TensorData,
    TensorDescriptor, TokenEncoding,
};
