//! Public types for the Huginn API.

mod encoding;
mod entity;
mod extraction;
mod labels;
mod tensor;

pub use encoding::TokenEncoding;
pub use entity::{Entity, PredictionResult, run_id};
pub use extraction::{ExtractionResult, Table};
pub(crate) use extraction::RawExtractionRecord;
pub use labels::{DEFAULT_LABELS, LabelSet};
pub use tensor::{DataType, TensorData, TensorDescriptor};
pub(crate) use tensor::WireTensor;
