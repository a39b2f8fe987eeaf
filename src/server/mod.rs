//! HTTP service surface.
//!
//! This module provides:
//! - The axum router and its handlers (`routes`)
//! - Error-to-response mapping (`error`)
//! - Annotation-tool result types (`convert`)
//! - Configuration types (`config`)

pub mod config;
pub mod convert;
pub mod error;
mod routes;

pub use config::{Config, Secrets};
pub use convert::{LabelStudioPrediction, LabelStudioResponse, LabelStudioResult};
pub use error::ApiError;
pub use routes::router;
