//! Health signal for the extraction backend.
//!
//! Only health queries call this. The predict and extract paths never
//! wait on a readiness probe, so a slow backend shows up here first.

use std::fmt;

use tracing::{debug, warn};

use crate::extraction::Extractor;

/// Outcome of a readiness check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    NotReady(String),
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

impl fmt::Display for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => f.write_str("ready"),
            Self::NotReady(reason) => write!(f, "not ready: {reason}"),
        }
    }
}

/// Probes the extraction model's readiness endpoint.
#[derive(Debug, Clone)]
pub struct ReadinessGate {
    extractor: Extractor,
}

impl ReadinessGate {
    pub fn new(extractor: Extractor) -> Self {
        Self { extractor }
    }

    /// Probe the backend, bounded by the client's ready timeout.
    ///
    /// A disabled extractor is always ready.
    pub async fn check_ready(&self) -> Readiness {
        let Some(backend) = self.extractor.backend() else {
            return Readiness::Ready;
        };
        let model = self.extractor.model();

        match backend.ready(model).await {
            Ok(true) => {
                debug!(model, "extraction backend ready");
                Readiness::Ready
            }
            Ok(false) => {
                warn!(model, "extraction backend reports not ready");
                Readiness::NotReady(format!("model '{model}' is not ready"))
            }
            Err(e) => {
                warn!(model, error = %e, "readiness probe failed");
                Readiness::NotReady(e.to_string())
            }
        }
    }
}
