//! Ordered NER label sets.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{HuginnError, Result};

/// Default label list of the maritime NER model.
pub const DEFAULT_LABELS: &[&str] = &[
    "O",
    "VESSEL",
    "HS_CODE",
    "PORT",
    "SPECIES",
    "IMO",
    "FLAG",
    "RISK_LEVEL",
    "DATE",
];

/// Ordered, immutable label list. Index 0 is the non-entity label.
///
/// Cloning shares the underlying storage; a different label set means a
/// new `LabelSet`, never an in-place edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct LabelSet(Arc<[String]>);

impl LabelSet {
    /// Build a label set. Must be non-empty and free of duplicates.
    pub fn new<I, S>(labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        if labels.is_empty() {
            return Err(HuginnError::Configuration(
                "label set must contain at least the non-entity label".to_string(),
            ));
        }
        for (i, label) in labels.iter().enumerate() {
            if labels[..i].contains(label) {
                return Err(HuginnError::Configuration(format!(
                    "duplicate label '{label}' at index {i}"
                )));
            }
        }
        Ok(Self(labels.into()))
    }

    /// Parse a JSON array such as `["O","VESSEL"]`.
    pub fn from_json(json: &str) -> Result<Self> {
        let labels: Vec<String> = serde_json::from_str(json).map_err(|e| {
            HuginnError::Configuration(format!("label list must be a JSON array of strings: {e}"))
        })?;
        Self::new(labels)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    /// The reserved non-entity label (index 0).
    pub fn non_entity(&self) -> &str {
        &self.0[0]
    }

    pub fn is_non_entity(&self, index: usize) -> bool {
        index == 0
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl Default for LabelSet {
    fn default() -> Self {
        Self(DEFAULT_LABELS.iter().map(|s| s.to_string()).collect())
    }
}

impl TryFrom<Vec<String>> for LabelSet {
    type Error = HuginnError;

    fn try_from(labels: Vec<String>) -> Result<Self> {
        Self::new(labels)
    }
}

impl From<LabelSet> for Vec<String> {
    fn from(labels: LabelSet) -> Self {
        labels.0.to_vec()
    }
}
