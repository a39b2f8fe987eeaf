//! Token encodings produced by a tokenizer.

use serde::{Deserialize, Serialize};

use super::tensor::TensorDescriptor;
use crate::{HuginnError, Result};

/// Sub-word tokenization of one text.
///
/// Offsets are `(start, end)` UTF-8 byte ranges into the original text.
/// Special tokens carry a zero-width offset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenEncoding {
    token_ids: Vec<i64>,
    tokens: Vec<String>,
    offsets: Vec<(usize, usize)>,
    attention_mask: Vec<i64>,
}

impl TokenEncoding {
    /// Build an encoding; all four arrays must have the same length.
    pub fn new(
        token_ids: Vec<i64>,
        tokens: Vec<String>,
        offsets: Vec<(usize, usize)>,
        attention_mask: Vec<i64>,
    ) -> Result<Self> {
        let n = token_ids.len();
        if tokens.len() != n || offsets.len() != n || attention_mask.len() != n {
            return Err(HuginnError::InvalidInput(format!(
                "token encoding length mismatch: ids={n}, tokens={}, offsets={}, mask={}",
                tokens.len(),
                offsets.len(),
                attention_mask.len()
            )));
        }
        Ok(Self {
            token_ids,
            tokens,
            offsets,
            attention_mask,
        })
    }

    pub fn len(&self) -> usize {
        self.token_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.token_ids.is_empty()
    }

    pub fn token_ids(&self) -> &[i64] {
        &self.token_ids
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn offsets(&self) -> &[(usize, usize)] {
        &self.offsets
    }

    pub fn attention_mask(&self) -> &[i64] {
        &self.attention_mask
    }

    /// `input_ids` and `attention_mask` INT64 tensors of shape `[1, n]`.
    pub fn input_tensors(&self) -> Result<Vec<TensorDescriptor>> {
        let shape = vec![1, self.len()];
        Ok(vec![
            TensorDescriptor::int64("input_ids", shape.clone(), self.token_ids.clone())?,
            TensorDescriptor::int64("attention_mask", shape, self.attention_mask.clone())?,
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_ragged_arrays() {
        let result = TokenEncoding::new(
            vec![101, 102],
            vec!["[CLS]".into()],
            vec![(0, 0), (0, 0)],
            vec![1, 1],
        );
        assert!(matches!(result, Err(HuginnError::InvalidInput(_))));
    }

    #[test]
    fn input_tensors_are_batch_of_one() {
        let encoding = TokenEncoding::new(
            vec![101, 7592, 102],
            vec!["[CLS]".into(), "hello".into(), "[SEP]".into()],
            vec![(0, 0), (0, 5), (0, 0)],
            vec![1, 1, 1],
        )
        .unwrap();
        let tensors = encoding.input_tensors().unwrap();
        assert_eq!(tensors[0].name(), "input_ids");
        assert_eq!(tensors[0].shape(), &[1, 3]);
        assert_eq!(tensors[1].name(), "attention_mask");
    }
}
