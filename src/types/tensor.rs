//! Typed tensors exchanged with the inference backend.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::{HuginnError, Result};

/// Element type of a tensor, as named by the backend protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    #[serde(rename = "INT64")]
    Int64,
    #[serde(rename = "FP32")]
    Fp32,
    #[serde(rename = "BYTES")]
    Bytes,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Int64 => "INT64",
            Self::Fp32 => "FP32",
            Self::Bytes => "BYTES",
        }
    }

    /// Parse the protocol name; unknown names are rejected.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "INT64" => Some(Self::Int64),
            "FP32" => Some(Self::Fp32),
            "BYTES" => Some(Self::Bytes),
            _ => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tensor contents. BYTES elements are held decoded; base64 only exists on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
    Int64(Vec<i64>),
    Fp32(Vec<f32>),
    Bytes(Vec<Vec<u8>>),
}

impl TensorData {
    pub fn len(&self) -> usize {
        match self {
            Self::Int64(v) => v.len(),
            Self::Fp32(v) => v.len(),
            Self::Bytes(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn datatype(&self) -> DataType {
        match self {
            Self::Int64(_) => DataType::Int64,
            Self::Fp32(_) => DataType::Fp32,
            Self::Bytes(_) => DataType::Bytes,
        }
    }
}

/// A named, shaped, typed tensor.
///
/// Built through the per-type constructors, which reject a shape whose
/// element count disagrees with the data before anything goes on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorDescriptor {
    name: String,
    shape: Vec<usize>,
    data: TensorData,
}

impl TensorDescriptor {
    fn checked(name: impl Into<String>, shape: Vec<usize>, data: TensorData) -> Result<Self> {
        let name = name.into();
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(HuginnError::InvalidInput(format!(
                "tensor '{name}' has shape {shape:?} ({expected} elements) but {} {} values",
                data.len(),
                data.datatype(),
            )));
        }
        Ok(Self { name, shape, data })
    }

    /// INT64 tensor.
    pub fn int64(name: impl Into<String>, shape: Vec<usize>, data: Vec<i64>) -> Result<Self> {
        Self::checked(name, shape, TensorData::Int64(data))
    }

    /// FP32 tensor.
    pub fn fp32(name: impl Into<String>, shape: Vec<usize>, data: Vec<f32>) -> Result<Self> {
        Self::checked(name, shape, TensorData::Fp32(data))
    }

    /// BYTES tensor, one binary element per slot.
    pub fn bytes(name: impl Into<String>, shape: Vec<usize>, data: Vec<Vec<u8>>) -> Result<Self> {
        Self::checked(name, shape, TensorData::Bytes(data))
    }

    /// Single-slot BYTES tensor of shape `[1]`.
    pub fn bytes_scalar(name: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            shape: vec![1],
            data: TensorData::Bytes(vec![payload.into()]),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn datatype(&self) -> DataType {
        self.data.datatype()
    }

    pub fn data(&self) -> &TensorData {
        &self.data
    }

    pub fn into_data(self) -> TensorData {
        self.data
    }

    /// FP32 view of the data, widening INT64 when a backend returns integers.
    pub fn as_f32(&self) -> Option<Vec<f32>> {
        match &self.data {
            TensorData::Fp32(v) => Some(v.clone()),
            TensorData::Int64(v) => Some(v.iter().map(|&x| x as f32).collect()),
            TensorData::Bytes(_) => None,
        }
    }

    /// First BYTES element, if this is a BYTES tensor.
    pub fn first_bytes(&self) -> Option<&[u8]> {
        match &self.data {
            TensorData::Bytes(v) => v.first().map(Vec::as_slice),
            _ => None,
        }
    }
}

// ============================================================================
// Wire form
// ============================================================================

/// JSON shape of a tensor inside the request/response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct WireTensor {
    pub name: String,
    #[serde(default)]
    pub shape: Vec<i64>,
    pub datatype: String,
    #[serde(default)]
    pub data: Vec<serde_json::Value>,
}

impl From<&TensorDescriptor> for WireTensor {
    fn from(tensor: &TensorDescriptor) -> Self {
        let data = match &tensor.data {
            TensorData::Int64(v) => v.iter().map(|&x| serde_json::Value::from(x)).collect(),
            TensorData::Fp32(v) => v.iter().map(|&x| serde_json::Value::from(x)).collect(),
            TensorData::Bytes(v) => v
                .iter()
                .map(|b| serde_json::Value::String(STANDARD.encode(b)))
                .collect(),
        };
        Self {
            name: tensor.name.clone(),
            shape: tensor.shape.iter().map(|&d| d as i64).collect(),
            datatype: tensor.datatype().as_str().to_string(),
            data,
        }
    }
}

impl TryFrom<WireTensor> for TensorDescriptor {
    type Error = HuginnError;

    fn try_from(wire: WireTensor) -> Result<Self> {
        let decode_err =
            |what: String| HuginnError::Decode(format!("output '{}': {what}", wire.name));

        let datatype = DataType::parse(&wire.datatype)
            .ok_or_else(|| decode_err(format!("unsupported datatype {}", wire.datatype)))?;

        let shape = wire
            .shape
            .iter()
            .map(|&d| usize::try_from(d).map_err(|_| decode_err(format!("negative dimension {d}"))))
            .collect::<Result<Vec<_>>>()?;

        let data = match datatype {
            DataType::Int64 => TensorData::Int64(
                wire.data
                    .iter()
                    .map(|v| v.as_i64().ok_or_else(|| decode_err(format!("non-integer {v}"))))
                    .collect::<Result<_>>()?,
            ),
            DataType::Fp32 => TensorData::Fp32(
                wire.data
                    .iter()
                    .map(|v| {
                        v.as_f64()
                            .map(|x| x as f32)
                            .ok_or_else(|| decode_err(format!("non-numeric {v}")))
                    })
                    .collect::<Result<_>>()?,
            ),
            DataType::Bytes => TensorData::Bytes(
                wire.data
                    .iter()
                    .map(|v| {
                        let s = v
                            .as_str()
                            .ok_or_else(|| decode_err(format!("non-string {v}")))?;
                        STANDARD
                            .decode(s)
                            .map_err(|e| decode_err(format!("invalid base64: {e}")))
                    })
                    .collect::<Result<_>>()?,
            ),
        };

        // Element count is not checked against the shape here; consumers
        // such as the NER decoder own that mismatch.
        Ok(TensorDescriptor {
            name: wire.name,
            shape,
            data,
        })
    }
}

impl Serialize for TensorDescriptor {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        WireTensor::from(self).serialize(serializer)
    }
}
