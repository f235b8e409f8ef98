//! Affine-quantized tensor type

use serde::{Deserialize, Serialize};

use crate::error::{QuantError, Result};

/// Integer dtype of a quantized tensor
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuantDType {
    /// Signed 8-bit (weights, activations)
    QInt8,
    /// Signed 32-bit (bias, accumulators)
    QInt32,
}

impl QuantDType {
    /// Size of one element in bytes
    pub fn elem_bytes(&self) -> usize {
        match self {
            QuantDType::QInt8 => 1,
            QuantDType::QInt32 => 4,
        }
    }
}

/// Raw integer storage, tagged by width
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
enum QData {
    I8(Vec<i8>),
    I32(Vec<i32>),
}

/// Multi-dimensional affine-quantized tensor
///
/// The represented real value at each position is
/// `scale * (stored_integer - zero_point)`. Scale and zero point are
/// attached at construction and travel with the tensor; every consumer
/// reads them back from the tensor itself.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QTensor {
    data: QData,
    shape: Vec<usize>,
    scale: f32,
    zero_point: i32,
}

impl QTensor {
    /// Create a QInt8 tensor from raw values
    ///
    /// # Arguments
    /// * `data` - Quantized integer values, row-major
    /// * `shape` - Tensor shape; element count must match `data.len()`
    /// * `scale` - Positive scale factor
    /// * `zero_point` - Integer offset, within the i8 range
    pub fn from_i8(data: Vec<i8>, shape: Vec<usize>, scale: f32, zero_point: i32) -> Result<Self> {
        Self::validate(data.len(), &shape, scale)?;
        if !(-128..=127).contains(&zero_point) {
            return Err(QuantError::InvalidParameter(format!(
                "QInt8 zero point must be within [-128, 127], got {zero_point}"
            )));
        }
        Ok(Self { data: QData::I8(data), shape, scale, zero_point })
    }

    /// Create a QInt32 tensor from raw values
    pub fn from_i32(data: Vec<i32>, shape: Vec<usize>, scale: f32, zero_point: i32) -> Result<Self> {
        Self::validate(data.len(), &shape, scale)?;
        Ok(Self { data: QData::I32(data), shape, scale, zero_point })
    }

    /// Placeholder tensor: all zeros, scale 1, zero point 0
    ///
    /// This is the state a freshly constructed module carries before a
    /// calibration step overwrites it.
    pub fn zeros(shape: &[usize], dtype: QuantDType) -> Self {
        let numel: usize = shape.iter().product();
        let data = match dtype {
            QuantDType::QInt8 => QData::I8(vec![0i8; numel]),
            QuantDType::QInt32 => QData::I32(vec![0i32; numel]),
        };
        Self { data, shape: shape.to_vec(), scale: 1.0, zero_point: 0 }
    }

    /// Quantize float values with symmetric min-max calibration
    ///
    /// Scale is `max(|v|) / qmax` for the target dtype; zero point is 0.
    /// QInt8 targets the full signed range (qmax 127). QInt32 targets a
    /// 2^20 range so the scale stays representable in f32.
    pub fn quantize_f32(values: &[f32], shape: &[usize], dtype: QuantDType) -> Result<Self> {
        let numel: usize = shape.iter().product();
        if values.len() != numel {
            return Err(QuantError::InvalidShape(format!(
                "quantize_f32: {} values for shape {:?} ({} elements)",
                values.len(),
                shape,
                numel
            )));
        }

        let qmax = match dtype {
            QuantDType::QInt8 => 127.0f32,
            QuantDType::QInt32 => (1i64 << 20) as f32,
        };
        let max_abs = values
            .iter()
            .map(|v| v.abs())
            .max_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
            .unwrap_or(1e-8)
            .max(1e-8);
        let scale = max_abs / qmax;

        match dtype {
            QuantDType::QInt8 => {
                let data: Vec<i8> = values
                    .iter()
                    .map(|&v| (v / scale).round().clamp(-128.0, 127.0) as i8)
                    .collect();
                Self::from_i8(data, shape.to_vec(), scale, 0)
            }
            QuantDType::QInt32 => {
                let data: Vec<i32> = values
                    .iter()
                    .map(|&v| (v / scale).round().clamp(i32::MIN as f32, i32::MAX as f32) as i32)
                    .collect();
                Self::from_i32(data, shape.to_vec(), scale, 0)
            }
        }
    }

    fn validate(len: usize, shape: &[usize], scale: f32) -> Result<()> {
        let numel: usize = shape.iter().product();
        if len != numel {
            return Err(QuantError::InvalidShape(format!(
                "buffer has {len} elements, shape {shape:?} expects {numel}"
            )));
        }
        if !(scale > 0.0) || !scale.is_finite() {
            return Err(QuantError::InvalidParameter(format!(
                "scale must be a positive finite number, got {scale}"
            )));
        }
        Ok(())
    }

    /// Tensor shape
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Alias for `shape()` matching the conv layer vocabulary
    pub fn dims(&self) -> &[usize] {
        &self.shape
    }

    /// Number of dimensions
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Total number of elements
    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }

    /// Integer dtype tag
    pub fn dtype(&self) -> QuantDType {
        match self.data {
            QData::I8(_) => QuantDType::QInt8,
            QData::I32(_) => QuantDType::QInt32,
        }
    }

    /// Scale factor
    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Zero point offset
    pub fn zero_point(&self) -> i32 {
        self.zero_point
    }

    /// Raw i8 values, if this is a QInt8 tensor
    pub fn as_i8(&self) -> Option<&[i8]> {
        match &self.data {
            QData::I8(v) => Some(v),
            QData::I32(_) => None,
        }
    }

    /// Raw i32 values, if this is a QInt32 tensor
    pub fn as_i32(&self) -> Option<&[i32]> {
        match &self.data {
            QData::I8(_) => None,
            QData::I32(v) => Some(v),
        }
    }

    /// Widened element read at a flat index
    pub fn get(&self, idx: usize) -> i32 {
        match &self.data {
            QData::I8(v) => i32::from(v[idx]),
            QData::I32(v) => v[idx],
        }
    }

    /// Recover approximate real values: `scale * (q - zero_point)`
    pub fn dequantize(&self) -> Vec<f32> {
        let scale = self.scale;
        let zp = self.zero_point;
        match &self.data {
            QData::I8(v) => v.iter().map(|&q| (i32::from(q) - zp) as f32 * scale).collect(),
            QData::I32(v) => v.iter().map(|&q| (q - zp) as f32 * scale).collect(),
        }
    }

    /// Memory usage of the raw buffer plus calibration metadata
    pub fn memory_bytes(&self) -> usize {
        let data_bytes = self.numel() * self.dtype().elem_bytes();
        // scale (f32) + zero_point (i32)
        data_bytes + 8
    }
}
