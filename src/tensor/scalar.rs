//! Single-element scalar containers for output quantization parameters
//!
//! The backend kernel signature takes quantization parameters as
//! one-element buffers. Module setters accept either a plain number or
//! an already-wrapped container; both normalize to the same internal
//! representation here.

use serde::{Deserialize, Serialize};

/// One-element float container (internal storage for `output_scale`)
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FloatScalar([f32; 1]);

impl FloatScalar {
    /// Wrap a float value
    pub fn new(value: f32) -> Self {
        Self([value])
    }

    /// Unwrap to a plain number
    pub fn item(&self) -> f32 {
        self.0[0]
    }
}

impl From<f32> for FloatScalar {
    fn from(value: f32) -> Self {
        Self::new(value)
    }
}

impl From<f64> for FloatScalar {
    fn from(value: f64) -> Self {
        Self::new(value as f32)
    }
}

/// One-element integer container (internal storage for
/// `output_zero_point`)
///
/// Every inbound numeric form is converted to an integer
/// representation: float inputs are rounded to the nearest integer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntScalar([i32; 1]);

impl IntScalar {
    /// Wrap an integer value
    pub fn new(value: i32) -> Self {
        Self([value])
    }

    /// Unwrap to a plain number
    pub fn item(&self) -> i32 {
        self.0[0]
    }
}

impl From<i32> for IntScalar {
    fn from(value: i32) -> Self {
        Self::new(value)
    }
}

impl From<i64> for IntScalar {
    fn from(value: i64) -> Self {
        Self::new(value as i32)
    }
}

impl From<f32> for IntScalar {
    fn from(value: f32) -> Self {
        Self::new(value.round() as i32)
    }
}

impl From<f64> for IntScalar {
    fn from(value: f64) -> Self {
        Self::new(value.round() as i32)
    }
}

impl From<FloatScalar> for IntScalar {
    fn from(value: FloatScalar) -> Self {
        Self::new(value.item().round() as i32)
    }
}
