//! Affine-quantized tensor runtime
//!
//! Tensors store fixed-width integers together with the (scale,
//! zero_point) calibration pair that maps them back to real values:
//! `real = scale * (q - zero_point)`.

mod qtensor;
mod scalar;


pub use qtensor::{QTensor, QuantDType};
pub use scalar::{FloatScalar, IntScalar};
