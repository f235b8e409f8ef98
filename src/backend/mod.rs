//! Quantization-kernel backend seam
//!
//! The layer module never computes anything itself: weight packing,
//! unpacking, and the convolution kernel live behind `ConvBackend`.
//! `ReferenceBackend` is the portable single-threaded implementation.

mod packed;
mod reference;

#[cfg(test)]
mod tests;

pub use packed::PackedWeight;
pub use reference::ReferenceBackend;

use crate::error::Result;
use crate::tensor::QTensor;

/// Structural and requantization parameters for one kernel invocation
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConvKernelParams {
    /// Stride `(sH, sW)`
    pub stride: (usize, usize),
    /// Zero padding `(pH, pW)`
    pub padding: (usize, usize),
    /// Dilation `(dH, dW)`
    pub dilation: (usize, usize),
    /// Number of convolution groups
    pub groups: usize,
    /// Affine scale of the output tensor
    pub output_scale: f32,
    /// Affine zero point of the output tensor
    pub output_zero_point: i32,
}

/// Compute backend for quantized convolution
///
/// Contract:
/// - `unpack(pack(w, g))` recovers `w` element-wise for every valid
///   weight tensor and groups value (round-trip law);
/// - `conv2d` dequantizes input and weight implicitly via their embedded
///   affine parameters, accumulates in a wider integer domain, and
///   requantizes into the output domain with round-to-nearest;
/// - backend failures are reported as errors, never panics.
pub trait ConvBackend {
    /// Opaque packed-weight representation, layout chosen by the backend
    type Packed: Clone;

    /// Rearrange a logical weight tensor (`[out_c, kH, kW, in_c/groups]`,
    /// QInt8) into the kernel's preferred layout
    fn pack(&self, weight: &QTensor, groups: usize) -> Result<Self::Packed>;

    /// Recover the logical weight tensor most recently given to `pack`
    fn unpack(&self, packed: &Self::Packed) -> Result<QTensor>;

    /// Quantized convolution: `(batch, in_c, H, W)` input against the
    /// packed weight and QInt32 bias, producing a `(batch, out_c, H_out,
    /// W_out)` QInt8 tensor tagged with the output affine parameters
    fn conv2d(
        &self,
        input: &QTensor,
        packed: &Self::Packed,
        bias: &QTensor,
        params: &ConvKernelParams,
    ) -> Result<QTensor>;
}
