//! Cuantizar: integer-arithmetic quantized inference layers
//!
//! Provides a quantized 2D convolution module over affinely-quantized
//! tensors (`real = scale * (q - zero_point)`), with weight storage in
//! a backend-packed layout:
//! - [`conv::QuantizedConv2d`] - the layer: packed weight, quantized
//!   bias, output affine parameters, forward evaluation
//! - [`backend::ConvBackend`] - the pack/unpack/compute seam, with a
//!   portable [`backend::ReferenceBackend`]
//! - [`tensor::QTensor`] - the quantized-tensor runtime
//!
//! Inference only: no gradients, no training support.
//!
//! # Example
//!
//! ```
//! use cuantizar::backend::ReferenceBackend;
//! use cuantizar::conv::{Conv2dConfig, QuantizedConv2d};
//! use cuantizar::tensor::QTensor;
//!
//! // 3x3 conv, 2 -> 4 channels, calibrated from float data
//! let config = Conv2dConfig::new(2, 4, 3).with_padding(1);
//! let weight: Vec<f32> = (0..4 * 3 * 3 * 2).map(|i| (i as f32 * 0.1).sin() * 0.2).collect();
//! let bias = vec![0.05, -0.05, 0.1, 0.0];
//! let mut conv =
//!     QuantizedConv2d::from_float_weight(config, ReferenceBackend::new(), &weight, &bias)
//!         .unwrap();
//! conv.set_output_scale(0.05);
//!
//! let input = QTensor::quantize_f32(&vec![0.5; 2 * 36], &[1, 2, 6, 6], cuantizar::tensor::QuantDType::QInt8).unwrap();
//! let output = conv.forward(&input).unwrap();
//! assert_eq!(output.shape(), &[1, 4, 6, 6]);
//! ```

pub mod backend;
pub mod conv;
pub mod error;
pub mod tensor;
pub mod trace;

pub use backend::{ConvBackend, ConvKernelParams, PackedWeight, ReferenceBackend};
pub use conv::{Conv2dConfig, Conv2dState, PaddingMode, QuantizedConv2d};
pub use error::{QuantError, Result};
pub use tensor::{FloatScalar, IntScalar, QTensor, QuantDType};
