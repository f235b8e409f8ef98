//! The quantized 2D convolution module

use crate::backend::{ConvBackend, ConvKernelParams};
use crate::error::{QuantError, Result};
use crate::tensor::{FloatScalar, IntScalar, QTensor, QuantDType};
use crate::trace::{TraceStep, TRACER};

use super::config::Conv2dConfig;
use super::state::Conv2dState;

/// Quantized 2D convolution layer (inference only)
///
/// Holds the weight exclusively in the backend's packed form; the
/// logical weight is a derived view. `weight()` unpacks on demand and
/// `set_weight()` immediately re-packs, so the packed buffer can never
/// diverge from the logical tensor.
///
/// A freshly constructed module carries placeholder weight and bias
/// (all zeros, scale 1, zero point 0) and output parameters scale 1.0 /
/// zero point 0; a calibration step is expected to overwrite them
/// before the first inference call.
///
/// Forward evaluation takes `&self` and mutators take `&mut self`:
/// concurrent reads are fine, concurrent mutation requires external
/// synchronization.
///
/// # Examples
/// ```
/// use cuantizar::backend::ReferenceBackend;
/// use cuantizar::conv::{Conv2dConfig, QuantizedConv2d};
/// use cuantizar::tensor::QTensor;
///
/// let config = Conv2dConfig::new(1, 1, 3).with_padding(1);
/// let mut conv = QuantizedConv2d::new(config, ReferenceBackend::new()).unwrap();
/// conv.set_output_scale(0.1);
/// conv.set_output_zero_point(0);
///
/// let input = QTensor::from_i8(vec![10i8; 64], vec![1, 1, 8, 8], 0.05, 0).unwrap();
/// let output = conv.forward(&input).unwrap();
/// assert_eq!(output.shape(), &[1, 1, 8, 8]);
/// ```
pub struct QuantizedConv2d<B: ConvBackend> {
    config: Conv2dConfig,
    backend: B,
    packed_weight: B::Packed,
    bias: QTensor,
    output_scale: FloatScalar,
    output_zero_point: IntScalar,
}

impl<B: ConvBackend> QuantizedConv2d<B> {
    /// Create a module with placeholder weight and bias
    ///
    /// Validates the structural parameters (the padding-mode check runs
    /// before anything else), allocates the placeholder tensors, and
    /// packs the placeholder weight through the backend.
    pub fn new(config: Conv2dConfig, backend: B) -> Result<Self> {
        config.validate()?;

        let weight = QTensor::zeros(&config.weight_shape(), QuantDType::QInt8);
        let bias = QTensor::zeros(&[config.out_channels], QuantDType::QInt32);
        let packed_weight = backend.pack(&weight, config.groups)?;

        Ok(Self {
            config,
            backend,
            packed_weight,
            bias,
            output_scale: FloatScalar::new(1.0),
            output_zero_point: IntScalar::new(0),
        })
    }

    /// Create a module from float weight and bias data
    ///
    /// The conversion step a model-assembly layer performs when turning
    /// a trained full-precision layer into a quantized one: weight data
    /// (logical layout `[out_c, kH, kW, in_c/groups]`) is calibrated to
    /// QInt8 and bias to QInt32 with symmetric min-max scales.
    pub fn from_float_weight(
        config: Conv2dConfig,
        backend: B,
        weight: &[f32],
        bias: &[f32],
    ) -> Result<Self> {
        let mut module = Self::new(config, backend)?;
        let qweight = TRACER.span(TraceStep::Quantize, "weight", || {
            QTensor::quantize_f32(weight, &module.config.weight_shape(), QuantDType::QInt8)
        })?;
        let qbias = TRACER.span(TraceStep::Quantize, "bias", || {
            QTensor::quantize_f32(bias, &[module.config.out_channels], QuantDType::QInt32)
        })?;
        module.set_weight(&qweight)?;
        module.set_bias(qbias)?;
        Ok(module)
    }

    /// Structural parameters
    pub fn config(&self) -> &Conv2dConfig {
        &self.config
    }

    /// The backend this module dispatches to
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Logical weight tensor, freshly unpacked from the packed buffer
    pub fn weight(&self) -> Result<QTensor> {
        self.backend.unpack(&self.packed_weight)
    }

    /// Replace the weight
    ///
    /// The tensor must match the logical shape `[out_c, kH, kW,
    /// in_c/groups]`; it is re-packed with the module's groups value and
    /// the packed buffer is replaced only after the pack succeeds.
    pub fn set_weight(&mut self, weight: &QTensor) -> Result<()> {
        let expected = self.config.weight_shape();
        if weight.dims() != expected {
            return Err(QuantError::InvalidShape(format!(
                "weight shape {:?} does not match expected {:?}",
                weight.dims(),
                expected
            )));
        }
        let packed = self.backend.pack(weight, self.config.groups)?;
        self.packed_weight = packed;
        Ok(())
    }

    /// Quantized bias vector
    pub fn bias(&self) -> &QTensor {
        &self.bias
    }

    /// Replace the bias (length `out_channels`, QInt32)
    pub fn set_bias(&mut self, bias: QTensor) -> Result<()> {
        if bias.dims() != [self.config.out_channels] {
            return Err(QuantError::InvalidShape(format!(
                "bias shape {:?} does not match [out_channels] = [{}]",
                bias.dims(),
                self.config.out_channels
            )));
        }
        if bias.dtype() != QuantDType::QInt32 {
            return Err(QuantError::InvalidShape("bias must be a QInt32 tensor".to_string()));
        }
        self.bias = bias;
        Ok(())
    }

    /// Output affine scale as a plain number
    pub fn output_scale(&self) -> f32 {
        self.output_scale.item()
    }

    /// Set the output affine scale (plain number or wrapped scalar)
    pub fn set_output_scale(&mut self, scale: impl Into<FloatScalar>) {
        self.output_scale = scale.into();
    }

    /// Output affine zero point as a plain number
    pub fn output_zero_point(&self) -> i32 {
        self.output_zero_point.item()
    }

    /// Set the output affine zero point (plain number or wrapped
    /// scalar; always normalized to an integer)
    pub fn set_output_zero_point(&mut self, zero_point: impl Into<IntScalar>) {
        self.output_zero_point = zero_point.into();
    }

    /// Forward evaluation
    ///
    /// Input: rank-4 `(batch, in_channels, H, W)` quantized tensor
    /// carrying its own (scale, zero_point). Output: rank-4 `(batch,
    /// out_channels, H_out, W_out)` tensor tagged with this module's
    /// output scale and zero point. Pure function of module state and
    /// input; preconditions fail before any backend call.
    pub fn forward(&self, input: &QTensor) -> Result<QTensor> {
        if input.rank() != 4 {
            return Err(QuantError::InvalidShape(format!(
                "input must be rank 4 (batch, channels, height, width), got rank {}",
                input.rank()
            )));
        }
        if input.dims()[1] != self.config.in_channels {
            return Err(QuantError::InvalidShape(format!(
                "input has {} channels, module expects {}",
                input.dims()[1],
                self.config.in_channels
            )));
        }

        let params = ConvKernelParams {
            stride: self.config.stride.hw(),
            padding: self.config.padding.hw(),
            dilation: self.config.dilation.hw(),
            groups: self.config.groups,
            output_scale: self.output_scale.item(),
            output_zero_point: self.output_zero_point.item(),
        };
        self.backend.conv2d(input, &self.packed_weight, &self.bias, &params)
    }

    /// Snapshot of the persisted fields
    pub fn state(&self) -> Conv2dState<B::Packed> {
        Conv2dState {
            packed_weight: self.packed_weight.clone(),
            bias: self.bias.clone(),
            output_scale: self.output_scale,
            output_zero_point: self.output_zero_point,
        }
    }

    /// Restore persisted fields from a snapshot
    ///
    /// The incoming packed weight is unpacked and checked against this
    /// module's structural parameters before anything is replaced; on
    /// error the module is left untouched.
    pub fn load_state(&mut self, state: Conv2dState<B::Packed>) -> Result<()> {
        let weight = self.backend.unpack(&state.packed_weight)?;
        let expected = self.config.weight_shape();
        if weight.dims() != expected {
            return Err(QuantError::InvalidShape(format!(
                "state weight shape {:?} does not match expected {:?}",
                weight.dims(),
                expected
            )));
        }
        if state.bias.dims() != [self.config.out_channels]
            || state.bias.dtype() != QuantDType::QInt32
        {
            return Err(QuantError::InvalidShape(format!(
                "state bias shape {:?} does not match [out_channels] = [{}]",
                state.bias.dims(),
                self.config.out_channels
            )));
        }

        self.packed_weight = state.packed_weight;
        self.bias = state.bias;
        self.output_scale = state.output_scale;
        self.output_zero_point = state.output_zero_point;
        Ok(())
    }
}

impl<B: ConvBackend> std::fmt::Debug for QuantizedConv2d<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuantizedConv2d")
            .field("in_channels", &self.config.in_channels)
            .field("out_channels", &self.config.out_channels)
            .field("kernel_size", &self.config.kernel_size)
            .field("stride", &self.config.stride)
            .field("padding", &self.config.padding)
            .field("dilation", &self.config.dilation)
            .field("groups", &self.config.groups)
            .field("output_scale", &self.output_scale.item())
            .field("output_zero_point", &self.output_zero_point.item())
            .finish()
    }
}
