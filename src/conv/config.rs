//! Convolution parameter surface and validation
//!
//! Shared structural-parameter logic: scalar-or-pair normalization,
//! groups/channel divisibility checks, and the output shape formula.

use serde::{Deserialize, Serialize};

use crate::error::{QuantError, Result};

/// A normalized `(height, width)` parameter pair
///
/// Convolution parameters accept either a scalar (broadcast to both
/// spatial dimensions) or an explicit pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pair(pub usize, pub usize);

impl Pair {
    /// The `(height, width)` tuple
    pub fn hw(&self) -> (usize, usize) {
        (self.0, self.1)
    }
}

impl From<usize> for Pair {
    fn from(v: usize) -> Self {
        Pair(v, v)
    }
}

impl From<(usize, usize)> for Pair {
    fn from((h, w): (usize, usize)) -> Self {
        Pair(h, w)
    }
}

impl From<[usize; 2]> for Pair {
    fn from([h, w]: [usize; 2]) -> Self {
        Pair(h, w)
    }
}

/// How padding values are produced at the borders
///
/// The quantized kernel family implements zero padding only; every
/// other mode is rejected at construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PaddingMode {
    /// Pad with the real value zero (the quantized input's zero point)
    #[default]
    Zeros,
    /// Reflect the input at the borders (unsupported)
    Reflect,
    /// Replicate the border values (unsupported)
    Replicate,
    /// Wrap around the input (unsupported)
    Circular,
}

/// Structural parameters of a 2D convolution
///
/// Fixed at module construction and immutable thereafter.
///
/// # Examples
/// ```
/// use cuantizar::conv::Conv2dConfig;
///
/// let config = Conv2dConfig::new(16, 32, 3).with_stride(2).with_padding(1);
/// assert_eq!(config.weight_shape(), [32, 3, 3, 16]);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conv2dConfig {
    /// Number of input channels (C_in)
    pub in_channels: usize,
    /// Number of output channels / filters (C_out)
    pub out_channels: usize,
    /// Spatial size of each filter
    pub kernel_size: Pair,
    /// Stride of the convolution
    pub stride: Pair,
    /// Zero padding added on both sides of each spatial dimension
    pub padding: Pair,
    /// Spacing between kernel taps
    pub dilation: Pair,
    /// Number of independent convolution groups
    pub groups: usize,
    /// Border padding mode
    pub padding_mode: PaddingMode,
}

impl Conv2dConfig {
    /// Create a config with the defaults of the full-precision surface:
    /// stride 1, padding 0, dilation 1, groups 1, zero padding.
    pub fn new(in_channels: usize, out_channels: usize, kernel_size: impl Into<Pair>) -> Self {
        Self {
            in_channels,
            out_channels,
            kernel_size: kernel_size.into(),
            stride: Pair(1, 1),
            padding: Pair(0, 0),
            dilation: Pair(1, 1),
            groups: 1,
            padding_mode: PaddingMode::Zeros,
        }
    }

    /// Set the stride (scalar or pair)
    pub fn with_stride(mut self, stride: impl Into<Pair>) -> Self {
        self.stride = stride.into();
        self
    }

    /// Set the padding (scalar or pair)
    pub fn with_padding(mut self, padding: impl Into<Pair>) -> Self {
        self.padding = padding.into();
        self
    }

    /// Set the dilation (scalar or pair)
    pub fn with_dilation(mut self, dilation: impl Into<Pair>) -> Self {
        self.dilation = dilation.into();
        self
    }

    /// Set the number of groups
    pub fn with_groups(mut self, groups: usize) -> Self {
        self.groups = groups;
        self
    }

    /// Set the padding mode
    pub fn with_padding_mode(mut self, padding_mode: PaddingMode) -> Self {
        self.padding_mode = padding_mode;
        self
    }

    /// Validate the structural parameters
    ///
    /// The padding-mode check runs first: an unsupported mode fails with
    /// `UnsupportedFeature` regardless of the numeric parameters.
    pub fn validate(&self) -> Result<()> {
        if self.padding_mode != PaddingMode::Zeros {
            return Err(QuantError::UnsupportedFeature(format!(
                "quantized kernels implement zero-padding only, got {:?}",
                self.padding_mode
            )));
        }
        if self.in_channels == 0 || self.out_channels == 0 {
            return Err(QuantError::InvalidParameter(format!(
                "channel counts must be positive, got in={} out={}",
                self.in_channels, self.out_channels
            )));
        }
        if self.groups == 0 {
            return Err(QuantError::InvalidParameter("groups must be positive".to_string()));
        }
        if self.in_channels % self.groups != 0 {
            return Err(QuantError::InvalidParameter(format!(
                "groups ({}) must evenly divide in_channels ({})",
                self.groups, self.in_channels
            )));
        }
        if self.out_channels % self.groups != 0 {
            return Err(QuantError::InvalidParameter(format!(
                "groups ({}) must evenly divide out_channels ({})",
                self.groups, self.out_channels
            )));
        }
        if self.kernel_size.0 == 0 || self.kernel_size.1 == 0 {
            return Err(QuantError::InvalidParameter("kernel_size must be >= 1".to_string()));
        }
        if self.stride.0 == 0 || self.stride.1 == 0 {
            return Err(QuantError::InvalidParameter("stride must be >= 1".to_string()));
        }
        if self.dilation.0 == 0 || self.dilation.1 == 0 {
            return Err(QuantError::InvalidParameter("dilation must be >= 1".to_string()));
        }
        Ok(())
    }

    /// Logical weight shape: `[out_channels, kH, kW, in_channels/groups]`
    pub fn weight_shape(&self) -> [usize; 4] {
        [
            self.out_channels,
            self.kernel_size.0,
            self.kernel_size.1,
            self.in_channels / self.groups,
        ]
    }

    /// Output spatial size for a given input spatial size
    ///
    /// Fails with `InvalidShape` when the padded input is smaller than
    /// the dilated kernel footprint.
    pub fn output_hw(&self, input_hw: (usize, usize)) -> Result<(usize, usize)> {
        let h = conv_output_dim(
            input_hw.0,
            self.kernel_size.0,
            self.padding.0,
            self.stride.0,
            self.dilation.0,
        );
        let w = conv_output_dim(
            input_hw.1,
            self.kernel_size.1,
            self.padding.1,
            self.stride.1,
            self.dilation.1,
        );
        match (h, w) {
            (Some(h), Some(w)) => Ok((h, w)),
            _ => Err(QuantError::InvalidShape(format!(
                "input {}x{} too small for kernel {}x{} (padding {:?}, dilation {:?})",
                input_hw.0,
                input_hw.1,
                self.kernel_size.0,
                self.kernel_size.1,
                self.padding,
                self.dilation
            ))),
        }
    }
}

/// Output size of one spatial dimension:
/// `floor((input + 2*padding - dilation*(kernel-1) - 1) / stride) + 1`
///
/// Returns `None` for a zero kernel or stride, or when the padded input
/// does not cover a single kernel footprint.
pub fn conv_output_dim(
    input: usize,
    kernel: usize,
    padding: usize,
    stride: usize,
    dilation: usize,
) -> Option<usize> {
    if kernel == 0 || stride == 0 {
        return None;
    }
    let padded = input + 2 * padding;
    let footprint = dilation * (kernel - 1) + 1;
    if padded < footprint {
        return None;
    }
    Some((padded - footprint) / stride + 1)
}
