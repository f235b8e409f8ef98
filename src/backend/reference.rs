//! Portable reference implementation of the backend contract
//!
//! Single-threaded, no SIMD. Accumulates `(q_in - zp_in) * (q_w - zp_w)`
//! products in i32 and requantizes with round-to-nearest into the
//! output affine domain.

use crate::conv::conv_output_dim;
use crate::error::{QuantError, Result};
use crate::tensor::{QTensor, QuantDType};
use crate::trace::{TraceStep, TRACER};

use super::{ConvBackend, ConvKernelParams, PackedWeight};

/// Reference compute backend
#[derive(Clone, Copy, Debug, Default)]
pub struct ReferenceBackend;

impl ReferenceBackend {
    /// Create a reference backend
    pub fn new() -> Self {
        Self
    }
}

impl ConvBackend for ReferenceBackend {
    type Packed = PackedWeight;

    fn pack(&self, weight: &QTensor, groups: usize) -> Result<PackedWeight> {
        TRACER.span(TraceStep::Pack, format!("{:?}", weight.shape()), || {
            if weight.rank() != 4 {
                return Err(QuantError::Backend(format!(
                    "pack expects a rank-4 weight [out_c, kH, kW, in_c/groups], got rank {}",
                    weight.rank()
                )));
            }
            if weight.dtype() != QuantDType::QInt8 {
                return Err(QuantError::Backend("pack expects a QInt8 weight".to_string()));
            }
            let dims = weight.dims();
            let shape = [dims[0], dims[1], dims[2], dims[3]];
            let [oc, kh, kw, icg] = shape;
            if groups == 0 || oc % groups != 0 {
                return Err(QuantError::Backend(format!(
                    "unsupported group/channel combination: groups {groups}, out_channels {oc}"
                )));
            }

            let data = weight
                .as_i8()
                .ok_or_else(|| QuantError::Backend("weight buffer is not i8".to_string()))?;
            let ocg = oc / groups;
            let panel = kh * kw * icg; // rows per group panel
            let mut buffer = vec![0i8; data.len()];

            // Per-group panels with output channels interleaved innermost
            for g in 0..groups {
                for oc_local in 0..ocg {
                    let oc_abs = g * ocg + oc_local;
                    let logical_base = oc_abs * panel;
                    let packed_base = g * panel * ocg;
                    for r in 0..panel {
                        buffer[packed_base + r * ocg + oc_local] = data[logical_base + r];
                    }
                }
            }

            Ok(PackedWeight {
                buffer,
                shape,
                groups,
                scale: weight.scale(),
                zero_point: weight.zero_point(),
            })
        })
    }

    fn unpack(&self, packed: &PackedWeight) -> Result<QTensor> {
        TRACER.span(TraceStep::Unpack, format!("{:?}", packed.shape), || {
            validate_packed(packed)?;
            let [oc, kh, kw, icg] = packed.shape;
            let ocg = oc / packed.groups;
            let panel = kh * kw * icg;
            let mut data = vec![0i8; packed.buffer.len()];

            for g in 0..packed.groups {
                for oc_local in 0..ocg {
                    let oc_abs = g * ocg + oc_local;
                    let logical_base = oc_abs * panel;
                    let packed_base = g * panel * ocg;
                    for r in 0..panel {
                        data[logical_base + r] = packed.buffer[packed_base + r * ocg + oc_local];
                    }
                }
            }

            QTensor::from_i8(data, packed.shape.to_vec(), packed.scale, packed.zero_point)
        })
    }

    fn conv2d(
        &self,
        input: &QTensor,
        packed: &PackedWeight,
        bias: &QTensor,
        params: &ConvKernelParams,
    ) -> Result<QTensor> {
        TRACER.span(TraceStep::Conv2d, format!("{:?}", input.shape()), || {
            kernel(input, packed, bias, params)
        })
    }
}

/// Check a packed weight's metadata for internal consistency.
///
/// Packed weights can arrive from deserialized state rather than this
/// backend's own `pack`, so the group/channel relationship and the
/// buffer length must be re-established before any index arithmetic.
fn validate_packed(packed: &PackedWeight) -> Result<()> {
    let [oc, kh, kw, icg] = packed.shape;
    if packed.groups == 0 || oc % packed.groups != 0 {
        return Err(QuantError::Backend(format!(
            "packed weight carries groups {} for out_channels {oc}",
            packed.groups
        )));
    }
    let expected = oc * kh * kw * icg;
    if packed.buffer.len() != expected {
        return Err(QuantError::Backend(format!(
            "packed buffer has {} elements, shape {:?} expects {expected}",
            packed.buffer.len(),
            packed.shape
        )));
    }
    Ok(())
}

/// The quantized convolution kernel proper
fn kernel(
    input: &QTensor,
    packed: &PackedWeight,
    bias: &QTensor,
    params: &ConvKernelParams,
) -> Result<QTensor> {
    if input.rank() != 4 {
        return Err(QuantError::Backend(format!(
            "kernel expects a rank-4 input, got rank {}",
            input.rank()
        )));
    }
    let in_data = input
        .as_i8()
        .ok_or_else(|| QuantError::Backend("kernel expects a QInt8 input".to_string()))?;
    let bias_data = bias
        .as_i32()
        .ok_or_else(|| QuantError::Backend("kernel expects a QInt32 bias".to_string()))?;
    validate_packed(packed)?;

    let [oc_total, kh, kw, icg] = packed.shape;
    let groups = params.groups;
    if groups != packed.groups {
        return Err(QuantError::Backend(format!(
            "weight was packed with groups {}, kernel invoked with groups {}",
            packed.groups, groups
        )));
    }
    let ocg = oc_total / groups;

    let dims = input.dims();
    let (batch, c_in, h_in, w_in) = (dims[0], dims[1], dims[2], dims[3]);
    if c_in != groups * icg {
        return Err(QuantError::Backend(format!(
            "input has {c_in} channels, weight expects {} (groups {groups} x {icg})",
            groups * icg
        )));
    }
    if bias_data.len() != oc_total {
        return Err(QuantError::Backend(format!(
            "bias has {} entries, expected out_channels {oc_total}",
            bias_data.len()
        )));
    }
    if !(params.output_scale > 0.0) || !params.output_scale.is_finite() {
        return Err(QuantError::Backend(format!(
            "output scale must be a positive finite number, got {}",
            params.output_scale
        )));
    }

    let (sh, sw) = params.stride;
    let (ph, pw) = params.padding;
    let (dh, dw) = params.dilation;
    let h_out = conv_output_dim(h_in, kh, ph, sh, dh)
        .ok_or_else(|| QuantError::Backend(format!("input {h_in} too small for kernel {kh}")))?;
    let w_out = conv_output_dim(w_in, kw, pw, sw, dw)
        .ok_or_else(|| QuantError::Backend(format!("input {w_in} too small for kernel {kw}")))?;

    let in_scale = input.scale();
    let in_zp = input.zero_point();
    let w_scale = packed.scale;
    let w_zp = packed.zero_point;
    let bias_scale = bias.scale();
    let bias_zp = bias.zero_point();

    let panel = kh * kw * icg;
    let mut out = vec![0i8; batch * oc_total * h_out * w_out];

    for b in 0..batch {
        for g in 0..groups {
            let packed_base = g * panel * ocg;
            for oc_local in 0..ocg {
                let oc_abs = g * ocg + oc_local;
                let bias_real =
                    (i64::from(bias_data[oc_abs]) - i64::from(bias_zp)) as f32 * bias_scale;
                for oh in 0..h_out {
                    for ow in 0..w_out {
                        let mut acc: i32 = 0;
                        for kh_i in 0..kh {
                            let ih = (oh * sh + kh_i * dh) as isize - ph as isize;
                            if ih < 0 || ih >= h_in as isize {
                                // Zero-padding: padded taps contribute
                                // scale*(zp - zp) = 0
                                continue;
                            }
                            for kw_i in 0..kw {
                                let iw = (ow * sw + kw_i * dw) as isize - pw as isize;
                                if iw < 0 || iw >= w_in as isize {
                                    continue;
                                }
                                let in_base = ((b * c_in + g * icg) * h_in + ih as usize) * w_in
                                    + iw as usize;
                                let row_base = (kh_i * kw + kw_i) * icg;
                                for ic in 0..icg {
                                    let q_in =
                                        i32::from(in_data[in_base + ic * h_in * w_in]);
                                    let q_w = i32::from(
                                        packed.buffer
                                            [packed_base + (row_base + ic) * ocg + oc_local],
                                    );
                                    acc += (q_in - in_zp) * (q_w - w_zp);
                                }
                            }
                        }
                        let real = acc as f32 * in_scale * w_scale + bias_real;
                        let q = (real / params.output_scale).round() as i32
                            + params.output_zero_point;
                        let out_idx = ((b * oc_total + oc_abs) * h_out + oh) * w_out + ow;
                        out[out_idx] = q.clamp(-128, 127) as i8;
                    }
                }
            }
        }
    }

    QTensor::from_i8(
        out,
        vec![batch, oc_total, h_out, w_out],
        params.output_scale,
        params.output_zero_point,
    )
}
