//! Tests for the backend contract and the reference kernel.

use super::*;
use crate::error::QuantError;
use crate::tensor::{QTensor, QuantDType};

fn params(
    stride: usize,
    padding: usize,
    dilation: usize,
    groups: usize,
    output_scale: f32,
    output_zero_point: i32,
) -> ConvKernelParams {
    ConvKernelParams {
        stride: (stride, stride),
        padding: (padding, padding),
        dilation: (dilation, dilation),
        groups,
        output_scale,
        output_zero_point,
    }
}

// ── Pack / unpack ──

#[test]
fn test_pack_unpack_roundtrip_single_group() {
    let backend = ReferenceBackend::new();
    // [out_c=2, kH=2, kW=2, icg=3]
    let data: Vec<i8> = (0..24).map(|i| (i as i8) - 12).collect();
    let weight = QTensor::from_i8(data, vec![2, 2, 2, 3], 0.02, -1).unwrap();

    let packed = backend.pack(&weight, 1).unwrap();
    let recovered = backend.unpack(&packed).unwrap();
    assert_eq!(recovered, weight);
}

#[test]
fn test_pack_unpack_roundtrip_grouped() {
    let backend = ReferenceBackend::new();
    // [out_c=4, kH=1, kW=3, icg=2] with groups=2
    let data: Vec<i8> = (0..24).map(|i| ((i * 7) % 41) as i8 - 20).collect();
    let weight = QTensor::from_i8(data, vec![4, 1, 3, 2], 0.5, 3).unwrap();

    let packed = backend.pack(&weight, 2).unwrap();
    assert_eq!(packed.groups(), 2);
    assert_eq!(packed.logical_shape(), [4, 1, 3, 2]);

    let recovered = backend.unpack(&packed).unwrap();
    assert_eq!(recovered, weight);
}

#[test]
fn test_pack_actually_rearranges() {
    let backend = ReferenceBackend::new();
    // Two output channels: the packed layout interleaves them
    let weight = QTensor::from_i8(vec![1, 2, 3, 4], vec![2, 1, 1, 2], 1.0, 0).unwrap();
    let packed = backend.pack(&weight, 1).unwrap();
    assert_eq!(packed.buffer, vec![1, 3, 2, 4]);
}

#[test]
fn test_pack_rejects_bad_rank() {
    let backend = ReferenceBackend::new();
    let weight = QTensor::from_i8(vec![0; 8], vec![2, 4], 1.0, 0).unwrap();
    let err = backend.pack(&weight, 1).unwrap_err();
    assert!(matches!(err, QuantError::Backend(_)));
}

#[test]
fn test_pack_rejects_bad_dtype() {
    let backend = ReferenceBackend::new();
    let weight = QTensor::from_i32(vec![0; 8], vec![2, 1, 2, 2], 1.0, 0).unwrap();
    let err = backend.pack(&weight, 1).unwrap_err();
    assert!(matches!(err, QuantError::Backend(_)));
}

#[test]
fn test_pack_rejects_indivisible_groups() {
    let backend = ReferenceBackend::new();
    let weight = QTensor::from_i8(vec![0; 12], vec![3, 1, 2, 2], 1.0, 0).unwrap();
    let err = backend.pack(&weight, 2).unwrap_err();
    assert!(matches!(err, QuantError::Backend(_)));
}

// Corrupted persisted state deserializes into inconsistent metadata;
// the backend must reject it instead of panicking.

#[test]
fn test_unpack_rejects_zero_groups_metadata() {
    let backend = ReferenceBackend::new();
    let json = r#"{"buffer":[1,2,3,4],"shape":[2,1,1,2],"groups":0,"scale":1.0,"zero_point":0}"#;
    let packed: PackedWeight = serde_json::from_str(json).unwrap();
    let err = backend.unpack(&packed).unwrap_err();
    assert!(matches!(err, QuantError::Backend(_)));
}

#[test]
fn test_unpack_rejects_shape_buffer_mismatch() {
    let backend = ReferenceBackend::new();
    let json = r#"{"buffer":[1,2,3,4],"shape":[4,1,1,2],"groups":1,"scale":1.0,"zero_point":0}"#;
    let packed: PackedWeight = serde_json::from_str(json).unwrap();
    let err = backend.unpack(&packed).unwrap_err();
    assert!(matches!(err, QuantError::Backend(_)));
}

#[test]
fn test_conv_rejects_inconsistent_packed_metadata() {
    let backend = ReferenceBackend::new();
    let packed = PackedWeight {
        buffer: vec![1, 2],
        shape: [2, 1, 1, 2],
        groups: 1,
        scale: 1.0,
        zero_point: 0,
    };
    let bias = QTensor::zeros(&[2], QuantDType::QInt32);
    let input = QTensor::zeros(&[1, 2, 2, 2], QuantDType::QInt8);
    let err =
        backend.conv2d(&input, &packed, &bias, &params(1, 0, 1, 1, 1.0, 0)).unwrap_err();
    assert!(matches!(err, QuantError::Backend(_)));
}

// ── Kernel: numeric behavior ──

#[test]
fn test_conv_1x1_identity() {
    let backend = ReferenceBackend::new();
    // Real weight 1.0 stored as q=2 at scale 0.5
    let weight = QTensor::from_i8(vec![2], vec![1, 1, 1, 1], 0.5, 0).unwrap();
    let packed = backend.pack(&weight, 1).unwrap();
    let bias = QTensor::zeros(&[1], QuantDType::QInt32);

    let input = QTensor::from_i8(vec![10, -20, 30, 40], vec![1, 1, 2, 2], 0.1, 0).unwrap();
    let out = backend.conv2d(&input, &packed, &bias, &params(1, 0, 1, 1, 0.1, 0)).unwrap();

    // output_scale equals input scale, so q_out == q_in
    assert_eq!(out.shape(), &[1, 1, 2, 2]);
    assert_eq!(out.as_i8().unwrap(), &[10, -20, 30, 40]);
}

#[test]
fn test_conv_respects_input_zero_point() {
    let backend = ReferenceBackend::new();
    let weight = QTensor::from_i8(vec![2], vec![1, 1, 1, 1], 0.5, 0).unwrap();
    let packed = backend.pack(&weight, 1).unwrap();
    let bias = QTensor::zeros(&[1], QuantDType::QInt32);

    // q=5 with zp=5 is real 0.0, so the output must be the output zero point
    let input = QTensor::from_i8(vec![5], vec![1, 1, 1, 1], 0.1, 5).unwrap();
    let out = backend.conv2d(&input, &packed, &bias, &params(1, 0, 1, 1, 0.1, 3)).unwrap();
    assert_eq!(out.as_i8().unwrap(), &[3]);
}

#[test]
fn test_conv_bias_applied() {
    let backend = ReferenceBackend::new();
    // Zero weight, bias real value 1.0 (q=4 at scale 0.25)
    let weight = QTensor::from_i8(vec![0], vec![1, 1, 1, 1], 1.0, 0).unwrap();
    let packed = backend.pack(&weight, 1).unwrap();
    let bias = QTensor::from_i32(vec![4], vec![1], 0.25, 0).unwrap();

    let input = QTensor::from_i8(vec![7], vec![1, 1, 1, 1], 0.1, 0).unwrap();
    let out = backend.conv2d(&input, &packed, &bias, &params(1, 0, 1, 1, 0.5, 0)).unwrap();
    // round(1.0 / 0.5) = 2
    assert_eq!(out.as_i8().unwrap(), &[2]);
}

#[test]
fn test_conv_zero_padding_contributes_nothing() {
    let backend = ReferenceBackend::new();
    // 3x3 all-ones real weight (q=1, scale=1)
    let weight = QTensor::from_i8(vec![1; 9], vec![1, 3, 3, 1], 1.0, 0).unwrap();
    let packed = backend.pack(&weight, 1).unwrap();
    let bias = QTensor::zeros(&[1], QuantDType::QInt32);

    // 1x1 input of real 1.0 with padding 1: only the center tap lands
    let input = QTensor::from_i8(vec![1], vec![1, 1, 1, 1], 1.0, 0).unwrap();
    let out = backend.conv2d(&input, &packed, &bias, &params(1, 1, 1, 1, 1.0, 0)).unwrap();

    assert_eq!(out.shape(), &[1, 1, 1, 1]);
    assert_eq!(out.as_i8().unwrap(), &[1]);
}

#[test]
fn test_conv_grouped_channels_stay_separate() {
    let backend = ReferenceBackend::new();
    // groups=2, 2 in / 2 out channels, 1x1 kernels: each output channel
    // sees only its own group's input channel
    let weight = QTensor::from_i8(vec![1, 1], vec![2, 1, 1, 1], 1.0, 0).unwrap();
    let packed = backend.pack(&weight, 2).unwrap();
    let bias = QTensor::zeros(&[2], QuantDType::QInt32);

    let input = QTensor::from_i8(vec![10, 20], vec![1, 2, 1, 1], 1.0, 0).unwrap();
    let out = backend.conv2d(&input, &packed, &bias, &params(1, 0, 1, 2, 1.0, 0)).unwrap();
    assert_eq!(out.as_i8().unwrap(), &[10, 20]);
}

#[test]
fn test_conv_requantization_rounds_to_nearest() {
    let backend = ReferenceBackend::new();
    let weight = QTensor::from_i8(vec![1], vec![1, 1, 1, 1], 1.0, 0).unwrap();
    let packed = backend.pack(&weight, 1).unwrap();
    let bias = QTensor::zeros(&[1], QuantDType::QInt32);

    // real accumulation = 3.0; output scale 2.0 -> 1.5 rounds away from zero
    let input = QTensor::from_i8(vec![3], vec![1, 1, 1, 1], 1.0, 0).unwrap();
    let out = backend.conv2d(&input, &packed, &bias, &params(1, 0, 1, 1, 2.0, 0)).unwrap();
    assert_eq!(out.as_i8().unwrap(), &[2]);
}

#[test]
fn test_conv_output_clamped_to_i8() {
    let backend = ReferenceBackend::new();
    let weight = QTensor::from_i8(vec![100], vec![1, 1, 1, 1], 1.0, 0).unwrap();
    let packed = backend.pack(&weight, 1).unwrap();
    let bias = QTensor::zeros(&[1], QuantDType::QInt32);

    let input = QTensor::from_i8(vec![100], vec![1, 1, 1, 1], 1.0, 0).unwrap();
    let out = backend.conv2d(&input, &packed, &bias, &params(1, 0, 1, 1, 1.0, 0)).unwrap();
    assert_eq!(out.as_i8().unwrap(), &[127]);

    let input = QTensor::from_i8(vec![-100], vec![1, 1, 1, 1], 1.0, 0).unwrap();
    let out = backend.conv2d(&input, &packed, &bias, &params(1, 0, 1, 1, 1.0, 0)).unwrap();
    assert_eq!(out.as_i8().unwrap(), &[-128]);
}

// ── Kernel: shape and parameter errors ──

#[test]
fn test_conv_rejects_channel_mismatch() {
    let backend = ReferenceBackend::new();
    let weight = QTensor::from_i8(vec![0; 4], vec![2, 1, 1, 2], 1.0, 0).unwrap();
    let packed = backend.pack(&weight, 1).unwrap();
    let bias = QTensor::zeros(&[2], QuantDType::QInt32);

    // 3 input channels against a weight expecting 2
    let input = QTensor::zeros(&[1, 3, 2, 2], QuantDType::QInt8);
    let err =
        backend.conv2d(&input, &packed, &bias, &params(1, 0, 1, 1, 1.0, 0)).unwrap_err();
    assert!(matches!(err, QuantError::Backend(_)));
}

#[test]
fn test_conv_rejects_groups_mismatch() {
    let backend = ReferenceBackend::new();
    let weight = QTensor::from_i8(vec![0; 4], vec![2, 1, 1, 2], 1.0, 0).unwrap();
    let packed = backend.pack(&weight, 1).unwrap();
    let bias = QTensor::zeros(&[2], QuantDType::QInt32);

    let input = QTensor::zeros(&[1, 2, 2, 2], QuantDType::QInt8);
    let err =
        backend.conv2d(&input, &packed, &bias, &params(1, 0, 1, 2, 1.0, 0)).unwrap_err();
    assert!(matches!(err, QuantError::Backend(_)));
}

#[test]
fn test_conv_rejects_undersized_input() {
    let backend = ReferenceBackend::new();
    let weight = QTensor::from_i8(vec![0; 9], vec![1, 3, 3, 1], 1.0, 0).unwrap();
    let packed = backend.pack(&weight, 1).unwrap();
    let bias = QTensor::zeros(&[1], QuantDType::QInt32);

    let input = QTensor::zeros(&[1, 1, 2, 2], QuantDType::QInt8);
    let err =
        backend.conv2d(&input, &packed, &bias, &params(1, 0, 1, 1, 1.0, 0)).unwrap_err();
    assert!(matches!(err, QuantError::Backend(_)));
}

#[test]
fn test_conv_rejects_nonpositive_output_scale() {
    let backend = ReferenceBackend::new();
    let weight = QTensor::from_i8(vec![0], vec![1, 1, 1, 1], 1.0, 0).unwrap();
    let packed = backend.pack(&weight, 1).unwrap();
    let bias = QTensor::zeros(&[1], QuantDType::QInt32);

    let input = QTensor::zeros(&[1, 1, 1, 1], QuantDType::QInt8);
    let err =
        backend.conv2d(&input, &packed, &bias, &params(1, 0, 1, 1, 0.0, 0)).unwrap_err();
    assert!(matches!(err, QuantError::Backend(_)));
}

// ── Output tagging ──

#[test]
fn test_conv_output_carries_output_affine_params() {
    let backend = ReferenceBackend::new();
    let weight = QTensor::from_i8(vec![1], vec![1, 1, 1, 1], 0.3, 2).unwrap();
    let packed = backend.pack(&weight, 1).unwrap();
    let bias = QTensor::zeros(&[1], QuantDType::QInt32);

    let input = QTensor::from_i8(vec![4], vec![1, 1, 1, 1], 0.7, -3).unwrap();
    let out = backend.conv2d(&input, &packed, &bias, &params(1, 0, 1, 1, 0.125, 9)).unwrap();

    // Output affine params come from the kernel invocation, not the input
    assert_eq!(out.scale(), 0.125);
    assert_eq!(out.zero_point(), 9);
    assert_eq!(out.dtype(), QuantDType::QInt8);
}

#[test]
fn test_packed_weight_serde_roundtrip() {
    let backend = ReferenceBackend::new();
    let weight = QTensor::from_i8(vec![1, -2, 3, -4], vec![1, 2, 2, 1], 0.25, 1).unwrap();
    let packed = backend.pack(&weight, 1).unwrap();

    let json = serde_json::to_string(&packed).unwrap();
    let back: PackedWeight = serde_json::from_str(&json).unwrap();
    assert_eq!(packed, back);
    assert_eq!(backend.unpack(&back).unwrap(), weight);
}
