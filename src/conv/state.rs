//! Persisted module state
//!
//! The fields a serialized module carries are enumerated explicitly
//! here rather than discovered through any registration mechanism; the
//! struct is the serialization contract.

use serde::{Deserialize, Serialize};

use crate::tensor::{FloatScalar, IntScalar, QTensor};

/// Snapshot of a `QuantizedConv2d`'s persisted fields
///
/// Structural parameters are not part of the state: a module is
/// reconstructed from its config first, then `load_state` validates the
/// snapshot against it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Conv2dState<P> {
    /// Backend-packed weight buffer
    pub packed_weight: P,
    /// Quantized bias vector
    pub bias: QTensor,
    /// Output affine scale
    pub output_scale: FloatScalar,
    /// Output affine zero point
    pub output_zero_point: IntScalar,
}
