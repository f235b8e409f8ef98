//! Packed weight representation of the reference backend

use serde::{Deserialize, Serialize};

/// Weight tensor rearranged for the reference kernel's access pattern
///
/// The logical `[out_c, kH, kW, in_c/groups]` tensor is stored as one
/// contiguous panel per group with output channels interleaved
/// innermost, the layout the kernel's inner loop walks sequentially.
/// The buffer is opaque to everything except the backend's own
/// pack/unpack pair.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PackedWeight {
    pub(crate) buffer: Vec<i8>,
    /// Logical shape the buffer was packed from
    pub(crate) shape: [usize; 4],
    pub(crate) groups: usize,
    pub(crate) scale: f32,
    pub(crate) zero_point: i32,
}

impl PackedWeight {
    /// Groups value the weight was packed with
    pub fn groups(&self) -> usize {
        self.groups
    }

    /// Logical shape of the weight this packing represents
    pub fn logical_shape(&self) -> [usize; 4] {
        self.shape
    }

    /// Memory usage of the packed buffer plus metadata
    pub fn memory_bytes(&self) -> usize {
        // buffer + shape/groups (5 usize) + scale/zero_point
        self.buffer.len() + 5 * std::mem::size_of::<usize>() + 8
    }
}
