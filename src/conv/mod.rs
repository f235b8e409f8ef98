//! Quantized 2D convolution layer
//!
//! `QuantizedConv2d` performs integer-arithmetic convolution over
//! affinely-quantized tensors. The packed weight held by the module is
//! the single source of truth for the logical weight: reads unpack it
//! on demand, writes re-pack and replace it.

mod config;
mod quantized;
mod state;


pub use config::{conv_output_dim, Conv2dConfig, PaddingMode, Pair};
pub use quantized::QuantizedConv2d;
pub use state::Conv2dState;
