//! Error types for quantized module construction and evaluation

use thiserror::Error;

/// Errors raised by quantized modules and their backends
#[derive(Debug, Error)]
pub enum QuantError {
    /// The requested configuration is not implemented by this kernel
    /// family (e.g. a non-zero padding mode). Raised at construction,
    /// never at forward time.
    #[error("Unsupported feature: {0}")]
    UnsupportedFeature(String),

    /// Tensor rank or shape does not match the module's structural
    /// expectation. Raised before any backend call.
    #[error("Invalid shape: {0}")]
    InvalidShape(String),

    /// A numeric parameter is outside its valid range (e.g. a
    /// non-positive quantization scale or a groups count that does not
    /// divide the channel counts).
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Opaque failure surfaced by the compute/pack/unpack backend.
    /// Propagated to the caller unmodified, never retried.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Result type for quantized module operations
pub type Result<T> = std::result::Result<T, QuantError>;
