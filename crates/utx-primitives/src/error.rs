//! Primitive parsing errors

use thiserror::Error;

/// Error parsing a fixed-size byte type
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PrimitiveError {
    /// Input is not valid hex
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    /// Input decodes to the wrong number of bytes
    #[error("invalid {kind} length: expected 32 bytes, got {got}")]
    InvalidLength {
        /// Name of the type being parsed
        kind: &'static str,
        /// Actual length in bytes
        got: usize,
    },
}
