//! Unconfirmed transaction engine error types
//!
//! Only precondition violations and configuration problems are errors.
//! Rejected, throttled and duplicate transactions are reported as
//! [`BatchOutcome`](crate::BatchOutcome) values instead.

use thiserror::Error;

/// Unconfirmed transaction engine errors
#[derive(Debug, Error)]
pub enum UtError {
    /// Inputs and outcomes are not positionally aligned
    #[error("length mismatch: {inputs} inputs, {outcomes} outcomes")]
    LengthMismatch {
        /// Number of inputs
        inputs: usize,
        /// Number of outcomes
        outcomes: usize,
    },

    /// Configuration file could not be read
    #[error("failed to read config: {0}")]
    ConfigIo(#[from] std::io::Error),

    /// Configuration file could not be parsed
    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration values are inconsistent
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// The dispatcher is no longer accepting batches
    #[error("dispatcher is shut down")]
    DispatcherClosed,
}

/// Result type for unconfirmed transaction engine operations
pub type UtResult<T> = Result<T, UtError>;
