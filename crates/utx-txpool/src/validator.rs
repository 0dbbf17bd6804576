//! Validation pipeline contract
//!
//! Stateless and stateful validation plus state observation live outside this
//! crate. The updater only needs the severity of the result and a way to
//! restart the pipeline's working ledger view after a block is committed.

use std::fmt;
use utx_primitives::{Height, Timestamp};
use utx_types::TransactionInfo;

/// Raw validation result code reported by the pipeline
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ValidationCode(pub u32);

impl fmt::Display for ValidationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

/// Result of validating and observing one transaction
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValidationResult {
    /// Valid; its state changes were applied to the working view
    Success,
    /// Not applicable right now; not admitted and not reported
    Neutral(ValidationCode),
    /// Invalid; not admitted and reported to the failure sink
    Failure(ValidationCode),
}

impl ValidationResult {
    /// Check for success
    pub fn is_success(&self) -> bool {
        matches!(self, ValidationResult::Success)
    }
}

/// Context passed to every validation in a batch
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExecutionContext {
    /// Height of the block the transaction would be confirmed in
    pub height: Height,
    /// Time used for deadline checks
    pub block_time: Timestamp,
}

/// Validates transactions against the working (unconfirmed) ledger view
pub trait ExecutionPipeline: Send {
    /// Validate `info` and, if it is valid, observe its effects into the working view.
    ///
    /// A transaction that fails part way must leave the working view unchanged.
    fn execute(&mut self, info: &TransactionInfo, context: &ExecutionContext) -> ValidationResult;

    /// Discard the working view and restart it from the latest confirmed state
    fn rebase(&mut self);
}
