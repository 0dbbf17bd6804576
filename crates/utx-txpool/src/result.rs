//! Batch outcome classification
//!
//! Every transaction offered in a batch is assigned exactly one
//! [`BatchOutcome`]. Outcomes are positionally aligned with the batch and
//! are summarized by [`aggregate`] or used to select the admitted inputs by
//! [`filter`].

use crate::error::{UtError, UtResult};
use crate::validator::ValidationCode;
use serde::Serialize;
use std::fmt;
use std::ops::{Add, AddAssign};
use utx_primitives::BlockFeeMultiplier;

/// Why a transaction was rejected. Rejections are forwarded to the failure sink.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectReason {
    /// Fee multiplier is below the configured minimum
    FeeTooLow {
        /// Fee multiplier offered by the transaction
        multiplier: BlockFeeMultiplier,
        /// Configured minimum
        minimum: BlockFeeMultiplier,
    },
    /// The validation pipeline reported a failure
    ValidationFailed(ValidationCode),
}

/// Why a transaction was declined for now. Deferred transactions are dropped silently.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeferReason {
    /// The spam throttle declined the transaction
    Throttled,
    /// A transaction with the same hash is already in the pool
    AlreadyPresent,
    /// The validation pipeline returned a neutral result
    Neutral(ValidationCode),
}

/// Outcome of offering one transaction to the pool
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BatchOutcome {
    /// The transaction was inserted into the pool
    Admitted,
    /// The transaction was declined but may be resubmitted later
    Deferred(DeferReason),
    /// The transaction was rejected
    Rejected(RejectReason),
}

impl BatchOutcome {
    /// Anything that is not explicitly deferred or rejected counts as success
    pub fn is_success_like(&self) -> bool {
        match self {
            BatchOutcome::Admitted => true,
            BatchOutcome::Deferred(_) | BatchOutcome::Rejected(_) => false,
        }
    }

    /// Rejection reason, if the outcome is a rejection
    pub fn reject_reason(&self) -> Option<&RejectReason> {
        match self {
            BatchOutcome::Rejected(reason) => Some(reason),
            BatchOutcome::Admitted | BatchOutcome::Deferred(_) => None,
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::FeeTooLow { multiplier, minimum } => {
                write!(f, "fee too low: multiplier {} < minimum {}", multiplier, minimum)
            }
            RejectReason::ValidationFailed(code) => write!(f, "validation failed: {}", code),
        }
    }
}

impl fmt::Display for DeferReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeferReason::Throttled => write!(f, "throttled"),
            DeferReason::AlreadyPresent => write!(f, "already present"),
            DeferReason::Neutral(code) => write!(f, "neutral: {}", code),
        }
    }
}

/// Counts of each outcome class in a batch
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    /// Number of admitted (or success-like) outcomes
    pub admitted: usize,
    /// Number of deferred outcomes
    pub deferred: usize,
    /// Number of rejected outcomes
    pub rejected: usize,
}

impl BatchSummary {
    /// Create a summary from explicit counts
    pub const fn new(admitted: usize, deferred: usize, rejected: usize) -> Self {
        Self {
            admitted,
            deferred,
            rejected,
        }
    }

    /// Total number of outcomes
    pub fn total(&self) -> usize {
        self.admitted + self.deferred + self.rejected
    }
}

impl Add for BatchSummary {
    type Output = BatchSummary;

    fn add(self, rhs: Self) -> Self {
        BatchSummary {
            admitted: self.admitted + rhs.admitted,
            deferred: self.deferred + rhs.deferred,
            rejected: self.rejected + rhs.rejected,
        }
    }
}

impl AddAssign for BatchSummary {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

/// Count the outcomes of a batch
pub fn aggregate(outcomes: &[BatchOutcome]) -> BatchSummary {
    let mut summary = BatchSummary::default();
    for outcome in outcomes {
        match outcome {
            BatchOutcome::Rejected(_) => summary.rejected += 1,
            BatchOutcome::Deferred(_) => summary.deferred += 1,
            BatchOutcome::Admitted => summary.admitted += 1,
        }
    }

    summary
}

/// Keep the inputs whose aligned outcome is success-like, preserving order.
///
/// Ownership of the kept inputs moves into the returned vector; the others are dropped.
/// Fails with [`UtError::LengthMismatch`] if the slices are not aligned.
pub fn filter<T>(inputs: Vec<T>, outcomes: &[BatchOutcome]) -> UtResult<Vec<T>> {
    if inputs.len() != outcomes.len() {
        return Err(UtError::LengthMismatch {
            inputs: inputs.len(),
            outcomes: outcomes.len(),
        });
    }

    Ok(inputs
        .into_iter()
        .zip(outcomes)
        .filter_map(|(input, outcome)| outcome.is_success_like().then_some(input))
        .collect())
}
