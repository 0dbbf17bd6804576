//! # utx-primitives
//!
//! Primitive types for the UTX unconfirmed transaction engine.
//!
//! This crate provides the fixed-size byte types and the numeric newtypes
//! shared by the transaction model and the admission engine.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod fixed;
mod units;

pub use error::PrimitiveError;
pub use fixed::{Hash256, PublicKey, H256};
pub use units::{Amount, BlockFeeMultiplier, Height, Importance, Timestamp};
