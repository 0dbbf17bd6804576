//! # utx-types
//!
//! Transaction types for the UTX unconfirmed transaction engine.
//!
//! This crate provides:
//! - [`Transaction`](transaction::Transaction) - Signed transaction header and payload
//! - [`TransactionInfo`](transaction::TransactionInfo) - Transaction plus its hashes, the unit of admission

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod transaction;

pub use transaction::{EntityType, Transaction, TransactionInfo, TRANSACTION_HEADER_SIZE};
