//! # utx-txpool
//!
//! Unconfirmed transaction admission for UTX.
//!
//! This crate provides:
//! - Batch outcome classification and aggregation
//! - Importance based spam throttling
//! - The batch updater that admits new, existing and reverted transactions
//! - An in-memory unconfirmed transactions cache
//! - TOML configuration, metrics and an async dispatcher
//!
//! ## Architecture
//!
//! ```text
//! +------------------+
//! |   UtDispatcher   |  <- Async producers (network callbacks)
//! +------------------+
//!          |
//! +------------------+
//! |    UtUpdater     |  <- Single writer: fee check, throttle, validation
//! +------------------+
//!     |          |
//! +---------+ +-------------------+
//! | UtCache | | ExecutionPipeline |
//! +---------+ +-------------------+
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use utx_txpool::{MemoryUtCache, UtConfig, UtUpdater};
//!
//! let config = UtConfig::load("utx.toml")?;
//! let updater = UtUpdater::new(&config, cache, state, pipeline, sink);
//! let summary = updater.update_new(infos);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod cache;
mod config;
mod dispatcher;
mod error;
mod metrics;
mod result;
mod throttle;
mod updater;
mod validator;

pub use cache::{MemoryUtCache, UtCache};
pub use config::{SpamThrottlingSection, UtConfig};
pub use dispatcher::{UtDispatcher, UtDispatcherHandle};
pub use error::{UtError, UtResult};
pub use metrics::{MetricsSnapshot, UpdaterMetrics};
pub use result::{aggregate, filter, BatchOutcome, BatchSummary, DeferReason, RejectReason};
pub use throttle::{
    BondedPredicate, CapacityThrottle, ImportanceView, SpamThrottle, SpamThrottleConfig, ThrottleSnapshot,
    TransactionSource, TransactionThrottle,
};
pub use updater::{ConfirmedState, FailureSink, TimeSupplier, UtUpdater};
pub use validator::{ExecutionContext, ExecutionPipeline, ValidationCode, ValidationResult};
