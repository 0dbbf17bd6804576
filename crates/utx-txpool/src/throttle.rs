//! Spam throttle
//!
//! Decides whether a transaction may occupy space in the unconfirmed
//! transactions cache. Once the cache holds more than a block's worth of
//! transactions, every signer gets an allowance proportional to its
//! importance (boosted by the fee it pays) that shrinks exponentially as the
//! cache fills up:
//!
//! ```text
//! allowance = floor(e^(-3 * size / max) * 100 * importance / total_importance * (max - size))
//! ```

use serde::{Deserialize, Serialize};
use tracing::trace;
use utx_primitives::{Amount, Height, Importance, PublicKey};
use utx_types::{Transaction, TransactionInfo};

/// Where the transactions of a batch come from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransactionSource {
    /// Freshly submitted
    New,
    /// Already resident, re-evaluated because the confirmed state changed
    Existing,
    /// Re-inserted because its block was rolled back
    Reverted,
}

/// Read-only importance lookup on the confirmed state
pub trait ImportanceView: Send + Sync {
    /// Importance of `key` at `height`; zero for unknown accounts
    fn importance(&self, key: &PublicKey, height: Height) -> Importance;
}

impl<F> ImportanceView for F
where
    F: Fn(&PublicKey, Height) -> Importance + Send + Sync,
{
    fn importance(&self, key: &PublicKey, height: Height) -> Importance {
        self(key, height)
    }
}

/// Point-in-time view of the cache and the confirmed state used for one decision
#[derive(Clone, Copy)]
pub struct ThrottleSnapshot<'a> {
    /// Source of the transaction
    pub source: TransactionSource,
    /// Height used for importance lookups
    pub height: Height,
    /// Number of transactions in the cache
    pub cache_size: usize,
    /// Number of transactions in the cache from the transaction's signer
    pub signer_count: usize,
    /// Importance lookup
    pub importances: &'a dyn ImportanceView,
}

/// Spam throttle configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpamThrottleConfig {
    /// Fee at which the importance boost reaches its maximum
    pub max_boost_fee: Amount,
    /// Total importance of all accounts
    pub total_importance: Importance,
    /// Maximum number of transactions in the cache
    pub max_cache_size: usize,
    /// Maximum number of transactions in a block
    pub max_block_size: usize,
}

/// Decides whether a transaction is kept out of the cache
pub trait TransactionThrottle: Send + Sync {
    /// Returns `true` if the transaction must not be added
    fn is_throttled(&self, info: &TransactionInfo, snapshot: &ThrottleSnapshot<'_>) -> bool;
}

impl<F> TransactionThrottle for F
where
    F: Fn(&TransactionInfo, &ThrottleSnapshot<'_>) -> bool + Send + Sync,
{
    fn is_throttled(&self, info: &TransactionInfo, snapshot: &ThrottleSnapshot<'_>) -> bool {
        self(info, snapshot)
    }
}

/// Throttle used when spam throttling is disabled: only enforces the cache bound
#[derive(Clone, Copy, Debug)]
pub struct CapacityThrottle {
    max_cache_size: usize,
}

impl CapacityThrottle {
    /// Create a throttle that rejects once the cache holds `max_cache_size` transactions
    pub fn new(max_cache_size: usize) -> Self {
        Self { max_cache_size }
    }
}

impl TransactionThrottle for CapacityThrottle {
    fn is_throttled(&self, _info: &TransactionInfo, snapshot: &ThrottleSnapshot<'_>) -> bool {
        snapshot.cache_size >= self.max_cache_size
    }
}

/// Predicate identifying bonded transactions
pub type BondedPredicate = Box<dyn Fn(&Transaction) -> bool + Send + Sync>;

/// Importance based spam throttle
pub struct SpamThrottle {
    config: SpamThrottleConfig,
    is_bonded: BondedPredicate,
}

impl SpamThrottle {
    /// Create a throttle that treats `EntityType::AggregateBonded` as bonded
    pub fn new(config: SpamThrottleConfig) -> Self {
        Self::with_bonded_predicate(config, Box::new(Transaction::is_bonded))
    }

    /// Create a throttle with a custom bonded predicate
    pub fn with_bonded_predicate(config: SpamThrottleConfig, is_bonded: BondedPredicate) -> Self {
        Self { config, is_bonded }
    }

    /// Get the configuration
    pub fn config(&self) -> &SpamThrottleConfig {
        &self.config
    }

    /// Importance added for paying `max_fee`.
    ///
    /// Grows linearly up to 1% of the total importance at `max_boost_fee`.
    pub fn importance_boost(&self, max_fee: Amount) -> Importance {
        let max_boost_fee = self.config.max_boost_fee.get();
        if max_boost_fee == 0 {
            return Importance::ZERO;
        }

        // multiply before dividing; u128 keeps the product exact
        let fee_boost_base = u128::from(self.config.total_importance.get() / 100);
        let capped_fee = u128::from(max_boost_fee.min(max_fee.get()));
        let boost = fee_boost_base * capped_fee / u128::from(max_boost_fee);
        Importance::new(u64::try_from(boost).unwrap_or(u64::MAX))
    }

    /// Signer importance plus fee boost
    pub fn effective_importance(&self, info: &TransactionInfo, snapshot: &ThrottleSnapshot<'_>) -> Importance {
        let importance = snapshot.importances.importance(info.signer(), snapshot.height);
        importance.saturating_add(self.importance_boost(info.entity.max_fee))
    }

    /// Maximum number of cached transactions a signer with `effective_importance`
    /// may own when the cache holds `cache_size` transactions
    pub fn max_transactions(&self, cache_size: usize, effective_importance: Importance) -> u64 {
        let total_importance = self.config.total_importance.get();
        let max_cache_size = self.config.max_cache_size;
        if total_importance == 0 || cache_size >= max_cache_size {
            return 0;
        }

        let scale_factor = (-3.0 * cache_size as f64 / max_cache_size as f64).exp();
        let slots_remaining = (max_cache_size - cache_size) as f64;
        let allowance =
            scale_factor * 100.0 * effective_importance.get() as f64 / total_importance as f64 * slots_remaining;

        // float to int casts saturate
        allowance as u64
    }
}

impl TransactionThrottle for SpamThrottle {
    fn is_throttled(&self, info: &TransactionInfo, snapshot: &ThrottleSnapshot<'_>) -> bool {
        if snapshot.cache_size >= self.config.max_cache_size {
            return true;
        }

        // a block can absorb the whole cache
        if snapshot.cache_size < self.config.max_block_size {
            return false;
        }

        if TransactionSource::Reverted == snapshot.source || (self.is_bonded)(&*info.entity) {
            return false;
        }

        let effective_importance = self.effective_importance(info, snapshot);
        let max_transactions = self.max_transactions(snapshot.cache_size, effective_importance);
        let throttled = snapshot.signer_count as u64 >= max_transactions;

        trace!(
            "Throttle check {}: importance={}, allowance={}, signer_count={}, throttled={}",
            info.entity_hash.short_hex(),
            effective_importance,
            max_transactions,
            snapshot.signer_count,
            throttled
        );
        throttled
    }
}
