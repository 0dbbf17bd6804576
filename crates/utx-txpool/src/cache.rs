//! Unconfirmed transactions cache
//!
//! [`UtCache`] is the storage contract the updater mutates. [`MemoryUtCache`]
//! is the in-memory implementation: a hash index plus per-signer counters,
//! readable without locks while a batch is being applied.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use utx_primitives::{Hash256, PublicKey, Timestamp};
use utx_types::TransactionInfo;

/// Storage for unconfirmed transactions
pub trait UtCache: Send + Sync {
    /// Insert a transaction; returns `false` if its hash is already present
    fn add(&self, info: TransactionInfo) -> bool;

    /// Remove a transaction by hash; absent hashes are ignored
    fn remove(&self, hash: &Hash256) -> Option<TransactionInfo>;

    /// Remove and return every transaction, oldest first
    fn remove_all(&self) -> Vec<TransactionInfo>;

    /// Remove and return every transaction with a deadline before `timestamp`
    fn prune(&self, timestamp: Timestamp) -> Vec<TransactionInfo>;

    /// Number of transactions
    fn len(&self) -> usize;

    /// Check if the cache holds no transactions
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if a hash is present
    fn contains(&self, hash: &Hash256) -> bool;

    /// Number of transactions signed by `signer`
    fn count_for_signer(&self, signer: &PublicKey) -> usize;
}

/// Cached transaction with its insertion sequence number
#[derive(Clone, Debug)]
struct CachedInfo {
    info: TransactionInfo,
    sequence: u64,
}

/// In-memory unconfirmed transactions cache
pub struct MemoryUtCache {
    /// All transactions by entity hash
    by_hash: DashMap<Hash256, CachedInfo>,
    /// Transaction count per signer
    by_signer: DashMap<PublicKey, usize>,
    /// Total count
    count: AtomicUsize,
    /// Next insertion sequence number
    next_sequence: AtomicU64,
}

impl MemoryUtCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self {
            by_hash: DashMap::new(),
            by_signer: DashMap::new(),
            count: AtomicUsize::new(0),
            next_sequence: AtomicU64::new(0),
        }
    }

    /// Get transaction by hash
    pub fn get(&self, hash: &Hash256) -> Option<TransactionInfo> {
        self.by_hash.get(hash).map(|entry| entry.info.clone())
    }

    /// All hashes, oldest first (for syncing)
    pub fn hashes(&self) -> Vec<Hash256> {
        self.ordered_infos().into_iter().map(|info| info.entity_hash).collect()
    }

    /// Snapshot of all transactions, oldest first
    pub fn infos(&self) -> Vec<TransactionInfo> {
        self.ordered_infos()
    }

    fn ordered_infos(&self) -> Vec<TransactionInfo> {
        let mut cached: Vec<CachedInfo> = self.by_hash.iter().map(|entry| entry.value().clone()).collect();
        cached.sort_by_key(|cached| cached.sequence);
        cached.into_iter().map(|cached| cached.info).collect()
    }

    fn decrement_signer(&self, signer: &PublicKey) {
        let emptied = match self.by_signer.get_mut(signer) {
            Some(mut count) => {
                *count = count.saturating_sub(1);
                *count == 0
            }
            None => false,
        };

        if emptied {
            self.by_signer.remove_if(signer, |_, count| *count == 0);
        }
    }

    fn remove_where(&self, predicate: impl Fn(&TransactionInfo) -> bool) -> Vec<TransactionInfo> {
        let mut doomed: Vec<(u64, Hash256)> = self
            .by_hash
            .iter()
            .filter(|entry| predicate(&entry.info))
            .map(|entry| (entry.sequence, *entry.key()))
            .collect();
        doomed.sort();

        doomed
            .into_iter()
            .filter_map(|(_, hash)| self.remove(&hash))
            .collect()
    }
}

impl Default for MemoryUtCache {
    fn default() -> Self {
        Self::new()
    }
}

impl UtCache for MemoryUtCache {
    fn add(&self, info: TransactionInfo) -> bool {
        let signer = *info.signer();
        match self.by_hash.entry(info.entity_hash) {
            Entry::Occupied(_) => return false,
            Entry::Vacant(vacant) => {
                let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
                vacant.insert(CachedInfo { info, sequence });
            }
        }

        *self.by_signer.entry(signer).or_insert(0) += 1;
        self.count.fetch_add(1, Ordering::SeqCst);
        true
    }

    fn remove(&self, hash: &Hash256) -> Option<TransactionInfo> {
        let (_, cached) = self.by_hash.remove(hash)?;
        self.decrement_signer(cached.info.signer());
        self.count.fetch_sub(1, Ordering::SeqCst);
        Some(cached.info)
    }

    fn remove_all(&self) -> Vec<TransactionInfo> {
        self.remove_where(|_| true)
    }

    fn prune(&self, timestamp: Timestamp) -> Vec<TransactionInfo> {
        self.remove_where(|info| info.deadline() < timestamp)
    }

    fn len(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    fn contains(&self, hash: &Hash256) -> bool {
        self.by_hash.contains_key(hash)
    }

    fn count_for_signer(&self, signer: &PublicKey) -> usize {
        self.by_signer.get(signer).map(|count| *count).unwrap_or(0)
    }
}
