//! Transaction types

use bytes::Bytes;
use std::sync::Arc;
use utx_primitives::{Amount, BlockFeeMultiplier, Hash256, PublicKey, Timestamp};

/// Serialized size of the fixed transaction header
/// (size, signature, signer, version, type, max fee, deadline).
pub const TRANSACTION_HEADER_SIZE: u32 = 128;

/// Transaction entity type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum EntityType {
    /// Plain transfer
    #[default]
    Transfer,
    /// Aggregate with all cosignatures attached
    AggregateComplete,
    /// Aggregate awaiting cosignatures, locked by a bond
    AggregateBonded,
    /// Any other registered transaction plugin
    Other(u16),
}

impl EntityType {
    /// Wire code of the entity type
    pub fn code(&self) -> u16 {
        match self {
            EntityType::Transfer => 0x4154,
            EntityType::AggregateComplete => 0x4141,
            EntityType::AggregateBonded => 0x4241,
            EntityType::Other(code) => *code,
        }
    }
}

/// Signed transaction
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    /// Entity type
    pub entity_type: EntityType,
    /// Signer public key
    pub signer: PublicKey,
    /// Maximum fee the signer is willing to pay
    pub max_fee: Amount,
    /// Deadline after which the transaction can no longer be confirmed
    pub deadline: Timestamp,
    /// Type specific body
    pub payload: Bytes,
}

impl Transaction {
    /// Create a new transaction
    pub fn new(
        entity_type: EntityType,
        signer: PublicKey,
        max_fee: Amount,
        deadline: Timestamp,
        payload: Bytes,
    ) -> Self {
        Self {
            entity_type,
            signer,
            max_fee,
            deadline,
            payload,
        }
    }

    /// Serialized size in bytes
    pub fn size(&self) -> u32 {
        let payload = u32::try_from(self.payload.len()).unwrap_or(u32::MAX);
        TRANSACTION_HEADER_SIZE.saturating_add(payload)
    }

    /// Check if this is a bonded aggregate awaiting cosignatures
    pub fn is_bonded(&self) -> bool {
        self.entity_type == EntityType::AggregateBonded
    }

    /// Fee paid per byte (`max_fee / size`, rounded down)
    pub fn fee_multiplier(&self) -> BlockFeeMultiplier {
        let multiplier = self.max_fee.get() / u64::from(self.size());
        BlockFeeMultiplier::new(u32::try_from(multiplier).unwrap_or(u32::MAX))
    }

    /// Check whether the max fee covers `multiplier * size`
    pub fn pays_at_least(&self, multiplier: BlockFeeMultiplier) -> bool {
        let required = u128::from(multiplier.get()) * u128::from(self.size());
        u128::from(self.max_fee.get()) >= required
    }
}

/// A transaction together with its content hash and merkle component hash.
///
/// Identity is the entity hash. The transaction is shared behind an `Arc` so
/// moving an info into the pool or into a failure report never copies the body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionInfo {
    /// The transaction
    pub entity: Arc<Transaction>,
    /// Content hash
    pub entity_hash: Hash256,
    /// Hash of the transaction's merkle tree component
    pub merkle_component_hash: Hash256,
}

impl TransactionInfo {
    /// Create an info from a transaction and its hashes
    pub fn new(entity: Transaction, entity_hash: Hash256, merkle_component_hash: Hash256) -> Self {
        Self {
            entity: Arc::new(entity),
            entity_hash,
            merkle_component_hash,
        }
    }

    /// Get the signer
    pub fn signer(&self) -> &PublicKey {
        &self.entity.signer
    }

    /// Get the deadline
    pub fn deadline(&self) -> Timestamp {
        self.entity.deadline
    }
}
