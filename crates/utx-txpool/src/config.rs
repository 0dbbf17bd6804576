//! Engine configuration
//!
//! Loaded once at startup from TOML. Every capacity in the engine is a
//! transaction count.

use crate::error::{UtError, UtResult};
use crate::throttle::{CapacityThrottle, SpamThrottle, SpamThrottleConfig, TransactionThrottle};
use serde::{Deserialize, Serialize};
use std::path::Path;
use utx_primitives::{Amount, BlockFeeMultiplier, Importance};

/// Spam throttling section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpamThrottlingSection {
    /// Fee at which the importance boost is maximal
    #[serde(default = "default_max_boost_fee")]
    pub max_boost_fee: Amount,
    /// Total importance of all accounts
    #[serde(default = "default_total_importance")]
    pub total_importance: Importance,
    /// Maximum number of transactions in a block
    #[serde(default = "default_max_block_size")]
    pub max_block_size: usize,
}

/// Unconfirmed transactions engine configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtConfig {
    /// Minimum fee multiplier of admitted transactions
    #[serde(default = "default_min_fee_multiplier")]
    pub min_fee_multiplier: BlockFeeMultiplier,
    /// Use the importance based throttle instead of the capacity-only one
    #[serde(default = "default_enable_spam_throttling")]
    pub enable_spam_throttling: bool,
    /// Maximum number of transactions in the cache
    #[serde(default = "default_max_cache_size")]
    pub max_cache_size: usize,
    /// Spam throttling parameters
    #[serde(default)]
    pub spam_throttling: SpamThrottlingSection,
}

fn default_max_boost_fee() -> Amount {
    Amount::new(10_000_000)
}

fn default_total_importance() -> Importance {
    Importance::new(8_999_999_998_000_000)
}

fn default_max_block_size() -> usize {
    6_000
}

fn default_min_fee_multiplier() -> BlockFeeMultiplier {
    BlockFeeMultiplier::ZERO
}

fn default_enable_spam_throttling() -> bool {
    true
}

fn default_max_cache_size() -> usize {
    1_000_000
}

impl Default for SpamThrottlingSection {
    fn default() -> Self {
        Self {
            max_boost_fee: default_max_boost_fee(),
            total_importance: default_total_importance(),
            max_block_size: default_max_block_size(),
        }
    }
}

impl Default for UtConfig {
    fn default() -> Self {
        Self {
            min_fee_multiplier: default_min_fee_multiplier(),
            enable_spam_throttling: default_enable_spam_throttling(),
            max_cache_size: default_max_cache_size(),
            spam_throttling: SpamThrottlingSection::default(),
        }
    }
}

impl UtConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> UtResult<Self> {
        let config: UtConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> UtResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Check that the values are consistent
    pub fn validate(&self) -> UtResult<()> {
        if self.max_cache_size == 0 {
            return Err(UtError::InvalidConfig("max_cache_size must be positive".to_string()));
        }

        if self.spam_throttling.max_block_size > self.max_cache_size {
            return Err(UtError::InvalidConfig(format!(
                "max_block_size ({}) exceeds max_cache_size ({})",
                self.spam_throttling.max_block_size, self.max_cache_size
            )));
        }

        Ok(())
    }

    /// Build the throttle configuration
    pub fn throttle_config(&self) -> SpamThrottleConfig {
        SpamThrottleConfig {
            max_boost_fee: self.spam_throttling.max_boost_fee,
            total_importance: self.spam_throttling.total_importance,
            max_cache_size: self.max_cache_size,
            max_block_size: self.spam_throttling.max_block_size,
        }
    }

    /// Build the throttle selected by `enable_spam_throttling`
    pub fn create_throttle(&self) -> Box<dyn TransactionThrottle> {
        if self.enable_spam_throttling {
            Box::new(SpamThrottle::new(self.throttle_config()))
        } else {
            Box::new(CapacityThrottle::new(self.max_cache_size))
        }
    }
}
