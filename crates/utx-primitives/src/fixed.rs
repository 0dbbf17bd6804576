//! 32-byte identifiers
//!
//! Hashes and public keys share one representation; only their names and
//! `Debug` labels differ.

macro_rules! fixed_bytes {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
        pub struct $name([u8; 32]);

        impl $name {
            /// Size in bytes
            pub const LEN: usize = 32;

            /// All zero bytes
            pub const ZERO: $name = $name([0u8; 32]);

            /// Wrap raw bytes
            pub const fn from_bytes(bytes: [u8; 32]) -> Self {
                $name(bytes)
            }

            /// Copy from a slice of exactly 32 bytes
            pub fn from_slice(slice: &[u8]) -> Result<Self, $crate::PrimitiveError> {
                let bytes: [u8; 32] = slice.try_into().map_err(|_| $crate::PrimitiveError::InvalidLength {
                    kind: $label,
                    got: slice.len(),
                })?;
                Ok($name(bytes))
            }

            /// Parse from hex, with or without a `0x` prefix
            pub fn from_hex(s: &str) -> Result<Self, $crate::PrimitiveError> {
                let digits = s.strip_prefix("0x").unwrap_or(s);
                let bytes = hex::decode(digits).map_err(|e| $crate::PrimitiveError::InvalidHex(e.to_string()))?;
                Self::from_slice(&bytes)
            }

            /// Raw bytes
            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            /// Check for all zero bytes
            pub fn is_zero(&self) -> bool {
                self.0.iter().all(|byte| *byte == 0)
            }

            /// `0x` prefixed hex
            pub fn to_hex(&self) -> String {
                format!("0x{}", hex::encode(self.0))
            }

            /// First four bytes, for log lines
            pub fn short_hex(&self) -> String {
                format!("0x{}..", hex::encode(&self.0[..4]))
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}({})", $label, self.to_hex())
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl From<[u8; 32]> for $name {
            fn from(bytes: [u8; 32]) -> Self {
                $name(bytes)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        #[cfg(feature = "serde")]
        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        #[cfg(feature = "serde")]
        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = <String as serde::Deserialize>::deserialize(deserializer)?;
                $name::from_hex(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

fixed_bytes!(
    /// 256-bit hash
    H256,
    "H256"
);

fixed_bytes!(
    /// Account public key identifying a transaction signer
    PublicKey,
    "PublicKey"
);

/// Entity and merkle component hashes
pub type Hash256 = H256;
