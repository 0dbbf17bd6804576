//! Numeric newtypes for fees, importances, heights and timestamps

use std::fmt;
use std::ops::{Add, Sub};

macro_rules! unit_type {
    ($(#[$meta:meta])* $name:ident, $raw:ty) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[cfg_attr(feature = "serde", serde(transparent))]
        pub struct $name($raw);

        impl $name {
            /// Zero value
            pub const ZERO: $name = $name(0);

            /// Maximum representable value
            pub const MAX: $name = $name(<$raw>::MAX);

            /// Wrap a raw value
            pub const fn new(value: $raw) -> Self {
                $name(value)
            }

            /// Get the raw value
            pub const fn get(self) -> $raw {
                self.0
            }

            /// Addition clamped at the maximum value
            pub fn saturating_add(self, rhs: Self) -> Self {
                $name(self.0.saturating_add(rhs.0))
            }

            /// Subtraction clamped at zero
            pub fn saturating_sub(self, rhs: Self) -> Self {
                $name(self.0.saturating_sub(rhs.0))
            }
        }

        impl From<$raw> for $name {
            fn from(value: $raw) -> Self {
                $name(value)
            }
        }

        impl Add for $name {
            type Output = $name;

            fn add(self, rhs: Self) -> Self {
                $name(self.0 + rhs.0)
            }
        }

        impl Sub for $name {
            type Output = $name;

            fn sub(self, rhs: Self) -> Self {
                $name(self.0 - rhs.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

unit_type!(
    /// Currency amount in atomic units
    Amount,
    u64
);

unit_type!(
    /// Account importance used for harvesting and spam throttling
    Importance,
    u64
);

unit_type!(
    /// Chain height
    Height,
    u64
);

unit_type!(
    /// Network timestamp in milliseconds
    Timestamp,
    u64
);

unit_type!(
    /// Fee paid per byte of transaction size
    BlockFeeMultiplier,
    u32
);
