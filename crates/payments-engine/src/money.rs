//! Money in minor currency units

use std::fmt;

use serde::{Deserialize, Serialize};

/// Non-negative amount in minor currency units (cents for `usd`/`eur`).
///
/// Arithmetic is overflow-checked; there is no floating point anywhere in
/// the payment path.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Self = Self(0);

    pub const fn new(minor_units: u64) -> Self {
        Self(minor_units)
    }

    pub const fn minor_units(self) -> u64 {
        self.0
    }

    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(sum) => Some(Self(sum)),
            None => None,
        }
    }

    #[must_use]
    pub const fn checked_mul(self, quantity: u64) -> Option<Self> {
        match self.0.checked_mul(quantity) {
            Some(product) => Some(Self(product)),
            None => None,
        }
    }
}

impl From<u64> for Amount {
    fn from(minor_units: u64) -> Self {
        Self(minor_units)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_arithmetic() {
        assert_eq!(Amount::new(999).checked_mul(2), Some(Amount::new(1998)));
        assert_eq!(
            Amount::new(1998).checked_add(Amount::new(500)),
            Some(Amount::new(2498))
        );
        assert_eq!(Amount::new(u64::MAX).checked_add(Amount::new(1)), None);
        assert_eq!(Amount::new(u64::MAX / 2 + 1).checked_mul(2), None);
    }

    #[test]
    fn test_serializes_as_integer() {
        let json = serde_json::to_string(&Amount::new(2498)).unwrap();
        assert_eq!(json, "2498");
    }
}
