//! Exact money arithmetic.
//!
//! Amounts are carried as integer minor units (cents, kobo) and only turned into a
//! [`Decimal`] at the edges, for display and JSON. Gateways take minor units as-is.

use std::fmt;

use rust_decimal::{Decimal, prelude::ToPrimitive};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

const SCALE: u32 = 2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_minor(minor: i64) -> Self {
        Money(minor)
    }

    pub const fn minor(self) -> i64 {
        self.0
    }

    pub fn to_decimal(self) -> Decimal {
        Decimal::new(self.0, SCALE)
    }

    /// Converts a decimal amount, rejecting values with more than two fractional digits.
    pub fn from_decimal(value: Decimal) -> Option<Self> {
        let scaled = value.checked_mul(Decimal::from(100))?;
        if !scaled.fract().is_zero() {
            return None;
        }
        scaled.to_i64().map(Money)
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Unit price times quantity; `None` on overflow.
    pub fn checked_times(self, quantity: i32) -> Option<Self> {
        self.0.checked_mul(i64::from(quantity)).map(Money)
    }

    pub fn checked_add(self, other: Money) -> Option<Self> {
        self.0.checked_add(other.0).map(Money)
    }

    /// Sum that reports overflow instead of wrapping.
    pub fn checked_sum<I: IntoIterator<Item = Money>>(iter: I) -> Option<Self> {
        iter.into_iter()
            .try_fold(Money::ZERO, |acc, next| acc.checked_add(next))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_decimal())
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Serialize::serialize(&self.to_decimal(), serializer)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = <Decimal as Deserialize>::deserialize(deserializer)?;
        Money::from_decimal(value)
            .ok_or_else(|| serde::de::Error::custom("amount must have at most two decimal places"))
    }
}
