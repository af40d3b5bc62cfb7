//! Currency amounts.
//!
//! `Amount` is a thin wrapper over `rust_decimal::Decimal` so balances never
//! see floating point error. Every amount written to the ledger goes through
//! [`Amount::round_down`] first, which truncates to two places toward zero.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::str::FromStr;
use thiserror::Error;

/// Decimal places kept for anything written to the ledger.
pub const LEDGER_SCALE: u32 = 2;

#[derive(Debug, Error)]
#[error("Invalid amount {input:?}: {source}")]
pub struct AmountParseError {
    pub input: String,
    #[source]
    pub source: rust_decimal::Error,
}

/// Signed, arbitrary precision currency amount.
///
/// Serializes as a decimal string (`"9.70"`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(Decimal);

impl Amount {
    pub const ZERO: Amount = Amount(Decimal::ZERO);

    /// `Amount::new(970, 2)` is `9.70`.
    pub fn new(num: i64, scale: u32) -> Self {
        Self(Decimal::new(num, scale))
    }

    pub const fn from_decimal(value: Decimal) -> Self {
        Self(value)
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Truncate to two decimal places toward zero.
    ///
    /// `4.2857 -> 4.28`, `-1.239 -> -1.23`.
    pub fn round_down(self) -> Self {
        Self(
            self.0
                .round_dp_with_strategy(LEDGER_SCALE, RoundingStrategy::ToZero),
        )
    }

    /// Multiply by a rate (e.g. a donation fraction). Not rounded.
    pub fn mul_rate(self, rate: Decimal) -> Self {
        Self(self.0 * rate)
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Strictly greater than zero.
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }
}

impl From<i64> for Amount {
    fn from(value: i64) -> Self {
        Self(Decimal::from(value))
    }
}

impl FromStr for Amount {
    type Err = AmountParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s.trim())
            .map(Self)
            .map_err(|source| AmountParseError {
                input: s.to_string(),
                source,
            })
    }
}

impl fmt::Display for Amount {
    /// Always shows at least two decimal places (`90` prints as `90.00`).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut value = self.0;
        if value.scale() < LEDGER_SCALE {
            value.rescale(LEDGER_SCALE);
        }
        fmt::Display::fmt(&value, f)
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Amount) -> Amount {
        Amount(self.0 + rhs.0)
    }
}

impl AddAssign for Amount {
    fn add_assign(&mut self, rhs: Amount) {
        self.0 += rhs.0;
    }
}

impl Sub for Amount {
    type Output = Amount;

    fn sub(self, rhs: Amount) -> Amount {
        Amount(self.0 - rhs.0)
    }
}

impl SubAssign for Amount {
    fn sub_assign(&mut self, rhs: Amount) {
        self.0 -= rhs.0;
    }
}

impl Neg for Amount {
    type Output = Amount;

    fn neg(self) -> Amount {
        Amount(-self.0)
    }
}

impl std::iter::Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Amount {
        iter.fold(Amount::ZERO, |acc, amount| acc + amount)
    }
}
