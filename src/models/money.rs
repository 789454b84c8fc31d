use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Monetary amount held as integer cents.
///
/// Serialized as a JSON number with two decimals of precision; inputs are
/// rounded to the nearest cent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);
    /// Largest amount a form accepts: 10 digits, 2 of them decimals.
    pub const MAX: Money = Money(99_999_999_99);

    pub fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    pub fn from_units(units: i64) -> Self {
        Money(units.saturating_mul(100))
    }

    pub fn cents(self) -> i64 {
        self.0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Money)
    }

    pub fn checked_sub(self, rhs: Money) -> Option<Money> {
        self.0.checked_sub(rhs.0).map(Money)
    }

    fn as_f64(self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        if !value.is_finite() {
            return Err(serde::de::Error::custom("amount must be a finite number"));
        }
        let cents = (value * 100.0).round();
        // i64::MAX rounds up to 2^63 as f64, so `>=` keeps the cast exact.
        if cents.abs() >= i64::MAX as f64 {
            return Err(serde::de::Error::custom("amount is out of range"));
        }
        Ok(Money(cents as i64))
    }
}
