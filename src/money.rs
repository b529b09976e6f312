//! Exact price arithmetic.
//!
//! Catalog prices arrive as JSON numbers (`199.99`) or strings (`"199.99"`).
//! They are stored as integer cents so that build totals never drift, no
//! matter how many parts are summed.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::Add;
use std::str::FromStr;
use thiserror::Error;

/// Errors produced when parsing a price
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    #[error("Price is empty")]
    Empty,

    #[error("Price cannot be negative: {0}")]
    Negative(String),

    #[error("Price has more than two decimal places: {0}")]
    TooPrecise(String),

    #[error("Price is not a decimal number: {0}")]
    Invalid(String),

    #[error("Price is too large: {0}")]
    Overflow(String),
}

/// A non-negative amount of money in integer cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Price(u64);

impl Price {
    pub const ZERO: Self = Self(0);

    #[inline]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    #[inline]
    pub const fn cents(self) -> u64 {
        self.0
    }

    /// Multiply by a quantity, saturating at the representable maximum.
    pub const fn times(self, quantity: u32) -> Self {
        Self(self.0.saturating_mul(quantity as u64))
    }

    /// Plain decimal rendering without the currency sign (`"199.99"`).
    pub fn to_decimal_string(self) -> String {
        format!("{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Price> for Price {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&format!("${}", self.to_decimal_string()))
    }
}

impl FromStr for Price {
    type Err = PriceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        if raw.is_empty() {
            return Err(PriceError::Empty);
        }
        if raw.starts_with('-') {
            return Err(PriceError::Negative(raw.to_string()));
        }

        let (whole, frac) = match raw.split_once('.') {
            Some((whole, frac)) => (whole, frac),
            None => (raw, ""),
        };

        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PriceError::Invalid(raw.to_string()));
        }
        if !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PriceError::Invalid(raw.to_string()));
        }
        if frac.len() > 2 {
            return Err(PriceError::TooPrecise(raw.to_string()));
        }

        let dollars: u64 = whole
            .parse()
            .map_err(|_| PriceError::Overflow(raw.to_string()))?;
        let cents: u64 = match frac.len() {
            0 => 0,
            1 => u64::from(frac.as_bytes()[0] - b'0') * 10,
            _ => frac
                .parse()
                .map_err(|_| PriceError::Invalid(raw.to_string()))?,
        };

        dollars
            .checked_mul(100)
            .and_then(|c| c.checked_add(cents))
            .map(Self)
            .ok_or_else(|| PriceError::Overflow(raw.to_string()))
    }
}

impl Serialize for Price {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // Written as a JSON number so files stay readable by the storefront.
        serializer.serialize_f64(self.0 as f64 / 100.0)
    }
}

struct PriceVisitor;

impl Visitor<'_> for PriceVisitor {
    type Value = Price;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a non-negative price with at most two decimal places")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Price, E> {
        v.checked_mul(100)
            .map(Price)
            .ok_or_else(|| E::custom(PriceError::Overflow(v.to_string())))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Price, E> {
        match u64::try_from(v) {
            Ok(v) => self.visit_u64(v),
            Err(_) => Err(E::custom(PriceError::Negative(v.to_string()))),
        }
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Price, E> {
        if !v.is_finite() {
            return Err(E::custom(PriceError::Invalid(v.to_string())));
        }
        // Shortest round-trip formatting gives back the literal from the file.
        v.to_string().parse().map_err(E::custom)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Price, E> {
        v.parse().map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(PriceVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_whole_and_fractional() {
        assert_eq!("12".parse::<Price>().unwrap(), Price::from_cents(1200));
        assert_eq!("12.5".parse::<Price>().unwrap(), Price::from_cents(1250));
        assert_eq!("12.05".parse::<Price>().unwrap(), Price::from_cents(1205));
        assert_eq!(" 0.99 ".parse::<Price>().unwrap(), Price::from_cents(99));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert_eq!("".parse::<Price>(), Err(PriceError::Empty));
        assert!(matches!("-1".parse::<Price>(), Err(PriceError::Negative(_))));
        assert!(matches!("1.999".parse::<Price>(), Err(PriceError::TooPrecise(_))));
        assert!(matches!("abc".parse::<Price>(), Err(PriceError::Invalid(_))));
        assert!(matches!(".5".parse::<Price>(), Err(PriceError::Invalid(_))));
        assert!(matches!("1.2x".parse::<Price>(), Err(PriceError::Invalid(_))));
    }

    #[test]
    fn test_display() {
        assert_eq!(Price::from_cents(19999).to_string(), "$199.99");
        assert_eq!(Price::from_cents(5).to_string(), "$0.05");
        assert_eq!(Price::ZERO.to_string(), "$0.00");
    }

    #[test]
    fn test_sum_has_no_float_drift() {
        // 0.1 + 0.2 style sums are exact in cents
        let prices = vec![Price::from_cents(10); 1000];
        let total: Price = prices.iter().sum();
        assert_eq!(total, Price::from_cents(10_000));
        assert_eq!(total.to_string(), "$100.00");
    }

    #[test]
    fn test_times() {
        assert_eq!(Price::from_cents(250).times(3), Price::from_cents(750));
        assert_eq!(Price::from_cents(250).times(0), Price::ZERO);
    }

    #[test]
    fn test_deserialize_number_and_string() {
        let p: Price = serde_json::from_str("199.99").unwrap();
        assert_eq!(p, Price::from_cents(19999));

        let p: Price = serde_json::from_str("450").unwrap();
        assert_eq!(p, Price::from_cents(45000));

        let p: Price = serde_json::from_str("\"89.50\"").unwrap();
        assert_eq!(p, Price::from_cents(8950));
    }

    #[test]
    fn test_deserialize_rejects_negative() {
        assert!(serde_json::from_str::<Price>("-3").is_err());
        assert!(serde_json::from_str::<Price>("-3.5").is_err());
        assert!(serde_json::from_str::<Price>("0.125").is_err());
    }

    #[test]
    fn test_serialize_as_number() {
        let json = serde_json::to_string(&Price::from_cents(19999)).unwrap();
        assert_eq!(json, "199.99");
        let back: Price = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Price::from_cents(19999));
    }
}
