//! Fixed-point numeric types for prices, credit amounts, and share counts
//!
//! Prices and credit balances are integer micros (scale 1e6). Every
//! comparison and every arithmetic step in matching and settlement happens on
//! the integer representation; `rust_decimal` appears only at the serde
//! boundary to parse and render decimal strings without float error.
//! Serialized as strings to prevent JSON number precision loss.

use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use thiserror::Error;

/// Number of micros in one whole credit.
pub const CREDIT_SCALE: i64 = 1_000_000;

/// Error parsing a decimal string into a fixed-point value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NumericError {
    #[error("not a decimal number: {0}")]
    Malformed(String),

    #[error("more than 6 decimal places: {0}")]
    TooPrecise(String),

    #[error("price out of range (0, 1]: {0}")]
    PriceOutOfRange(String),
}

fn micros_from_str(s: &str) -> Result<i64, NumericError> {
    let d = Decimal::from_str(s).map_err(|_| NumericError::Malformed(s.to_string()))?;
    let scaled = d * Decimal::from(CREDIT_SCALE);
    if !scaled.fract().is_zero() {
        return Err(NumericError::TooPrecise(s.to_string()));
    }
    scaled
        .to_i64()
        .ok_or_else(|| NumericError::Malformed(s.to_string()))
}

/// Price of one share in credits, as integer micros in `(0, 1_000_000]`.
///
/// A price is an implied probability: 0.400000 credits means the market
/// prices the contract's side at 40%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Price(i64);

impl Price {
    /// The maximum price, 1.000000 credits (certainty).
    pub const MAX: Price = Price(CREDIT_SCALE);

    /// Create a price from micros.
    ///
    /// # Panics
    /// Panics if outside `(0, CREDIT_SCALE]`.
    pub fn new(micros: i64) -> Self {
        assert!(
            micros > 0 && micros <= CREDIT_SCALE,
            "price micros out of (0, {CREDIT_SCALE}]"
        );
        Self(micros)
    }

    /// Create a price from micros, `None` if outside `(0, CREDIT_SCALE]`.
    pub fn try_new(micros: i64) -> Option<Self> {
        (micros > 0 && micros <= CREDIT_SCALE).then_some(Self(micros))
    }

    /// Parse a decimal string such as `"0.400000"`.
    pub fn parse(s: &str) -> Result<Self, NumericError> {
        let micros = micros_from_str(s)?;
        Self::try_new(micros).ok_or_else(|| NumericError::PriceOutOfRange(s.to_string()))
    }

    /// The integer micros.
    pub fn as_micros(&self) -> i64 {
        self.0
    }

    /// Micros of `1 − price`, the per-share escrow on the opposite outcome.
    pub fn complement_micros(&self) -> i64 {
        CREDIT_SCALE - self.0
    }

    /// Decimal view for display only.
    pub fn as_decimal(&self) -> Decimal {
        Decimal::new(self.0, 6)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_decimal())
    }
}

impl Serialize for Price {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.as_decimal().to_string())
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Signed credit amount in integer micros.
///
/// Used for balances, reservations, and journal deltas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Credits(i64);

impl Credits {
    pub const ZERO: Credits = Credits(0);

    /// Create from micros; any signed value is valid.
    pub fn from_micros(micros: i64) -> Self {
        Self(micros)
    }

    /// Create from a whole number of credits.
    pub fn from_whole(credits: i64) -> Self {
        Self(credits * CREDIT_SCALE)
    }

    /// Parse a decimal string such as `"100"` or `"-4.000000"`.
    pub fn parse(s: &str) -> Result<Self, NumericError> {
        micros_from_str(s).map(Self)
    }

    pub fn as_micros(&self) -> i64 {
        self.0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Decimal view for display only.
    pub fn as_decimal(&self) -> Decimal {
        Decimal::new(self.0, 6)
    }
}

impl fmt::Display for Credits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_decimal())
    }
}

impl Add for Credits {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Credits {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl Neg for Credits {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self(-self.0)
    }
}

impl AddAssign for Credits {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Credits {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Sum for Credits {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Credits::ZERO, Add::add)
    }
}

impl Serialize for Credits {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.as_decimal().to_string())
    }
}

impl<'de> Deserialize<'de> for Credits {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Whole-share count. Orders require a positive quantity; zero appears only
/// in filled counters and aggregates.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Quantity(u64);

impl Quantity {
    /// Create a quantity.
    ///
    /// # Panics
    /// Panics if zero.
    pub fn new(shares: u64) -> Self {
        assert!(shares > 0, "quantity must be positive");
        Self(shares)
    }

    /// Create a positive quantity, `None` if zero.
    pub fn try_new(shares: u64) -> Option<Self> {
        (shares > 0).then_some(Self(shares))
    }

    pub fn zero() -> Self {
        Self(0)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn min(self, other: Self) -> Self {
        Self(self.0.min(other.0))
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Add for Quantity {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Quantity {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        assert!(self.0 >= rhs.0, "quantity subtraction would go negative");
        Self(self.0 - rhs.0)
    }
}

impl Mul<Price> for Quantity {
    type Output = Credits;

    fn mul(self, rhs: Price) -> Self::Output {
        Credits::from_micros(self.0 as i64 * rhs.as_micros())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_parse_and_display() {
        let p = Price::parse("0.400000").unwrap();
        assert_eq!(p.as_micros(), 400_000);
        assert_eq!(p.to_string(), "0.400000");
    }

    #[test]
    fn price_rejects_out_of_range() {
        assert!(Price::parse("0").is_err());
        assert!(Price::parse("-0.5").is_err());
        assert!(Price::parse("1.000001").is_err());
        assert!(Price::parse("abc").is_err());
    }

    #[test]
    fn price_rejects_sub_micro_precision() {
        assert_eq!(
            Price::parse("0.1234567"),
            Err(NumericError::TooPrecise("0.1234567".into()))
        );
    }

    #[test]
    fn price_accepts_one() {
        let p = Price::parse("1").unwrap();
        assert_eq!(p, Price::MAX);
        assert_eq!(p.complement_micros(), 0);
    }

    #[test]
    fn price_serialization_roundtrip() {
        let p = Price::new(350_000);
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, "\"0.350000\"");
        let back: Price = serde_json::from_str(&json).unwrap();
        assert_eq!(p, back);
    }

    #[test]
    fn credits_arithmetic() {
        let a = Credits::from_whole(100);
        let b = Credits::from_micros(4_000_000);
        assert_eq!((a - b).as_micros(), 96_000_000);
        assert_eq!((a + b).as_micros(), 104_000_000);
        assert_eq!((-b).as_micros(), -4_000_000);
    }

    #[test]
    fn credits_sum_of_deltas() {
        let deltas = [
            Credits::from_whole(100),
            -Credits::from_whole(4),
            Credits::from_micros(500),
        ];
        let total: Credits = deltas.into_iter().sum();
        assert_eq!(total.as_micros(), 96_000_500);
    }

    #[test]
    fn quantity_times_price_is_exact() {
        let q = Quantity::new(10);
        let p = Price::new(400_000);
        assert_eq!(q * p, Credits::from_whole(4));
    }

    #[test]
    fn quantity_min_and_sub() {
        let a = Quantity::new(7);
        let b = Quantity::new(5);
        assert_eq!(a.min(b), b);
        assert_eq!((a - b).as_u64(), 2);
    }

    #[test]
    #[should_panic(expected = "quantity must be positive")]
    fn quantity_zero_panics() {
        Quantity::new(0);
    }

    #[test]
    fn deterministic_cost_calculation() {
        let q = Quantity::new(3);
        let p = Price::parse("0.333333").unwrap();
        assert_eq!((q * p).as_micros(), 999_999);
        assert_eq!((q * p).as_micros(), 999_999);
    }
}
