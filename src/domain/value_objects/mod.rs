//! Value objects for the storefront engine

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::EngineError;

/// Money value object, INR-denominated by default.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    amount: Decimal,
    currency: String,
}

impl Money {
    pub fn new(amount: Decimal, currency: &str) -> Self {
        Self { amount, currency: currency.to_string() }
    }
    pub fn inr(amount: Decimal) -> Self { Self::new(amount, "INR") }
    pub fn zero(currency: &str) -> Self { Self::new(Decimal::ZERO, currency) }
    pub fn amount(&self) -> Decimal { self.amount }
    pub fn currency(&self) -> &str { &self.currency }
    pub fn add(&self, other: &Money) -> crate::Result<Money> {
        if self.currency != other.currency {
            return Err(EngineError::Unreachable(format!(
                "currency mismatch: {} vs {}",
                self.currency, other.currency
            )));
        }
        Ok(Money::new(self.amount + other.amount, &self.currency))
    }
    pub fn multiply(&self, qty: u32) -> Money {
        Money::new(self.amount * Decimal::from(qty), &self.currency)
    }
}

impl Default for Money {
    fn default() -> Self { Self::zero("INR") }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

/// Cart line quantities are clamped to this range.
pub const MIN_LINE_QUANTITY: u32 = 1;
pub const MAX_LINE_QUANTITY: u32 = 100;

/// Cart line quantity, always within 1..=100.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quantity(u32);

impl Quantity {
    /// Clamps `value` into the legal range rather than rejecting it.
    pub fn clamped(value: u32) -> Self {
        Self(value.clamp(MIN_LINE_QUANTITY, MAX_LINE_QUANTITY))
    }
    pub fn value(&self) -> u32 { self.0 }
    pub fn add(&self, other: u32) -> Self {
        Self::clamped(self.0.saturating_add(other))
    }
    /// Applies a signed delta. Decrementing stops at 1; it never removes
    /// the line — removal is an explicit, separate operation.
    pub fn adjust(&self, delta: i32) -> Self {
        let next = i64::from(self.0) + i64::from(delta);
        let next = next.clamp(i64::from(MIN_LINE_QUANTITY), i64::from(MAX_LINE_QUANTITY));
        Self(next as u32)
    }
}

impl Default for Quantity {
    fn default() -> Self { Self(MIN_LINE_QUANTITY) }
}

/// Indian postal code: exactly six ASCII digits.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pincode(String);

impl Pincode {
    /// Format validation only. Callers must not issue a serviceability
    /// lookup when this fails.
    pub fn parse(value: impl Into<String>) -> crate::Result<Self> {
        let value = value.into().trim().to_string();
        if value.len() != 6 || !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(EngineError::InvalidPincode);
        }
        Ok(Self(value))
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Pincode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_multiply() {
        let unit = Money::inr(Decimal::new(5000, 0));
        assert_eq!(unit.multiply(2).amount(), Decimal::new(10000, 0));
    }

    #[test]
    fn test_money_add_mismatched_currency_fails() {
        let a = Money::inr(Decimal::ONE);
        let b = Money::new(Decimal::ONE, "USD");
        assert!(a.add(&b).is_err());
    }

    #[test]
    fn test_quantity_clamped_bounds() {
        assert_eq!(Quantity::clamped(0).value(), 1);
        assert_eq!(Quantity::clamped(250).value(), 100);
        assert_eq!(Quantity::clamped(7).value(), 7);
    }

    #[test]
    fn test_quantity_decrement_stops_at_one() {
        let q = Quantity::clamped(1);
        assert_eq!(q.adjust(-1).value(), 1);
        assert_eq!(q.adjust(-50).value(), 1);
    }

    #[test]
    fn test_pincode_rejects_wrong_shapes() {
        assert!(Pincode::parse("12345").is_err());
        assert!(Pincode::parse("1234567").is_err());
        assert!(Pincode::parse("38000a").is_err());
        assert!(Pincode::parse("380001").is_ok());
    }
}
