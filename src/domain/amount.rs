//! Amount type
//!
//! Domain primitive for journal line amounts. All amounts are validated at
//! construction time, so a line can never carry a zero or negative value.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum allowed line amount (1 trillion)
const MAX_AMOUNT: Decimal = Decimal::from_parts(3_567_587_328, 232, 0, false, 0);

/// Maximum decimal places (4)
const MAX_SCALE: u32 = 4;

/// Two figures closer than this are treated as equal by the reports.
pub const BALANCE_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Amount represents a validated, strictly positive monetary value.
///
/// # Invariants
/// - Value is always positive (> 0)
/// - Maximum 4 decimal places
/// - Maximum value is 1 trillion
///
/// # Example
/// ```
/// use rust_decimal::Decimal;
/// use erp_ledger::domain::Amount;
///
/// let amount = Amount::new(Decimal::new(100, 0)).unwrap();
/// assert_eq!(amount.value(), Decimal::new(100, 0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

/// Errors that can occur when creating an Amount
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("Amount must be positive (got {0})")]
    NotPositive(Decimal),

    #[error("Amount has too many decimal places (max {MAX_SCALE}, got {0})")]
    TooManyDecimals(u32),

    #[error("Amount exceeds maximum allowed value ({MAX_AMOUNT})")]
    Overflow,

    #[error("Invalid amount format: {0}")]
    ParseError(String),
}

impl Amount {
    /// Create a new Amount with validation.
    ///
    /// # Errors
    /// - `AmountError::NotPositive` if value <= 0
    /// - `AmountError::TooManyDecimals` if more than 4 decimal places
    /// - `AmountError::Overflow` if value > 1 trillion
    pub fn new(value: Decimal) -> Result<Self, AmountError> {
        if value <= Decimal::ZERO {
            return Err(AmountError::NotPositive(value));
        }

        // Trailing zeros do not count against the scale limit
        let normalized = value.normalize();
        if normalized.scale() > MAX_SCALE {
            return Err(AmountError::TooManyDecimals(normalized.scale()));
        }

        if value > MAX_AMOUNT {
            return Err(AmountError::Overflow);
        }

        Ok(Self(value))
    }

    /// Create an Amount from an integer (no decimal places).
    pub fn from_integer(value: i64) -> Result<Self, AmountError> {
        Self::new(Decimal::from(value))
    }

    /// Get the underlying Decimal value.
    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decimal =
            Decimal::from_str(s.trim()).map_err(|e| AmountError::ParseError(e.to_string()))?;
        Amount::new(decimal)
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = AmountError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Amount::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

/// True when two figures agree within [`BALANCE_TOLERANCE`].
pub fn within_tolerance(a: Decimal, b: Decimal) -> bool {
    (a - b).abs() < BALANCE_TOLERANCE
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_amount_positive() {
        let amount = Amount::new(dec!(100));
        assert!(amount.is_ok());
        assert_eq!(amount.unwrap().value(), dec!(100));
    }

    #[test]
    fn test_amount_zero_rejected() {
        assert!(matches!(Amount::new(Decimal::ZERO), Err(AmountError::NotPositive(_))));
    }

    #[test]
    fn test_amount_negative_rejected() {
        assert!(matches!(Amount::new(dec!(-100)), Err(AmountError::NotPositive(_))));
    }

    #[test]
    fn test_amount_too_many_decimals() {
        assert!(matches!(
            Amount::new(dec!(0.12345)),
            Err(AmountError::TooManyDecimals(5))
        ));
    }

    #[test]
    fn test_amount_trailing_zeros_allowed() {
        assert!(Amount::new(dec!(10.500000)).is_ok());
    }

    #[test]
    fn test_amount_overflow() {
        assert!(matches!(
            Amount::new(dec!(1000000000001)),
            Err(AmountError::Overflow)
        ));
        assert!(Amount::new(dec!(1000000000000)).is_ok());
    }

    #[test]
    fn test_amount_from_str() {
        let amount: Amount = " 123.45 ".parse().unwrap();
        assert_eq!(amount.value(), dec!(123.45));
        assert!(matches!("abc".parse::<Amount>(), Err(AmountError::ParseError(_))));
    }

    #[test]
    fn test_amount_deserializes_from_string_and_number() {
        let from_str: Amount = serde_json::from_str("\"1040.00\"").unwrap();
        let from_num: Amount = serde_json::from_str("1040").unwrap();
        assert_eq!(from_str.value(), dec!(1040));
        assert_eq!(from_num.value(), dec!(1040));
        assert!(serde_json::from_str::<Amount>("\"-5\"").is_err());
    }

    #[test]
    fn test_tolerance() {
        assert!(within_tolerance(dec!(100.004), dec!(100)));
        assert!(!within_tolerance(dec!(100.01), dec!(100)));
        assert_eq!(BALANCE_TOLERANCE, dec!(0.01));
        assert_eq!(MAX_AMOUNT, dec!(1000000000000));
    }
}
