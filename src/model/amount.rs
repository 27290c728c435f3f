//! Amount type for whole-unit expense values.
//!
//! Amounts are currency-agnostic integers. Spreadsheets and people both like to group thousands
//! with spaces (`1 000`, or `1\u{a0}000` when Google formats a number), so parsing strips every
//! whitespace character before reading the digits.

use crate::utils::strip_whitespace;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;

/// A whole-unit expense amount.
///
/// ```
/// # use gig_ledger::model::Amount;
/// # use std::str::FromStr;
/// let amount = Amount::from_str("1 000").unwrap();
/// assert_eq!(amount.value(), 1000);
/// assert!(Amount::from_str("10.50").is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(i64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    /// `None` when the sum does not fit.
    pub fn checked_add(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_add(rhs.0).map(Amount)
    }
}

/// The error returned when a token is not a whole number.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct AmountError {
    token: String,
}

impl Display for AmountError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' is not a whole number", self.token)
    }
}

impl std::error::Error for AmountError {}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let compact = strip_whitespace(s);
        compact
            .parse::<i64>()
            .map(Amount)
            .map_err(|_| AmountError {
                token: s.to_string(),
            })
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(self.0)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        i64::deserialize(deserializer).map(Amount)
    }
}

impl From<i64> for Amount {
    fn from(value: i64) -> Self {
        Amount(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain() {
        assert_eq!(Amount::from_str("500").unwrap().value(), 500);
    }

    #[test]
    fn test_parse_grouped_thousands() {
        assert_eq!(Amount::from_str("1 000").unwrap().value(), 1000);
        assert_eq!(Amount::from_str(" 12 500 ").unwrap().value(), 12500);
        assert_eq!(Amount::from_str("1\u{a0}000").unwrap().value(), 1000);
    }

    #[test]
    fn test_parse_negative() {
        assert_eq!(Amount::from_str("-300").unwrap().value(), -300);
    }

    #[test]
    fn test_parse_rejects_non_digits() {
        assert!(Amount::from_str("").is_err());
        assert!(Amount::from_str("500р").is_err());
        assert!(Amount::from_str("10.5").is_err());
        assert!(Amount::from_str("1,000").is_err());
        assert!(Amount::from_str("25.07.2026").is_err());
    }

    #[test]
    fn test_error_message_keeps_token() {
        let e = Amount::from_str("abc").unwrap_err();
        assert_eq!(e.to_string(), "'abc' is not a whole number");
    }

    #[test]
    fn test_checked_add() {
        assert_eq!(
            Amount::new(500).checked_add(Amount::new(-50)),
            Some(Amount::new(450))
        );
        assert_eq!(Amount::new(i64::MAX).checked_add(Amount::new(1)), None);
    }
}
