//! Fixed-point quantities: claimable amounts, collateral and bid values.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of decimal places carried by an [`Amount`].
pub const AMOUNT_DECIMALS: u32 = 8;

/// Base units per whole [`Amount`] unit.
pub const AMOUNT_SCALE: u64 = 10u64.pow(AMOUNT_DECIMALS);

/// Errors when parsing a decimal amount.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountParseError {
    /// The string is empty or not a decimal number.
    #[error("invalid amount: {0:?}")]
    Invalid(String),

    /// More fractional digits than the fixed-point precision allows.
    #[error("amount {0:?} has more than 8 decimal places")]
    TooPrecise(String),

    /// Value does not fit in the fixed-point range.
    #[error("amount {0:?} is out of range")]
    Overflow(String),
}

/// A claimable quantity with eight decimal places.
///
/// Stored as an integer count of base units so that capping and summing
/// across providers is exact.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct Amount(u64);

impl Amount {
    /// Zero amount.
    pub const ZERO: Self = Amount(0);

    /// Create from a raw base-unit count.
    pub const fn from_base_units(units: u64) -> Self {
        Amount(units)
    }

    /// Raw base-unit count.
    pub const fn base_units(self) -> u64 {
        self.0
    }

    /// Create from whole units plus a fractional part expressed in base units.
    pub const fn from_parts(whole: u64, fraction_units: u64) -> Self {
        Amount(whole * AMOUNT_SCALE + fraction_units)
    }

    /// Whether this amount is zero.
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Saturating subtraction.
    pub fn saturating_sub(self, other: Amount) -> Amount {
        Amount(self.0.saturating_sub(other.0))
    }

    /// Saturating addition.
    pub fn saturating_add(self, other: Amount) -> Amount {
        Amount(self.0.saturating_add(other.0))
    }

    /// Lossy conversion for display and logging only.
    pub fn as_f64(self) -> f64 {
        self.0 as f64 / AMOUNT_SCALE as f64
    }

    /// Keep only the first `decimals` fractional digits (truncating).
    pub fn truncate_to(self, decimals: u32) -> Amount {
        if decimals >= AMOUNT_DECIMALS {
            return self;
        }
        let step = 10u64.pow(AMOUNT_DECIMALS - decimals);
        Amount(self.0 - self.0 % step)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / AMOUNT_SCALE;
        let frac = self.0 % AMOUNT_SCALE;
        if frac == 0 {
            return write!(f, "{}", whole);
        }
        let digits = format!("{:0width$}", frac, width = AMOUNT_DECIMALS as usize);
        write!(f, "{}.{}", whole, digits.trim_end_matches('0'))
    }
}

impl FromStr for Amount {
    type Err = AmountParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || AmountParseError::Invalid(s.to_string());

        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return Err(invalid());
        }
        if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid());
        }
        if frac.len() > AMOUNT_DECIMALS as usize {
            return Err(AmountParseError::TooPrecise(s.to_string()));
        }

        let whole: u64 = if whole.is_empty() {
            0
        } else {
            whole
                .parse()
                .map_err(|_| AmountParseError::Overflow(s.to_string()))?
        };
        let frac_units: u64 = if frac.is_empty() {
            0
        } else {
            let padded = format!("{:0<width$}", frac, width = AMOUNT_DECIMALS as usize);
            padded.parse().map_err(|_| invalid())?
        };

        whole
            .checked_mul(AMOUNT_SCALE)
            .and_then(|w| w.checked_add(frac_units))
            .map(Amount)
            .ok_or_else(|| AmountParseError::Overflow(s.to_string()))
    }
}

impl TryFrom<String> for Amount {
    type Error = AmountParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Amount> for String {
    fn from(value: Amount) -> Self {
        value.to_string()
    }
}

/// Backing collateral in the collateral token's smallest unit.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Collateral(pub u128);

impl Collateral {
    /// No collateral.
    pub const ZERO: Self = Collateral(0);

    /// Whether the provider has no backing collateral at all.
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Collateral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Priority fee attached to a submission, in the settlement layer's smallest
/// fee unit.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct BidValue(pub u128);

impl BidValue {
    /// No bid.
    pub const ZERO: Self = BidValue(0);

    /// Raw value.
    pub fn get(self) -> u128 {
        self.0
    }

    /// Saturating addition.
    pub fn saturating_add(self, other: BidValue) -> BidValue {
        BidValue(self.0.saturating_add(other.0))
    }
}

impl fmt::Display for BidValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_decimal_amounts() {
        assert_eq!("0.02".parse::<Amount>().unwrap(), Amount(2_000_000));
        assert_eq!("1".parse::<Amount>().unwrap(), Amount(AMOUNT_SCALE));
        assert_eq!(".5".parse::<Amount>().unwrap(), Amount(50_000_000));
        assert_eq!("0.0005".parse::<Amount>().unwrap(), Amount(50_000));
        assert_eq!(
            "12.00000001".parse::<Amount>().unwrap(),
            Amount::from_parts(12, 1)
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            "".parse::<Amount>(),
            Err(AmountParseError::Invalid(_))
        ));
        assert!(matches!(
            "-1".parse::<Amount>(),
            Err(AmountParseError::Invalid(_))
        ));
        assert!(matches!(
            "0.000000001".parse::<Amount>(),
            Err(AmountParseError::TooPrecise(_))
        ));
        assert!(matches!(
            "99999999999999999999".parse::<Amount>(),
            Err(AmountParseError::Overflow(_))
        ));
    }

    #[test]
    fn test_display_trims_trailing_zeros() {
        assert_eq!(Amount(5_000_000).to_string(), "0.05");
        assert_eq!(Amount::from_parts(3, 0).to_string(), "3");
        assert_eq!(Amount(1).to_string(), "0.00000001");
    }

    #[test]
    fn test_truncate_to_four_places() {
        let amount: Amount = "0.12345678".parse().unwrap();
        assert_eq!(amount.truncate_to(4).to_string(), "0.1234");
        assert_eq!(amount.truncate_to(8), amount);
    }

    #[test]
    fn test_amount_serde_as_string() {
        let amount: Amount = "0.03".parse().unwrap();
        let json = serde_json::to_string(&amount).unwrap();
        assert_eq!(json, "\"0.03\"");
        let back: Amount = serde_json::from_str(&json).unwrap();
        assert_eq!(back, amount);
    }
}
