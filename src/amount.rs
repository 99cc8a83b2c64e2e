//! Fixed-point token amounts
//!
//! On-chain amounts are integers in base units with 6 decimal places.
//! Parsing is exact on the decimal text; extra precision is truncated.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::StackPayError;

/// Number of decimal places of the token
pub const DECIMALS: u32 = 6;

/// Base units per whole token
pub const BASE_UNIT_SCALE: u64 = 1_000_000;

/// Token amount in base units
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub fn from_base_units(units: u64) -> Self {
        Self(units)
    }

    /// Whole tokens, e.g. `Amount::from_whole(50)` is 50.000000
    pub fn from_whole(tokens: u64) -> Self {
        Self(tokens.saturating_mul(BASE_UNIT_SCALE))
    }

    pub fn base_units(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Lossy conversion for summaries and statistics
    pub fn as_f64(&self) -> f64 {
        self.0 as f64 / BASE_UNIT_SCALE as f64
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    /// Parse a base-unit integer as printed by the indexer (`"20000000"`)
    /// or in Clarity repr form (`"u20000000"`).
    pub fn parse_base_units(text: &str) -> Result<Self, StackPayError> {
        let digits = text.trim().trim_start_matches('u');
        digits
            .parse::<u64>()
            .map(Amount)
            .map_err(|_| StackPayError::InvalidAmount(text.to_string()))
    }
}

impl FromStr for Amount {
    type Err = StackPayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let invalid = || StackPayError::InvalidAmount(s.to_string());

        if text.is_empty() || text.starts_with('-') || text.starts_with('+') {
            return Err(invalid());
        }

        let (whole, fraction) = match text.split_once('.') {
            Some((w, f)) => (w, f),
            None => (text, ""),
        };
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid());
        }
        if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid());
        }

        let whole_units = if whole.is_empty() {
            0
        } else {
            whole.parse::<u64>().map_err(|_| invalid())?
        };

        // Truncate (floor) anything past the sixth decimal
        let mut fraction_digits: String = fraction.chars().take(DECIMALS as usize).collect();
        while fraction_digits.len() < DECIMALS as usize {
            fraction_digits.push('0');
        }
        let fraction_units = fraction_digits.parse::<u64>().map_err(|_| invalid())?;

        whole_units
            .checked_mul(BASE_UNIT_SCALE)
            .and_then(|w| w.checked_add(fraction_units))
            .map(Amount)
            .ok_or_else(invalid)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / BASE_UNIT_SCALE;
        let fraction = self.0 % BASE_UNIT_SCALE;
        if fraction == 0 {
            return write!(f, "{}", whole);
        }
        let digits = format!("{:06}", fraction);
        write!(f, "{}.{}", whole, digits.trim_end_matches('0'))
    }
}

impl std::iter::Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Self {
        Amount(iter.fold(0u64, |acc, a| acc.saturating_add(a.0)))
    }
}
