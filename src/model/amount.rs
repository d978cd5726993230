//! Amount type for handling monetary values from ledger cells.
//!
//! This module provides the `Amount` type which wraps `Decimal` and handles parsing values the
//! way they appear in a Czech roster sheet: with or without a currency suffix, with spaces as
//! thousands separators, and with either a decimal point or a decimal comma.

use rust_decimal::Decimal;
use std::fmt;
use std::ops::{Add, Sub};
use std::str::FromStr;
use tracing::warn;

/// Represents a currency amount.
///
/// This type wraps `Decimal`. Ledger cells are coerced leniently with [`Amount::from_cell`]
/// (absent or junk cells become zero, never an error), while configured amounts are parsed
/// strictly via `FromStr`.
///
/// # Examples
///
/// Parsing a plain amount:
/// ```
/// # use dues_notify::model::Amount;
/// # use std::str::FromStr;
/// let amount = Amount::from_str("500").unwrap();
/// assert!(amount.is_positive());
/// ```
///
/// Czech formatting with a currency suffix and decimal comma:
/// ```
/// # use dues_notify::model::Amount;
/// # use std::str::FromStr;
/// let amount = Amount::from_str("1 500,50 Kč").unwrap();
/// assert_eq!(amount.qr_format(), "1500.50");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(Decimal);

impl Amount {
    pub const ZERO: Amount = Amount(Decimal::ZERO);

    /// Creates a new Amount from a Decimal value.
    pub const fn new(value: Decimal) -> Self {
        Self(value)
    }

    /// Returns the underlying Decimal value.
    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns true if the amount is strictly positive.
    pub fn is_positive(&self) -> bool {
        !self.is_zero() && self.0.is_sign_positive()
    }

    /// Returns true if the amount has no fractional part.
    pub fn is_integer(&self) -> bool {
        self.0.is_integer()
    }

    /// Coerces a ledger cell to an amount. Absent cells are zero. Cells that do not parse are
    /// also zero, with a warning, because ledgers commonly hold placeholder text where a payment
    /// is not yet applicable.
    pub fn from_cell(cell: Option<&str>) -> Amount {
        let Some(raw) = cell else {
            return Amount::ZERO;
        };
        match Amount::from_str(raw) {
            Ok(amount) => amount,
            Err(e) => {
                warn!("Treating non-numeric ledger cell '{raw}' as zero: {e}");
                Amount::ZERO
            }
        }
    }

    /// Renders the amount with exactly two decimal places, as required by the payment-code
    /// `AM:` field. E.g. `150` -> `"150.00"`, `150.5` -> `"150.50"`.
    pub fn qr_format(&self) -> String {
        format!("{:.2}", self.0.round_dp(2))
    }
}

impl FromStr for Amount {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Ok(Amount::ZERO);
        }

        // Strip a currency suffix, if any.
        let without_currency = trimmed
            .strip_suffix("Kč")
            .or_else(|| trimmed.strip_suffix("CZK"))
            .unwrap_or(trimmed)
            .trim();

        // Spaces (including non-breaking) are thousands separators.
        let compact: String = without_currency
            .chars()
            .filter(|&c| c != ' ' && c != '\u{a0}')
            .collect();

        // A comma is the decimal separator unless a point is also present, in which case the
        // commas are thousands separators ("1,000.00").
        let normalized = if compact.contains(',') && !compact.contains('.') {
            compact.replace(',', ".")
        } else {
            compact.replace(',', "")
        };

        Ok(Amount(Decimal::from_str(&normalized)?))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Amount) -> Amount {
        Amount(self.0 + rhs.0)
    }
}

impl Sub for Amount {
    type Output = Amount;

    fn sub(self, rhs: Amount) -> Amount {
        Amount(self.0 - rhs.0)
    }
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Amount::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.value()
    }
}
