//! Menu prices using decimal arithmetic.
//!
//! The backend sends prices as JSON numbers; they are converted to
//! [`Decimal`] once at the edge so cached values never accumulate float
//! error, and stored as text in the cache.

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A menu item price in the restaurant's currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    /// Create a price from a decimal amount.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Convert a wire float, rounding to two decimal places.
    ///
    /// Returns `None` for NaN, infinities, or negative amounts.
    #[must_use]
    pub fn from_f64(amount: f64) -> Option<Self> {
        if !amount.is_finite() || amount < 0.0 {
            return None;
        }
        Decimal::try_from(amount)
            .ok()
            .map(|d| Self(d.round_dp(2).normalize()))
    }

    /// Get the decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "$ {:.2}", self.0)
    }
}

impl std::str::FromStr for Price {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<Decimal>().map(Self)
    }
}
