//! Monetary amount tagged with its currency

use std::fmt;

use serde::{Deserialize, Serialize};

/// A non-negative amount in a single currency
///
/// No cross-currency arithmetic is ever performed on these values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Money {
    pub amount: f64,
    /// ISO-4217 currency code
    pub currency: String,
}

impl Money {
    #[must_use]
    pub fn new(amount: f64, currency: impl Into<String>) -> Self {
        Self {
            amount,
            currency: currency.into(),
        }
    }

    /// Whether both values are expressed in the same currency
    #[must_use]
    pub fn same_currency(&self, other: &Money) -> bool {
        self.currency == other.currency
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} {}", self.amount, self.currency)
    }
}
