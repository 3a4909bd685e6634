//! Error fare signal and its alert rendering

use std::fmt::{self, Display};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{AirportPair, Money, Quote};

/// A confirmed discount worth alerting on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorFareSignal {
    pub airport_pair: AirportPair,
    pub current_price: Money,
    pub average_price: Money,
    /// `1 - current / average`, not clamped
    pub discount_percentage: f64,
    pub available_seats: u32,
    pub departure_date: NaiveDateTime,
    pub return_date: NaiveDateTime,
}

impl ErrorFareSignal {
    #[must_use]
    pub fn from_quote(
        airport_pair: &AirportPair,
        quote: &Quote,
        average_price: &Money,
        discount_percentage: f64,
    ) -> Self {
        Self {
            airport_pair: airport_pair.clone(),
            current_price: quote.price.clone(),
            average_price: average_price.clone(),
            discount_percentage,
            available_seats: quote.available_seats,
            departure_date: quote.departure_date,
            return_date: quote.return_date,
        }
    }

    /// Discount as a whole percentage for display
    #[must_use]
    pub fn rounded_discount(&self) -> i64 {
        (self.discount_percentage * 100.0).round() as i64
    }
}

impl Display for ErrorFareSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "🚨 Error Fare Alert! 🚨")?;
        writeln!(f)?;
        writeln!(
            f,
            "Route: {} ✈️ {}",
            self.airport_pair.origin, self.airport_pair.destination
        )?;
        writeln!(f, "Current Price: {}", self.current_price)?;
        writeln!(f, "Average Price: {}", self.average_price)?;
        writeln!(f, "Discount: {}%", self.rounded_discount())?;
        writeln!(f, "Available Seats: {}", self.available_seats)?;
        writeln!(f, "Departure: {}", self.departure_date.format("%Y-%m-%d"))?;
        writeln!(f, "Return: {}", self.return_date.format("%Y-%m-%d"))?;
        writeln!(f)?;
        write!(f, "Book now before it's gone! 🎉")
    }
}
