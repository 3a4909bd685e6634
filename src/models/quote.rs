//! Flight offer returned by a quote source

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::Money;

/// One priced offer for a route at the time of a check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub price: Money,
    /// Seats still bookable at this price
    pub available_seats: u32,
    pub departure_date: NaiveDateTime,
    pub return_date: NaiveDateTime,
}
