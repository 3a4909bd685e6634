//! Persisted price history records

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{AirportPair, Money};

/// Lowest price observed for a route on a calendar day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub price: Money,
}

/// All price points recorded for one route, oldest first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteHistory {
    pub airport_pair: AirportPair,
    pub history: Vec<PricePoint>,
}

impl RouteHistory {
    #[must_use]
    pub fn new(airport_pair: AirportPair) -> Self {
        Self {
            airport_pair,
            history: Vec::new(),
        }
    }

    /// Currency of the first recorded point, which all later points share
    #[must_use]
    pub fn currency(&self) -> Option<&str> {
        self.history.first().map(|p| p.price.currency.as_str())
    }
}
