//! Flight quote sources
//!
//! A quote source returns the current offers for a route. An empty result
//! means "no offers right now"; errors are reserved for transport or
//! authentication failures.

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{AirportPair, Quote};

pub mod amadeus;

pub use amadeus::AmadeusQuoteSource;

#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Current offers for `route`, cheapest first
    async fn search_flights(&self, route: &AirportPair) -> Result<Vec<Quote>>;
}
