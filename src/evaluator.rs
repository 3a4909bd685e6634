//! Error fare decision logic
//!
//! Pure functions deciding whether a quote is discounted far enough below the
//! rolling baseline to count as an error fare.

use crate::models::{AirportPair, ErrorFareSignal, Money, Quote};

/// Thresholds an offer has to clear to be reported
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FareEvaluator {
    /// Minimum bookable seats at the quoted price
    pub min_seats: u32,
    /// Minimum discount as a fraction of the baseline (0.2 = 20% off)
    pub discount_threshold: f64,
}

impl FareEvaluator {
    #[must_use]
    pub fn new(min_seats: u32, discount_threshold: f64) -> Self {
        Self {
            min_seats,
            discount_threshold,
        }
    }

    /// Returns a signal when `quote` qualifies as an error fare against `baseline`.
    ///
    /// `baseline.amount` must be positive. The discount is carried verbatim and
    /// can exceed 1.0 for non-positive prices.
    #[must_use]
    pub fn is_error_fare(
        &self,
        route: &AirportPair,
        quote: &Quote,
        baseline: &Money,
    ) -> Option<ErrorFareSignal> {
        if quote.available_seats < self.min_seats {
            return None;
        }

        if !quote.price.same_currency(baseline) {
            tracing::debug!(
                route = %route,
                quote_currency = %quote.price.currency,
                baseline_currency = %baseline.currency,
                "Ignoring quote in a different currency than the baseline"
            );
            return None;
        }

        let discount = 1.0 - quote.price.amount / baseline.amount;
        if discount < self.discount_threshold {
            return None;
        }

        Some(ErrorFareSignal::from_quote(route, quote, baseline, discount))
    }

    /// Best qualifying quote by discount. Equal discounts keep the earliest quote.
    #[must_use]
    pub fn find_best_error_fare(
        &self,
        route: &AirportPair,
        quotes: &[Quote],
        baseline: &Money,
    ) -> Option<ErrorFareSignal> {
        quotes
            .iter()
            .filter_map(|quote| self.is_error_fare(route, quote, baseline))
            .fold(None, |best: Option<ErrorFareSignal>, current| match best {
                Some(best) if current.discount_percentage <= best.discount_percentage => {
                    Some(best)
                }
                _ => Some(current),
            })
    }
}
