//! Data models for the FareWatch service
//!
//! This module contains the core domain models organized by concern:
//! - Route: airport pair identity
//! - Money and Quote: current offers from the quote source
//! - History: persisted daily price points per route
//! - Signal: detected error fares

pub mod history;
pub mod money;
pub mod quote;
pub mod route;
pub mod signal;

// Re-export all public types for convenient access
pub use history::{PricePoint, RouteHistory};
pub use money::Money;
pub use quote::Quote;
pub use route::AirportPair;
pub use signal::ErrorFareSignal;
