//! `FareWatch` - error fare detection for monitored flight routes
//!
//! This library polls flight quotes for a fixed set of routes, keeps a
//! rolling per-route price history and raises an alert when an offer falls
//! far enough below the recent average.

pub mod alerts;
pub mod cache;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod models;
pub mod price_history;
pub mod quotes;
pub mod scheduler;
pub mod telemetry;

// Re-export core types for public API
pub use alerts::AlertSink;
pub use cache::PersistentCache;
pub use config::FareWatchConfig;
pub use error::FareWatchError;
pub use evaluator::FareEvaluator;
pub use models::{AirportPair, ErrorFareSignal, Money, PricePoint, Quote, RouteHistory};
pub use price_history::PriceRecordStore;
pub use quotes::QuoteSource;
pub use scheduler::{FareCheckScheduler, RouteOutcome, SweepOutcome, SweepReport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, FareWatchError>;
