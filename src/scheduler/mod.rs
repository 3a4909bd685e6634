//! Recurring error fare sweeps
//!
//! A sweep walks the monitored routes in configured order: fetch quotes, look
//! up the baseline, evaluate, record today's cheapest price and alert when a
//! fare qualifies. A failing route is logged and the sweep moves on. At most
//! one sweep runs at a time; triggers arriving mid-sweep are skipped.

mod schedule;
mod state;

pub use schedule::parse_schedule;
pub use state::{SweepGuard, SweepLock, SweepState};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use cron::Schedule;
use tracing::{error, info, warn};

use crate::FareWatchError;
use crate::alerts::AlertSink;
use crate::evaluator::FareEvaluator;
use crate::models::AirportPair;
use crate::price_history::{DEFAULT_WINDOW_DAYS, PriceRecordStore};
use crate::quotes::QuoteSource;

const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);

/// What happened to one route during a sweep
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// The source returned no offers; nothing recorded
    NoQuotes,
    /// No baseline yet; the first observation was recorded without evaluation
    Seeded,
    /// Price recorded, nothing qualified
    NoErrorFare,
    /// Price recorded and an alert delivered
    Alerted,
    Failed(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub routes: Vec<(AirportPair, RouteOutcome)>,
}

impl SweepReport {
    #[must_use]
    pub fn alerts_sent(&self) -> usize {
        self.count(|o| matches!(o, RouteOutcome::Alerted))
    }

    #[must_use]
    pub fn failures(&self) -> usize {
        self.count(|o| matches!(o, RouteOutcome::Failed(_)))
    }

    #[must_use]
    pub fn outcome(&self, route: &AirportPair) -> Option<&RouteOutcome> {
        self.routes
            .iter()
            .find(|(r, _)| r == route)
            .map(|(_, outcome)| outcome)
    }

    fn count(&self, predicate: impl Fn(&RouteOutcome) -> bool) -> usize {
        self.routes.iter().filter(|(_, o)| predicate(o)).count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepOutcome {
    /// Another sweep held the lock; no external call was made
    Skipped,
    Completed(SweepReport),
}

pub struct FareCheckScheduler {
    routes: Vec<AirportPair>,
    quote_source: Arc<dyn QuoteSource>,
    store: PriceRecordStore,
    evaluator: FareEvaluator,
    alert_sink: Arc<dyn AlertSink>,
    window_days: u32,
    call_timeout: Duration,
    lock: SweepLock,
}

impl FareCheckScheduler {
    #[must_use]
    pub fn new(
        routes: Vec<AirportPair>,
        quote_source: Arc<dyn QuoteSource>,
        store: PriceRecordStore,
        evaluator: FareEvaluator,
        alert_sink: Arc<dyn AlertSink>,
    ) -> Self {
        Self {
            routes,
            quote_source,
            store,
            evaluator,
            alert_sink,
            window_days: DEFAULT_WINDOW_DAYS,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            lock: SweepLock::new(),
        }
    }

    #[must_use]
    pub fn with_window_days(mut self, window_days: u32) -> Self {
        self.window_days = window_days;
        self
    }

    /// Deadline for every quote fetch and alert delivery
    #[must_use]
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    #[must_use]
    pub fn state(&self) -> SweepState {
        self.lock.state()
    }

    #[must_use]
    pub fn store(&self) -> &PriceRecordStore {
        &self.store
    }

    /// Runs one sweep over all routes unless one is already in flight
    #[tracing::instrument(name = "fare_sweep", skip(self), fields(routes = self.routes.len()))]
    pub async fn check_error_fares(&self) -> SweepOutcome {
        let Some(_guard) = self.lock.try_acquire() else {
            info!("Previous fare check still running, skipping");
            return SweepOutcome::Skipped;
        };

        info!("Checking for error fares");
        let mut report = SweepReport::default();

        for route in &self.routes {
            let outcome = match self.check_route(route).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    error!(route = %route, error = %format!("{err:#}"), "Error checking route");
                    RouteOutcome::Failed(format!("{err:#}"))
                }
            };
            report.routes.push((route.clone(), outcome));
        }

        info!(
            alerts = report.alerts_sent(),
            failures = report.failures(),
            "Fare check completed"
        );
        SweepOutcome::Completed(report)
    }

    #[tracing::instrument(name = "check_route", skip(self), fields(route = %route))]
    async fn check_route(&self, route: &AirportPair) -> Result<RouteOutcome> {
        let quotes = self
            .with_deadline("flight search", self.quote_source.search_flights(route))
            .await?;

        let Some(cheapest) = quotes.first() else {
            info!("No flights found");
            return Ok(RouteOutcome::NoQuotes);
        };
        let current_price = cheapest.price.clone();

        let Some(baseline) = self.store.window_average(route, self.window_days).await else {
            info!(price = %current_price, "No price history yet, seeding");
            self.store.add_price_point(route, current_price).await?;
            return Ok(RouteOutcome::Seeded);
        };

        let signal = self.evaluator.find_best_error_fare(route, &quotes, &baseline);
        self.store.add_price_point(route, current_price).await?;

        let Some(signal) = signal else {
            info!(baseline = %baseline, "No error fare");
            return Ok(RouteOutcome::NoErrorFare);
        };

        info!(
            price = %signal.current_price,
            baseline = %signal.average_price,
            discount = signal.rounded_discount(),
            "Error fare found"
        );
        self.with_deadline("alert delivery", self.alert_sink.send_error_fare_alert(&signal))
            .await?;
        Ok(RouteOutcome::Alerted)
    }

    async fn with_deadline<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(FareWatchError::Timeout {
                operation,
                after: self.call_timeout,
            }
            .into()),
        }
    }

    /// Starts a sweep in the background. A trigger during a running sweep is
    /// logged and dropped by the sweep itself.
    pub fn trigger(self: &Arc<Self>) -> tokio::task::JoinHandle<SweepOutcome> {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move { scheduler.check_error_fares().await })
    }

    /// Triggers sweeps at every upcoming instant of `schedule`. Never returns.
    pub async fn run(self: Arc<Self>, schedule: Schedule, run_on_startup: bool) {
        if run_on_startup {
            self.trigger();
        }

        for next in schedule.upcoming(Utc) {
            let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);
            tracing::debug!(next = %next, "Next fare check scheduled");
            tokio::time::sleep(wait).await;
            self.trigger();
        }

        warn!("Schedule has no further occurrences, stopping");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(origin: &str, destination: &str) -> AirportPair {
        AirportPair::new(origin, destination)
    }

    #[test]
    fn test_report_counts() {
        let report = SweepReport {
            routes: vec![
                (route("JFK", "LHR"), RouteOutcome::Alerted),
                (route("LAX", "CDG"), RouteOutcome::Failed("boom".into())),
                (route("SFO", "NRT"), RouteOutcome::NoQuotes),
            ],
        };
        assert_eq!(report.alerts_sent(), 1);
        assert_eq!(report.failures(), 1);
        assert_eq!(
            report.outcome(&route("SFO", "NRT")),
            Some(&RouteOutcome::NoQuotes)
        );
        assert!(report.outcome(&route("BOS", "DUB")).is_none());
    }
}
