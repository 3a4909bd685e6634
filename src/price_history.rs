//! Durable per-route price history
//!
//! The whole store is one pretty-printed JSON document. Every mutation loads
//! the document, changes it and rewrites it through a temp file rename, so a
//! reader never observes a partial write.

use std::path::{Path, PathBuf};

use chrono::{Days, NaiveDate, Utc};
use tokio::fs;

use crate::models::{AirportPair, Money, PricePoint, RouteHistory};
use crate::{FareWatchError, Result};

/// Default trailing window for baseline averages
pub const DEFAULT_WINDOW_DAYS: u32 = 7;

pub struct PriceRecordStore {
    path: PathBuf,
    retention_days: Option<u32>,
}

impl PriceRecordStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            retention_days: None,
        }
    }

    /// Prune points older than `days` whenever a new point is appended
    #[must_use]
    pub fn with_retention(mut self, days: Option<u32>) -> Self {
        self.retention_days = days;
        self
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every route history. A missing or unreadable store is empty.
    pub async fn load(&self) -> Vec<RouteHistory> {
        let data = match fs::read(&self.path).await {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "No price history yet");
                return Vec::new();
            }
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "Cannot read price history, starting empty");
                return Vec::new();
            }
        };

        match serde_json::from_slice(&data) {
            Ok(records) => records,
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "Price history is corrupt, starting empty");
                Vec::new()
            }
        }
    }

    /// Overwrites the store with `records`
    #[tracing::instrument(name = "save_price_history", level = "debug", skip_all, fields(routes = records.len()))]
    pub async fn save(&self, records: &[RouteHistory]) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).await?;
        }

        let json = serde_json::to_vec_pretty(records)
            .map_err(|e| FareWatchError::store(format!("Failed to serialize price history: {e}")))?;

        let tmp = self.temp_path();
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Appends today's price for `route`
    pub async fn add_price_point(&self, route: &AirportPair, price: Money) -> Result<()> {
        self.add_price_point_on(route, price, today()).await
    }

    /// Appends a price point dated `date`. Same-day points are not merged.
    #[tracing::instrument(level = "debug", skip(self), fields(route = %route))]
    pub async fn add_price_point_on(
        &self,
        route: &AirportPair,
        price: Money,
        date: NaiveDate,
    ) -> Result<()> {
        let mut records = self.load().await;

        let index = match records.iter().position(|r| &r.airport_pair == route) {
            Some(index) => index,
            None => {
                records.push(RouteHistory::new(route.clone()));
                records.len() - 1
            }
        };
        let record = &mut records[index];

        if let Some(expected) = record.currency()
            && expected != price.currency
        {
            return Err(FareWatchError::CurrencyMismatch {
                route: route.to_string(),
                expected: expected.to_string(),
                actual: price.currency,
            });
        }

        record.history.push(PricePoint { date, price });

        if let Some(days) = self.retention_days {
            let horizon = days_before(date, days);
            let before = record.history.len();
            record.history.retain(|p| p.date >= horizon);
            let pruned = before - record.history.len();
            if pruned > 0 {
                tracing::debug!(pruned, %horizon, "Pruned price points past retention");
            }
        }

        self.save(&records).await
    }

    /// Average price over the trailing `window_days` ending today
    pub async fn window_average(&self, route: &AirportPair, window_days: u32) -> Option<Money> {
        self.window_average_on(route, window_days, today()).await
    }

    /// Average of the points dated within `[today - window_days, today]`.
    ///
    /// `None` when the route is unknown or has no point inside the window. The
    /// currency is taken from the oldest recorded point.
    pub async fn window_average_on(
        &self,
        route: &AirportPair,
        window_days: u32,
        today: NaiveDate,
    ) -> Option<Money> {
        let records = self.load().await;
        let record = records.iter().find(|r| &r.airport_pair == route)?;
        window_average(record, window_days, today)
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// `date - days`, saturating at the earliest representable date
fn days_before(date: NaiveDate, days: u32) -> NaiveDate {
    date.checked_sub_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MIN)
}

fn window_average(record: &RouteHistory, window_days: u32, today: NaiveDate) -> Option<Money> {
    let currency = record.currency()?;
    let start = days_before(today, window_days);

    let amounts: Vec<f64> = record
        .history
        .iter()
        .filter(|p| p.date >= start && p.date <= today)
        .map(|p| p.price.amount)
        .collect();

    if amounts.is_empty() {
        return None;
    }

    let average = amounts.iter().sum::<f64>() / amounts.len() as f64;
    Some(Money::new(average, currency))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn route() -> AirportPair {
        AirportPair::new("JFK", "LHR")
    }

    fn day(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 20).unwrap() + chrono::Duration::days(offset)
    }

    async fn record(store: &PriceRecordStore, amount: f64, date: NaiveDate) {
        store
            .add_price_point_on(&route(), Money::new(amount, "USD"), date)
            .await
            .unwrap();
    }

    fn store(dir: &TempDir) -> PriceRecordStore {
        PriceRecordStore::new(dir.path().join("data").join("priceHistory.json"))
    }

    #[tokio::test]
    async fn test_load_missing_store_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(store(&dir).load().await.is_empty());
    }

    #[tokio::test]
    async fn test_load_corrupt_store_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = PriceRecordStore::new(dir.path().join("priceHistory.json"));
        std::fs::write(store.path(), b"{ not json").unwrap();
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_save_creates_directory_and_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        record(&store, 980.0, day(0)).await;

        assert!(store.path().exists());
        assert!(!store.temp_path().exists());
        let records = store.load().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].airport_pair, route());
        assert_eq!(records[0].history[0].price, Money::new(980.0, "USD"));
    }

    #[tokio::test]
    async fn test_same_day_points_are_not_merged() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        record(&store, 900.0, day(0)).await;
        record(&store, 950.0, day(0)).await;

        let records = store.load().await;
        assert_eq!(records[0].history.len(), 2);
    }

    #[tokio::test]
    async fn test_routes_are_kept_apart() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let other = AirportPair::new("LAX", "CDG");
        record(&store, 900.0, day(0)).await;
        store
            .add_price_point_on(&other, Money::new(1200.0, "USD"), day(0))
            .await
            .unwrap();

        assert_eq!(store.load().await.len(), 2);
        assert_eq!(
            store.window_average_on(&other, 7, day(0)).await,
            Some(Money::new(1200.0, "USD"))
        );
    }

    #[tokio::test]
    async fn test_window_average_ignores_old_points() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        for offset in -6..=0 {
            record(&store, 100.0, day(offset)).await;
        }
        assert_eq!(
            store.window_average_on(&route(), 7, day(0)).await,
            Some(Money::new(100.0, "USD"))
        );

        record(&store, 5000.0, day(-10)).await;
        assert_eq!(
            store.window_average_on(&route(), 7, day(0)).await,
            Some(Money::new(100.0, "USD"))
        );
    }

    #[tokio::test]
    async fn test_window_bounds_are_inclusive() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        record(&store, 100.0, day(-7)).await;
        record(&store, 300.0, day(0)).await;
        record(&store, 999.0, day(1)).await;

        assert_eq!(
            store.window_average_on(&route(), 7, day(0)).await,
            Some(Money::new(200.0, "USD"))
        );
    }

    #[tokio::test]
    async fn test_window_average_without_data() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        assert!(store.window_average_on(&route(), 7, day(0)).await.is_none());

        record(&store, 100.0, day(-30)).await;
        assert!(store.window_average_on(&route(), 7, day(0)).await.is_none());
    }

    #[tokio::test]
    async fn test_currency_mismatch_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        record(&store, 100.0, day(0)).await;

        let err = store
            .add_price_point_on(&route(), Money::new(90.0, "EUR"), day(0))
            .await
            .unwrap_err();
        assert!(matches!(err, FareWatchError::CurrencyMismatch { .. }));
        assert_eq!(store.load().await[0].history.len(), 1);
    }

    #[tokio::test]
    async fn test_retention_prunes_old_points() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir).with_retention(Some(30));
        record(&store, 100.0, day(-40)).await;
        record(&store, 110.0, day(-30)).await;
        record(&store, 120.0, day(0)).await;

        let dates: Vec<NaiveDate> = store.load().await[0]
            .history
            .iter()
            .map(|p| p.date)
            .collect();
        assert_eq!(dates, vec![day(-30), day(0)]);
    }

    #[tokio::test]
    async fn test_window_longer_than_calendar_covers_all_points() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        record(&store, 100.0, day(-400)).await;
        record(&store, 300.0, day(0)).await;

        assert_eq!(
            store.window_average_on(&route(), u32::MAX, day(0)).await,
            Some(Money::new(200.0, "USD"))
        );
    }

    #[tokio::test]
    async fn test_huge_retention_prunes_nothing() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir).with_retention(Some(u32::MAX));
        record(&store, 100.0, day(-400)).await;
        record(&store, 120.0, day(0)).await;

        assert_eq!(store.load().await[0].history.len(), 2);
    }

    #[tokio::test]
    async fn test_reads_document_written_by_earlier_versions() {
        let dir = TempDir::new().unwrap();
        let store = PriceRecordStore::new(dir.path().join("priceHistory.json"));
        let doc = r#"[
  {
    "airportPair": { "origin": "JFK", "destination": "LHR" },
    "history": [
      { "date": "2024-03-19", "price": { "amount": 1000, "currency": "USD" } },
      { "date": "2024-03-20", "price": { "amount": 1200, "currency": "USD" } }
    ]
  }
]"#;
        std::fs::write(store.path(), doc).unwrap();

        assert_eq!(
            store.window_average_on(&route(), 7, day(0)).await,
            Some(Money::new(1100.0, "USD"))
        );
    }
}
