//! Amadeus flight-offers search client

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use oauth2::{
    AuthType, AuthUrl, ClientId, ClientSecret, TokenResponse, TokenUrl, basic::BasicClient,
};
use reqwest::{StatusCode, Url};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use super::QuoteSource;
use crate::FareWatchError;
use crate::cache::PersistentCache;
use crate::config::AmadeusConfig;
use crate::models::{AirportPair, Money, Quote};

const TOKEN_CACHE_KEY: &str = "amadeus_token";
/// Refresh this long before the provider-reported expiry
const TOKEN_EXPIRY_MARGIN_SECS: i64 = 60;
const TRIP_LENGTH_DAYS: u64 = 7;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredToken {
    access_token: String,
    expiry: DateTime<Utc>,
}

impl StoredToken {
    fn is_fresh(&self) -> bool {
        self.expiry - TimeDelta::seconds(TOKEN_EXPIRY_MARGIN_SECS) > Utc::now()
    }
}

/// Client-credentials token holder
struct AmadeusAuth {
    client: BasicClient,
    cache: Option<Arc<PersistentCache>>,
    current: Mutex<Option<StoredToken>>,
}

impl AmadeusAuth {
    fn new(
        base_url: &str,
        client_id: String,
        client_secret: String,
        cache: Option<Arc<PersistentCache>>,
    ) -> Result<Self> {
        let token_url = format!("{base_url}/v1/security/oauth2/token");
        let client = BasicClient::new(
            ClientId::new(client_id),
            Some(ClientSecret::new(client_secret)),
            AuthUrl::new(token_url.clone()).context("Invalid Amadeus auth URL")?,
            Some(TokenUrl::new(token_url).context("Invalid Amadeus token URL")?),
        )
        .set_auth_type(AuthType::RequestBody);

        Ok(Self {
            client,
            cache,
            current: Mutex::new(None),
        })
    }

    async fn access_token(&self) -> Result<String> {
        let mut current = self.current.lock().await;

        if let Some(token) = current.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.access_token.clone());
        }

        if let Some(cache) = &self.cache {
            match cache.get::<StoredToken>(TOKEN_CACHE_KEY).await {
                Ok(Some(token)) if token.is_fresh() => {
                    debug!("Using cached Amadeus token");
                    let access_token = token.access_token.clone();
                    *current = Some(token);
                    return Ok(access_token);
                }
                Ok(_) => {}
                Err(err) => warn!("Token cache read failed: {err:#}"),
            }
        }

        let token = self.request_token().await?;
        let access_token = token.access_token.clone();

        if let Some(cache) = &self.cache {
            if let Err(err) = cache
                .put_until(TOKEN_CACHE_KEY, token.clone(), token.expiry)
                .await
            {
                warn!("Token cache write failed: {err:#}");
            }
        }

        *current = Some(token);
        Ok(access_token)
    }

    async fn request_token(&self) -> Result<StoredToken> {
        debug!("Requesting Amadeus access token");
        let response = self
            .client
            .exchange_client_credentials()
            .request_async(oauth2::reqwest::async_http_client)
            .await
            .context("Failed to obtain Amadeus access token")?;

        let expires_in = response
            .expires_in()
            .map(|d| d.as_secs() as i64)
            .unwrap_or(1799);

        Ok(StoredToken {
            access_token: response.access_token().secret().clone(),
            expiry: Utc::now() + TimeDelta::seconds(expires_in),
        })
    }

    async fn invalidate(&self) {
        *self.current.lock().await = None;
        if let Some(cache) = &self.cache
            && let Err(err) = cache.remove(TOKEN_CACHE_KEY).await
        {
            warn!("Token cache removal failed: {err:#}");
        }
    }
}

/// Quote source backed by the Amadeus Self-Service flight offers API
pub struct AmadeusQuoteSource {
    http: ClientWithMiddleware,
    base_url: String,
    max_offers: u32,
    auth: AmadeusAuth,
}

impl AmadeusQuoteSource {
    pub fn new(config: &AmadeusConfig, token_cache: Option<Arc<PersistentCache>>) -> Result<Self> {
        let client_id = config
            .client_id
            .clone()
            .ok_or_else(|| FareWatchError::config("Amadeus client id is required"))?;
        let client_secret = config
            .client_secret
            .clone()
            .ok_or_else(|| FareWatchError::config("Amadeus client secret is required"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(u64::from(config.timeout_seconds)))
            .user_agent(concat!("FareWatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(config.max_retries);
        let http = ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        let base_url = config.base_url.trim_end_matches('/').to_string();
        let auth = AmadeusAuth::new(&base_url, client_id, client_secret, token_cache)?;

        Ok(Self {
            http,
            base_url,
            max_offers: config.max_offers,
            auth,
        })
    }

    fn search_url(&self, route: &AirportPair, departure: NaiveDate) -> Result<Url> {
        let return_date = departure + Days::new(TRIP_LENGTH_DAYS);
        let url = Url::parse_with_params(
            &format!("{}/v2/shopping/flight-offers", self.base_url),
            &[
                ("originLocationCode", route.origin.clone()),
                ("destinationLocationCode", route.destination.clone()),
                ("departureDate", departure.format("%Y-%m-%d").to_string()),
                ("returnDate", return_date.format("%Y-%m-%d").to_string()),
                ("adults", "1".to_string()),
                ("max", self.max_offers.to_string()),
            ],
        )?;
        Ok(url)
    }
}

#[async_trait]
impl QuoteSource for AmadeusQuoteSource {
    #[instrument(skip(self), fields(route = %route))]
    async fn search_flights(&self, route: &AirportPair) -> Result<Vec<Quote>> {
        let departure = Utc::now().date_naive() + Days::new(1);
        let url = self.search_url(route, departure)?;
        let token = self.auth.access_token().await?;

        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| FareWatchError::api(format!("Flight search request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::UNAUTHORIZED => {
                    self.auth.invalidate().await;
                    FareWatchError::api("Amadeus rejected the access token")
                }
                StatusCode::TOO_MANY_REQUESTS => {
                    FareWatchError::api("Amadeus rate limit exceeded")
                }
                _ => FareWatchError::api(format!("Amadeus error {status}: {error_text}")),
            }
            .into());
        }

        let body: FlightOffersResponse = response
            .json()
            .await
            .map_err(|e| FareWatchError::api(format!("Failed to parse flight offers: {e}")))?;

        let quotes = body.into_quotes();
        debug!("Received {} offers", quotes.len());
        Ok(quotes)
    }
}

#[derive(Debug, Deserialize)]
struct FlightOffersResponse {
    #[serde(default)]
    data: Vec<FlightOffer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlightOffer {
    price: Option<OfferPrice>,
    #[serde(default)]
    number_of_bookable_seats: u32,
    #[serde(default)]
    itineraries: Vec<Itinerary>,
}

#[derive(Debug, Deserialize)]
struct OfferPrice {
    currency: String,
    total: String,
}

#[derive(Debug, Deserialize)]
struct Itinerary {
    #[serde(default)]
    segments: Vec<Segment>,
}

#[derive(Debug, Deserialize)]
struct Segment {
    departure: Option<Endpoint>,
}

#[derive(Debug, Deserialize)]
struct Endpoint {
    at: Option<NaiveDateTime>,
}

impl FlightOffersResponse {
    /// Converts offers into quotes sorted by ascending price, dropping malformed offers
    fn into_quotes(self) -> Vec<Quote> {
        let mut quotes: Vec<Quote> = self
            .data
            .into_iter()
            .filter_map(|offer| match offer.into_quote() {
                Ok(quote) => Some(quote),
                Err(err) => {
                    warn!("Skipping malformed flight offer: {err}");
                    None
                }
            })
            .collect();
        quotes.sort_by(|a, b| a.price.amount.total_cmp(&b.price.amount));
        quotes
    }
}

impl FlightOffer {
    fn into_quote(self) -> std::result::Result<Quote, String> {
        let price = self.price.ok_or("missing price")?;
        let amount: f64 = price
            .total
            .parse()
            .map_err(|_| format!("invalid price total '{}'", price.total))?;

        let leg_departure = |index: usize| {
            self.itineraries
                .get(index)
                .and_then(|i| i.segments.first())
                .and_then(|s| s.departure.as_ref())
                .and_then(|d| d.at)
                .ok_or_else(|| format!("missing departure time on itinerary {index}"))
        };
        let departure_date = leg_departure(0)?;
        let return_date = leg_departure(1)?;

        Ok(Quote {
            price: Money::new(amount, price.currency),
            available_seats: self.number_of_bookable_seats,
            departure_date,
            return_date,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OFFERS: &str = r#"{
        "meta": { "count": 3 },
        "data": [
            {
                "type": "flight-offer",
                "numberOfBookableSeats": 4,
                "price": { "currency": "USD", "total": "1012.40" },
                "itineraries": [
                    { "segments": [ { "departure": { "iataCode": "JFK", "at": "2024-05-02T18:30:00" } } ] },
                    { "segments": [ { "departure": { "iataCode": "LHR", "at": "2024-05-09T11:05:00" } } ] }
                ]
            },
            {
                "type": "flight-offer",
                "numberOfBookableSeats": 2,
                "price": { "currency": "USD", "total": "980.00" },
                "itineraries": [
                    { "segments": [ { "departure": { "iataCode": "JFK", "at": "2024-05-02T21:00:00" } } ] },
                    { "segments": [ { "departure": { "iataCode": "LHR", "at": "2024-05-09T08:15:00" } } ] }
                ]
            },
            {
                "type": "flight-offer",
                "numberOfBookableSeats": 9,
                "price": { "currency": "USD", "total": "not-a-number" },
                "itineraries": []
            }
        ]
    }"#;

    #[test]
    fn test_offers_become_sorted_quotes() {
        let response: FlightOffersResponse = serde_json::from_str(OFFERS).unwrap();
        let quotes = response.into_quotes();

        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes[0].price, Money::new(980.0, "USD"));
        assert_eq!(quotes[0].available_seats, 2);
        assert_eq!(quotes[0].departure_date.to_string(), "2024-05-02 21:00:00");
        assert_eq!(quotes[0].return_date.to_string(), "2024-05-09 08:15:00");
        assert_eq!(quotes[1].price.amount, 1012.40);
    }

    #[test]
    fn test_incomplete_offers_are_skipped() {
        let body = r#"{
            "data": [
                {
                    "numberOfBookableSeats": 3,
                    "itineraries": [
                        { "segments": [ { "departure": { "at": "2024-05-02T08:00:00" } } ] },
                        { "segments": [ { "departure": { "at": "2024-05-09T08:00:00" } } ] }
                    ]
                },
                {
                    "numberOfBookableSeats": 3,
                    "price": { "currency": "USD", "total": "410.00" },
                    "itineraries": [
                        { "segments": [ { "departure": { "iataCode": "JFK" } } ] },
                        { "segments": [] }
                    ]
                },
                {
                    "numberOfBookableSeats": 5,
                    "price": { "currency": "USD", "total": "899.99" },
                    "itineraries": [
                        { "segments": [ { "departure": { "at": "2024-05-02T10:00:00" } } ] },
                        { "segments": [ { "departure": { "at": "2024-05-09T10:00:00" } } ] }
                    ]
                }
            ]
        }"#;

        let response: FlightOffersResponse = serde_json::from_str(body).unwrap();
        let quotes = response.into_quotes();
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].price, Money::new(899.99, "USD"));
        assert_eq!(quotes[0].available_seats, 5);
    }

    #[test]
    fn test_empty_response_has_no_quotes() {
        let response: FlightOffersResponse = serde_json::from_str(r#"{"data": []}"#).unwrap();
        assert!(response.into_quotes().is_empty());

        let response: FlightOffersResponse = serde_json::from_str("{}").unwrap();
        assert!(response.into_quotes().is_empty());
    }

    #[test]
    fn test_search_url() {
        let config = AmadeusConfig {
            client_id: Some("id".into()),
            client_secret: Some("secret".into()),
            ..AmadeusConfig::default()
        };
        let source = AmadeusQuoteSource::new(&config, None).unwrap();
        let departure = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap();
        let url = source
            .search_url(&AirportPair::new("JFK", "LHR"), departure)
            .unwrap();

        assert_eq!(url.path(), "/v2/shopping/flight-offers");
        let query = url.query().unwrap();
        assert!(query.contains("originLocationCode=JFK"));
        assert!(query.contains("destinationLocationCode=LHR"));
        assert!(query.contains("departureDate=2024-05-02"));
        assert!(query.contains("returnDate=2024-05-09"));
        assert!(query.contains("max=5"));
    }

    #[test]
    fn test_missing_credentials() {
        let result = AmadeusQuoteSource::new(&AmadeusConfig::default(), None);
        assert!(result.is_err());
    }

    #[test]
    fn test_token_freshness() {
        let now = Utc::now();
        let fresh = StoredToken {
            access_token: "a".into(),
            expiry: now + TimeDelta::minutes(10),
        };
        let stale = StoredToken {
            access_token: "b".into(),
            expiry: now + TimeDelta::seconds(30),
        };
        assert!(fresh.is_fresh());
        assert!(!stale.is_fresh());
    }
}
