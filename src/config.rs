//! Configuration management for the `FareWatch` service
//!
//! Handles loading configuration from files and environment variables and
//! validates every setting before the scheduler starts.

use crate::FareWatchError;
use crate::models::AirportPair;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Root configuration structure for the `FareWatch` service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FareWatchConfig {
    /// Recurrence of fare checks
    #[serde(default)]
    pub schedule: ScheduleConfig,
    /// Error fare thresholds
    #[serde(default)]
    pub detection: DetectionConfig,
    /// Price history storage
    #[serde(default)]
    pub store: StoreConfig,
    /// Monitored routes, checked in this order
    #[serde(default = "default_routes")]
    pub routes: Vec<AirportPair>,
    /// Amadeus quote source settings
    #[serde(default)]
    pub amadeus: AmadeusConfig,
    /// Alert delivery settings
    #[serde(default)]
    pub alerts: AlertsConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Cron expression, five fields or six/seven with seconds
    #[serde(default = "default_schedule_expression")]
    pub expression: String,
    /// Run one check immediately at startup
    #[serde(default = "default_true")]
    pub run_on_startup: bool,
    /// Deadline for each quote fetch and alert delivery
    #[serde(default = "default_call_timeout")]
    pub call_timeout_seconds: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Minimum discount against the baseline, as a fraction
    #[serde(default = "default_discount_threshold")]
    pub discount_threshold: f64,
    /// Minimum bookable seats
    #[serde(default = "default_min_seats")]
    pub min_seats: u32,
    /// Baseline averaging window in days
    #[serde(default = "default_window_days")]
    pub window_days: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Price history JSON document
    #[serde(default = "default_store_path")]
    pub path: String,
    /// Drop points older than this many days (keeps everything when unset)
    pub retention_days: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmadeusConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    #[serde(default = "default_amadeus_base_url")]
    pub base_url: String,
    /// Request timeout in seconds
    #[serde(default = "default_amadeus_timeout")]
    pub timeout_seconds: u32,
    /// Maximum number of retries for transient failures
    #[serde(default = "default_amadeus_max_retries")]
    pub max_retries: u32,
    /// Offers requested per search
    #[serde(default = "default_max_offers")]
    pub max_offers: u32,
    /// Directory of the access token cache
    pub token_cache_path: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertChannel {
    #[default]
    Sms,
    Email,
    Log,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertsConfig {
    #[serde(default)]
    pub channel: AlertChannel,
    #[serde(default)]
    pub sms: SmsConfig,
    #[serde(default)]
    pub email: EmailConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SmsConfig {
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    #[serde(default = "default_smtp_relay")]
    pub smtp_relay: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (pretty or json)
    #[serde(default = "default_log_format")]
    pub format: String,
    /// OTLP/HTTP collector endpoint; telemetry export is off when unset
    pub otlp_endpoint: Option<String>,
}

/// Upper bound for the averaging window and the retention horizon
pub const MAX_HISTORY_DAYS: u32 = 3650;

// Default value functions
fn default_true() -> bool {
    true
}

fn default_schedule_expression() -> String {
    "0 * * * *".to_string()
}

fn default_call_timeout() -> u32 {
    60
}

fn default_discount_threshold() -> f64 {
    0.8
}

fn default_min_seats() -> u32 {
    2
}

fn default_window_days() -> u32 {
    crate::price_history::DEFAULT_WINDOW_DAYS
}

fn default_store_path() -> String {
    "data/priceHistory.json".to_string()
}

fn default_routes() -> Vec<AirportPair> {
    vec![AirportPair::new("JFK", "LHR"), AirportPair::new("LAX", "CDG")]
}

fn default_amadeus_base_url() -> String {
    "https://test.api.amadeus.com".to_string()
}

fn default_amadeus_timeout() -> u32 {
    30
}

fn default_amadeus_max_retries() -> u32 {
    3
}

fn default_max_offers() -> u32 {
    5
}

fn default_smtp_relay() -> String {
    "smtp.gmail.com".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            expression: default_schedule_expression(),
            run_on_startup: true,
            call_timeout_seconds: default_call_timeout(),
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            discount_threshold: default_discount_threshold(),
            min_seats: default_min_seats(),
            window_days: default_window_days(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            retention_days: None,
        }
    }
}

impl Default for AmadeusConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            base_url: default_amadeus_base_url(),
            timeout_seconds: default_amadeus_timeout(),
            max_retries: default_amadeus_max_retries(),
            max_offers: default_max_offers(),
            token_cache_path: None,
        }
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_relay: default_smtp_relay(),
            username: None,
            password: None,
            from: None,
            to: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            otlp_endpoint: None,
        }
    }
}

impl FareWatchConfig {
    /// Load configuration from specified path
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        let config_file = config_path.unwrap_or_else(|| {
            Self::get_config_path()
                .filter(|p| p.exists())
                .unwrap_or_else(|| PathBuf::from("config.toml"))
        });

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // Environment overrides with FAREWATCH_ prefix, e.g. FAREWATCH_DETECTION__MIN_SEATS
        builder = builder.add_source(
            Environment::with_prefix("FAREWATCH")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let mut config: FareWatchConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        config.apply_env_credentials();
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("farewatch").join("config.toml"))
    }

    /// Fill missing credentials from the provider-conventional environment variables
    pub fn apply_env_credentials(&mut self) {
        fn fill(slot: &mut Option<String>, var: &str) {
            if slot.is_none() {
                *slot = env::var(var).ok().filter(|v| !v.is_empty());
            }
        }

        fill(&mut self.amadeus.client_id, "AMADEUS_CLIENT_ID");
        fill(&mut self.amadeus.client_secret, "AMADEUS_CLIENT_SECRET");
        fill(&mut self.alerts.sms.account_sid, "TWILIO_ACCOUNT_SID");
        fill(&mut self.alerts.sms.auth_token, "TWILIO_AUTH_TOKEN");
        fill(&mut self.alerts.sms.from, "TWILIO_FROM_NUMBER");
        fill(&mut self.alerts.sms.to, "TWILIO_TO_NUMBER");
        fill(&mut self.alerts.email.username, "SMTP_USERNAME");
        fill(&mut self.alerts.email.password, "SMTP_PASSWORD");
        fill(&mut self.alerts.email.to, "NOTIFICATION_EMAIL");
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_schedule()?;
        self.validate_detection()?;
        self.validate_routes()?;
        self.validate_credentials()?;
        self.validate_string_values()?;
        Ok(())
    }

    fn validate_schedule(&self) -> Result<()> {
        crate::scheduler::parse_schedule(&self.schedule.expression)?;

        if self.schedule.call_timeout_seconds == 0 {
            return Err(FareWatchError::config("Call timeout must be at least 1 second").into());
        }
        Ok(())
    }

    fn validate_detection(&self) -> Result<()> {
        let detection = &self.detection;

        if !(0.0..=1.0).contains(&detection.discount_threshold) {
            return Err(FareWatchError::config(
                "Discount threshold must be between 0 and 1",
            )
            .into());
        }

        if detection.min_seats < 1 {
            return Err(FareWatchError::config("Minimum seats must be at least 1").into());
        }

        if !(1..=MAX_HISTORY_DAYS).contains(&detection.window_days) {
            return Err(FareWatchError::config(format!(
                "Averaging window must be between 1 and {MAX_HISTORY_DAYS} days"
            ))
            .into());
        }

        let Some(retention) = self.store.retention_days else {
            return Ok(());
        };

        if retention > MAX_HISTORY_DAYS {
            return Err(FareWatchError::config(format!(
                "Retention must be at most {MAX_HISTORY_DAYS} days"
            ))
            .into());
        }

        if retention < detection.window_days {
            return Err(FareWatchError::config(format!(
                "Retention of {retention} days is shorter than the {}-day averaging window",
                detection.window_days
            ))
            .into());
        }

        Ok(())
    }

    fn validate_routes(&self) -> Result<()> {
        if self.routes.is_empty() {
            return Err(FareWatchError::config("At least one route must be monitored").into());
        }

        if let Some(route) = self.routes.iter().find(|r| !r.has_valid_codes()) {
            return Err(FareWatchError::config(format!(
                "Invalid route {route}: airport codes must be three uppercase letters"
            ))
            .into());
        }

        Ok(())
    }

    /// Validate credentials of the selected alert channel
    pub fn validate_credentials(&self) -> Result<()> {
        if self.alerts.channel != AlertChannel::Sms {
            return Ok(());
        }
        let sms = &self.alerts.sms;

        if let Some(sid) = &sms.account_sid
            && !sid.starts_with("AC")
        {
            return Err(FareWatchError::config("Invalid Twilio Account SID format").into());
        }

        if let Some(token) = &sms.auth_token
            && token.len() < 32
        {
            return Err(FareWatchError::config("Invalid Twilio Auth Token format").into());
        }

        for number in [&sms.from, &sms.to].into_iter().flatten() {
            if !number.starts_with('+') {
                return Err(FareWatchError::config(format!(
                    "Phone number '{number}' must start with +"
                ))
                .into());
            }
        }

        Ok(())
    }

    /// Validate string configuration values
    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(FareWatchError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(FareWatchError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        if !self.amadeus.base_url.starts_with("http://")
            && !self.amadeus.base_url.starts_with("https://")
        {
            return Err(FareWatchError::config(
                "Amadeus base URL must be a valid HTTP or HTTPS URL",
            )
            .into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = FareWatchConfig {
            routes: default_routes(),
            ..FareWatchConfig::default()
        };
        assert_eq!(config.schedule.expression, "0 * * * *");
        assert!(config.schedule.run_on_startup);
        assert_eq!(config.detection.discount_threshold, 0.8);
        assert_eq!(config.detection.min_seats, 2);
        assert_eq!(config.detection.window_days, 7);
        assert_eq!(config.store.path, "data/priceHistory.json");
        assert_eq!(config.alerts.channel, AlertChannel::Sms);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_threshold_out_of_range() {
        let mut config = FareWatchConfig {
            routes: default_routes(),
            ..FareWatchConfig::default()
        };
        config.detection.discount_threshold = 1.5;
        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("Discount threshold"));
    }

    #[test]
    fn test_zero_min_seats() {
        let mut config = FareWatchConfig {
            routes: default_routes(),
            ..FareWatchConfig::default()
        };
        config.detection.min_seats = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_cron_expression() {
        let mut config = FareWatchConfig {
            routes: default_routes(),
            ..FareWatchConfig::default()
        };
        config.schedule.expression = "every hour".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_retention_shorter_than_window() {
        let mut config = FareWatchConfig {
            routes: default_routes(),
            ..FareWatchConfig::default()
        };
        config.store.retention_days = Some(3);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Retention"));
    }

    #[test]
    fn test_history_spans_are_bounded() {
        let mut config = FareWatchConfig {
            routes: default_routes(),
            ..FareWatchConfig::default()
        };
        config.detection.window_days = u32::MAX;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Averaging window"));

        config.detection.window_days = MAX_HISTORY_DAYS;
        assert!(config.validate().is_ok());

        config.detection.window_days = 7;
        config.store.retention_days = Some(u32::MAX);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Retention must be at most"));

        config.store.retention_days = Some(MAX_HISTORY_DAYS);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_route_code() {
        let mut config = FareWatchConfig::default();
        config.routes = vec![AirportPair::new("JFK", "london")];
        assert!(config.validate().is_err());

        config.routes.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_twilio_credential_formats() {
        let mut config = FareWatchConfig {
            routes: default_routes(),
            ..FareWatchConfig::default()
        };
        config.alerts.sms.account_sid = Some("XX123".to_string());
        assert!(config.validate_credentials().is_err());

        config.alerts.sms.account_sid = Some("AC123".to_string());
        config.alerts.sms.to = Some("5550001111".to_string());
        let err = config.validate_credentials().unwrap_err();
        assert!(err.to_string().contains("must start with +"));

        config.alerts.channel = AlertChannel::Log;
        assert!(config.validate_credentials().is_ok());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = FareWatchConfig {
            routes: default_routes(),
            ..FareWatchConfig::default()
        };
        config.logging.level = "invalid".to_string();
        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("Invalid log level"));
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(
            file,
            r#"
[schedule]
expression = "0 */30 * * * *"
run_on_startup = false

[detection]
discount_threshold = 0.25
min_seats = 3

[[routes]]
origin = "SFO"
destination = "NRT"

[alerts]
channel = "log"
"#
        )
        .unwrap();

        let config = FareWatchConfig::load_from_path(Some(file.path().to_path_buf())).unwrap();
        assert!(!config.schedule.run_on_startup);
        assert_eq!(config.detection.discount_threshold, 0.25);
        assert_eq!(config.detection.min_seats, 3);
        assert_eq!(config.detection.window_days, 7);
        assert_eq!(config.routes, vec![AirportPair::new("SFO", "NRT")]);
        assert_eq!(config.alerts.channel, AlertChannel::Log);
    }

    #[test]
    fn test_config_path_generation() {
        if let Some(path) = FareWatchConfig::get_config_path() {
            assert!(path.to_string_lossy().contains("farewatch"));
            assert!(path.to_string_lossy().contains("config.toml"));
        }
    }
}
