//! Alert delivery channels

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::{AlertChannel, AlertsConfig};
use crate::models::ErrorFareSignal;

pub mod email;
pub mod sms;

pub use email::EmailAlertSink;
pub use sms::SmsAlertSink;

#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn send_error_fare_alert(&self, signal: &ErrorFareSignal) -> Result<()>;
}

/// Writes alerts to the log instead of delivering them
pub struct LogAlertSink;

#[async_trait]
impl AlertSink for LogAlertSink {
    async fn send_error_fare_alert(&self, signal: &ErrorFareSignal) -> Result<()> {
        tracing::info!(route = %signal.airport_pair, "\n{signal}");
        Ok(())
    }
}

/// Builds the sink selected by `alerts.channel`
pub fn from_config(config: &AlertsConfig) -> Result<Arc<dyn AlertSink>> {
    let sink: Arc<dyn AlertSink> = match config.channel {
        AlertChannel::Sms => Arc::new(SmsAlertSink::new(&config.sms)?),
        AlertChannel::Email => Arc::new(EmailAlertSink::new(&config.email)?),
        AlertChannel::Log => Arc::new(LogAlertSink),
    };
    Ok(sink)
}
