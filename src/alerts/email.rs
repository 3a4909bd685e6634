use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::{
    Message, Transport, transport::smtp::SmtpTransport,
    transport::smtp::authentication::Credentials,
};

use super::AlertSink;
use crate::FareWatchError;
use crate::config::EmailConfig;
use crate::models::ErrorFareSignal;

/// Sends alerts by email through an authenticated SMTP relay
pub struct EmailAlertSink {
    mailer: SmtpTransport,
    from: String,
    to: String,
}

impl EmailAlertSink {
    pub fn new(config: &EmailConfig) -> Result<Self> {
        let missing =
            |field: &str| FareWatchError::config(format!("alerts.email.{field} is required"));

        let username = config.username.clone().ok_or_else(|| missing("username"))?;
        let password = config.password.clone().ok_or_else(|| missing("password"))?;
        let credentials = Credentials::new(username.clone(), password);

        let mailer = SmtpTransport::relay(&config.smtp_relay)?
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from: config.from.clone().unwrap_or(username),
            to: config.to.clone().ok_or_else(|| missing("to"))?,
        })
    }
}

fn alert_message(from: &str, to: &str, signal: &ErrorFareSignal) -> Result<Message> {
    let message = Message::builder()
        .from(
            format!("FareWatch <{from}>")
                .parse()
                .context("Failed to parse from address")?,
        )
        .to(to.parse().context("Failed to parse to address")?)
        .subject(format!(
            "Error fare {}: {}% off",
            signal.airport_pair,
            signal.rounded_discount()
        ))
        .body(signal.to_string())?;
    Ok(message)
}

#[async_trait]
impl AlertSink for EmailAlertSink {
    async fn send_error_fare_alert(&self, signal: &ErrorFareSignal) -> Result<()> {
        let email = alert_message(&self.from, &self.to, signal)?;
        let mailer = self.mailer.clone();

        tokio::task::spawn_blocking(move || mailer.send(&email))
            .await?
            .map_err(|e| FareWatchError::alert(format!("Failed to send email: {e}")))?;

        tracing::info!("Sent error fare email for {} to {}", signal.airport_pair, self.to);
        Ok(())
    }
}
