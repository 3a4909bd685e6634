use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::instrument;

use super::AlertSink;
use crate::FareWatchError;
use crate::config::SmsConfig;
use crate::models::ErrorFareSignal;

const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";

/// Sends alerts as SMS through the Twilio Messages API
pub struct SmsAlertSink {
    client: reqwest::Client,
    account_sid: String,
    auth_token: String,
    from: String,
    to: String,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    sid: String,
}

impl SmsAlertSink {
    pub fn new(config: &SmsConfig) -> Result<Self> {
        let missing = |field: &str| FareWatchError::config(format!("alerts.sms.{field} is required"));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            account_sid: config.account_sid.clone().ok_or_else(|| missing("account_sid"))?,
            auth_token: config.auth_token.clone().ok_or_else(|| missing("auth_token"))?,
            from: config.from.clone().ok_or_else(|| missing("from"))?,
            to: config.to.clone().ok_or_else(|| missing("to"))?,
        })
    }

    fn messages_url(&self) -> String {
        format!("{TWILIO_API_BASE}/Accounts/{}/Messages.json", self.account_sid)
    }
}

#[async_trait]
impl AlertSink for SmsAlertSink {
    #[instrument(skip_all, fields(route = %signal.airport_pair))]
    async fn send_error_fare_alert(&self, signal: &ErrorFareSignal) -> Result<()> {
        let body = signal.to_string();
        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("To", self.to.as_str()), ("From", self.from.as_str()), ("Body", body.as_str())])
            .send()
            .await
            .map_err(|e| FareWatchError::alert(format!("SMS request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(FareWatchError::alert(format!("Twilio error {status}: {error_text}")).into());
        }

        let message: MessageResponse = response
            .json()
            .await
            .context("Failed to parse Twilio response")?;
        tracing::info!("Sent error fare SMS {} to {}", message.sid, self.to);
        Ok(())
    }
}
