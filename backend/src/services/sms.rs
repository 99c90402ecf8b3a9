//! SMS dispatch for first-time matches
//!
//! Posts a form-encoded message to the Twilio message-create endpoint with
//! basic auth. Only constructed when all four credentials are configured;
//! upstream failures are logged by the caller and never fail the match.

use std::time::Duration;

use anyhow::Result;

use crate::config::Config;

const SMS_TIMEOUT: Duration = Duration::from_secs(15);

/// Client for the upstream SMS provider
pub struct SmsNotifier {
    client: reqwest::Client,
    account_sid: String,
    auth_token: String,
    from_number: String,
    to_number: String,
}

impl SmsNotifier {
    /// Build a notifier when every credential is present, `None` otherwise
    pub fn from_config(config: &Config) -> Option<Self> {
        Some(Self {
            client: reqwest::Client::builder()
                .timeout(SMS_TIMEOUT)
                .build()
                .ok()?,
            account_sid: config.twilio_account_sid.clone()?,
            auth_token: config.twilio_auth_token.clone()?,
            from_number: config.twilio_from_number.clone()?,
            to_number: config.alert_to_number.clone()?,
        })
    }

    /// Send a match alert. Non-2xx responses are errors for the caller to log.
    pub async fn send_match_alert(
        &self,
        item_text: &str,
        matched_title: &str,
        matched_url: &str,
        site: &str,
    ) -> Result<()> {
        let body = format!(
            "Match found on {}\nItem: {}\nTitle: {}\n{}",
            site, item_text, matched_title, matched_url
        );

        let url = format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
            self.account_sid
        );

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[
                ("From", self.from_number.as_str()),
                ("To", self.to_number.as_str()),
                ("Body", body.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("twilio status: {}", response.status());
        }
        Ok(())
    }
}
