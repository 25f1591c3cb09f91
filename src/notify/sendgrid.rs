//! SendGrid mail delivery
//!
//! Posts single-recipient messages to the SendGrid v3 `mail/send` endpoint.
//! Any non-2xx response counts as a failed delivery.

use super::Notifier;
use crate::error::{Result, StudySyncError};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

/// SendGrid-backed [`Notifier`]
#[derive(Debug, Clone)]
pub struct SendGridNotifier {
    client: Client,
    api_base: String,
    api_key: String,
    from_address: String,
}

impl SendGridNotifier {
    /// Create a new SendGrid notifier
    ///
    /// # Arguments
    ///
    /// * `api_base` - API base URL, e.g. `https://api.sendgrid.com`
    /// * `api_key` - Bearer key
    /// * `from_address` - Sender address
    ///
    /// # Examples
    ///
    /// ```
    /// use studysync::notify::SendGridNotifier;
    ///
    /// let notifier = SendGridNotifier::new(
    ///     "https://api.sendgrid.com".to_string(),
    ///     "SG.key".to_string(),
    ///     "noreply@studysync.local".to_string(),
    /// );
    /// assert!(notifier.is_ok());
    /// ```
    pub fn new(api_base: String, api_key: String, from_address: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("studysync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StudySyncError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key,
            from_address,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v3/mail/send", self.api_base)
    }
}

#[async_trait]
impl Notifier for SendGridNotifier {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<()> {
        let body = json!({
            "personalizations": [{ "to": [{ "email": to }] }],
            "from": { "email": self.from_address },
            "subject": subject,
            "content": [{ "type": "text/html", "value": html }],
        });

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| StudySyncError::DeliveryFailure {
                recipient: to.to_string(),
                reason: format!("request failed: {}", e),
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("SendGrid returned error {}: {}", status, error_text);
            return Err(StudySyncError::DeliveryFailure {
                recipient: to.to_string(),
                reason: format!("status {}: {}", status.as_u16(), error_text),
            }
            .into());
        }

        tracing::debug!(to = %to, status = status.as_u16(), "SendGrid accepted message");
        Ok(())
    }
}
