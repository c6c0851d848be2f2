//! Outbound email delivery.
//!
//! One call to [`EmailSender::send`] is one delivery attempt for one
//! recipient. Senders never retry; the caller decides what a failure means.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use campaign_core::config::EmailConfig;
use campaign_core::Recipient;
use mockall::automock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A rendered message addressed to one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundEmail {
    pub campaign_id: Uuid,
    pub recipient: Recipient,
    pub subject: String,
    pub html_body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub provider_message_id: String,
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("provider rejected message with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("sender misconfigured: {0}")]
    Config(String),
}

#[automock]
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, email: &OutboundEmail) -> Result<DeliveryReceipt, DeliveryError>;
}

/// SendGrid v3 mail-send provider.
pub struct SendGridSender {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    from_email: String,
    from_name: String,
}

impl SendGridSender {
    pub fn new(config: &EmailConfig, api_key: impl Into<String>) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        info!(
            from = %config.from_email,
            endpoint = %config.sendgrid_endpoint,
            "SendGrid sender initialized"
        );

        Ok(Self {
            client,
            endpoint: config.sendgrid_endpoint.clone(),
            api_key: api_key.into(),
            from_email: config.from_email.clone(),
            from_name: config.from_name.clone(),
        })
    }

    fn payload(&self, email: &OutboundEmail) -> serde_json::Value {
        serde_json::json!({
            "personalizations": [{
                "to": [{"email": email.recipient.email}],
                "custom_args": {
                    "campaign_id": email.campaign_id,
                    "user_id": email.recipient.user_id
                }
            }],
            "from": {
                "email": self.from_email,
                "name": self.from_name
            },
            "subject": email.subject,
            "content": [{
                "type": "text/html",
                "value": email.html_body
            }]
        })
    }
}

#[async_trait]
impl EmailSender for SendGridSender {
    async fn send(&self, email: &OutboundEmail) -> Result<DeliveryReceipt, DeliveryError> {
        debug!(
            campaign_id = %email.campaign_id,
            user_id = %email.recipient.user_id,
            "Sending email via SendGrid"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.payload(email))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                campaign_id = %email.campaign_id,
                status = status.as_u16(),
                "SendGrid rejected message"
            );
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let provider_message_id = response
            .headers()
            .get("x-message-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| format!("sg-{}", Uuid::new_v4()));

        Ok(DeliveryReceipt {
            provider_message_id,
        })
    }
}

/// Dry-run sender: logs each message and reports success.
#[derive(Debug, Default)]
pub struct LogSender;

#[async_trait]
impl EmailSender for LogSender {
    async fn send(&self, email: &OutboundEmail) -> Result<DeliveryReceipt, DeliveryError> {
        info!(
            campaign_id = %email.campaign_id,
            user_id = %email.recipient.user_id,
            subject = %email.subject,
            "Email not delivered (log-only sender)"
        );
        Ok(DeliveryReceipt {
            provider_message_id: format!("log-{}", Uuid::new_v4()),
        })
    }
}

/// SendGrid when an API key is configured, otherwise the log-only sender.
pub fn sender_from_config(config: &EmailConfig) -> Result<Arc<dyn EmailSender>, DeliveryError> {
    match config.sendgrid_api_key.as_deref() {
        Some(key) if !key.trim().is_empty() => Ok(Arc::new(SendGridSender::new(config, key)?)),
        Some(_) => Err(DeliveryError::Config("sendgrid_api_key is blank".into())),
        None => {
            warn!("No SendGrid API key configured, emails will only be logged");
            Ok(Arc::new(LogSender))
        }
    }
}
