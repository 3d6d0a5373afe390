use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::store::models::Quest;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("Delivery endpoint rejected message: {0}")]
    Rejected(String),
}

/// Outbound booking notifications. Delivery is best-effort: callers log
/// failures and never let them fail the request.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn booking_confirmation(&self, email: &str, quest: &Quest) -> Result<(), NotifyError>;
}

/// Default notifier: records the would-be message in the log. Used when no
/// delivery endpoint is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn booking_confirmation(&self, email: &str, quest: &Quest) -> Result<(), NotifyError> {
        info!("booking confirmation for {} (quest: {})", email, quest.title);
        Ok(())
    }
}

/// Hands the message to an external delivery endpoint over HTTP. The endpoint
/// owns SMTP and templating; this service only posts the payload.
pub struct WebhookNotifier {
    client: reqwest::Client,
    endpoint: Url,
    from_address: String,
}

impl WebhookNotifier {
    pub fn new(endpoint: Url, from_address: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            from_address: from_address.into(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn booking_confirmation(&self, email: &str, quest: &Quest) -> Result<(), NotifyError> {
        let text = match quest.date {
            Some(date) => format!(
                "You are booked for quest: {}\nDate: {}",
                quest.title,
                date.to_rfc3339()
            ),
            None => format!("You are booked for quest: {}", quest.title),
        };

        let resp = self
            .client
            .post(self.endpoint.clone())
            .json(&json!({
                "from": self.from_address,
                "to": email,
                "subject": "Quest booking confirmed",
                "text": text,
            }))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(NotifyError::Rejected(format!("status {}", resp.status())));
        }
        Ok(())
    }
}
