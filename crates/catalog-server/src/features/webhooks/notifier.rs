//! Outbound event notification
//!
//! [`Notifier::notify`] records the event in `webhook_events` and POSTs it to
//! every enabled subscriber. It runs detached from the caller; failures are
//! logged and never reach the request that triggered them.

use std::time::Duration;

use chrono::Utc;
use serde_json::{json, Value};
use sqlx::{types::Json, PgPool};

use super::error::WebhookError;
use super::queries;
use super::types::WebhookEventType;

#[derive(Clone)]
pub struct Notifier {
    pool: PgPool,
    client: reqwest::Client,
}

impl Notifier {
    pub fn new(pool: PgPool, timeout: Duration) -> Result<Self, WebhookError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("catalog-server/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { pool, client })
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Fire and forget
    pub fn notify(&self, event: WebhookEventType, payload: Value) {
        let notifier = self.clone();
        tokio::spawn(async move {
            if let Err(err) = notifier.dispatch(event, payload).await {
                tracing::warn!(error = %err, event = %event, "Webhook notification failed");
            }
        });
    }

    /// Record the event and deliver it. Returns how many subscribers answered
    /// with a success status.
    #[tracing::instrument(skip(self, payload), fields(event = %event))]
    pub async fn dispatch(&self, event: WebhookEventType, payload: Value) -> Result<usize, WebhookError> {
        sqlx::query("INSERT INTO webhook_events (event_type, payload) VALUES ($1, $2)")
            .bind(event.as_str())
            .bind(Json(&payload))
            .execute(&self.pool)
            .await?;

        let subscribers = queries::subscribers(&self.pool, event).await?;
        if subscribers.is_empty() {
            return Ok(0);
        }

        let body = json!({
            "event": event.as_str(),
            "payload": payload,
            "timestamp": Utc::now(),
        });

        let mut delivered = 0;
        for webhook in subscribers {
            match self.client.post(&webhook.url).json(&body).send().await {
                Ok(response) if response.status().is_success() => delivered += 1,
                Ok(response) => tracing::warn!(
                    webhook_id = webhook.id,
                    status = %response.status(),
                    "Webhook answered with an error status"
                ),
                Err(err) => tracing::warn!(
                    webhook_id = webhook.id,
                    error = %err,
                    "Webhook delivery failed"
                ),
            }
        }

        tracing::debug!(delivered, "Webhook notification sent");
        Ok(delivered)
    }
}
