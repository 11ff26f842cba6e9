//! Webhook write commands
//!
//! Each command is a plain data structure with a `validate` method and a
//! standalone async handler holding the SQL.

use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;

use super::error::WebhookError;
use super::types::{Webhook, WebhookEventType, WEBHOOK_COLUMNS};
use crate::features::shared::validation::validate_url;

/// Longest response body echoed back from a test call
const MAX_TEST_BODY_CHARS: usize = 2_000;

fn default_enabled() -> bool {
    true
}

/// Create or replace a webhook subscription
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveWebhookCommand {
    pub url: String,
    pub event_type: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl SaveWebhookCommand {
    pub fn validate(&self) -> Result<WebhookEventType, WebhookError> {
        validate_url(&self.url, "Webhook URL")?;
        Ok(self.event_type.parse()?)
    }
}

#[tracing::instrument(skip(pool, command), fields(url = %command.url, event_type = %command.event_type))]
pub async fn create(pool: &PgPool, command: SaveWebhookCommand) -> Result<Webhook, WebhookError> {
    let event = command.validate()?;

    let webhook = sqlx::query_as::<_, Webhook>(&format!(
        "INSERT INTO webhooks (url, event_type, enabled) VALUES ($1, $2, $3) \
         RETURNING {WEBHOOK_COLUMNS}"
    ))
    .bind(command.url.trim())
    .bind(event.as_str())
    .bind(command.enabled)
    .fetch_one(pool)
    .await?;

    tracing::info!(webhook_id = webhook.id, "Webhook created");
    Ok(webhook)
}

#[tracing::instrument(skip(pool, command), fields(url = %command.url, event_type = %command.event_type))]
pub async fn update(
    pool: &PgPool,
    id: i64,
    command: SaveWebhookCommand,
) -> Result<Webhook, WebhookError> {
    let event = command.validate()?;

    sqlx::query_as::<_, Webhook>(&format!(
        "UPDATE webhooks SET url = $2, event_type = $3, enabled = $4 WHERE id = $1 \
         RETURNING {WEBHOOK_COLUMNS}"
    ))
    .bind(id)
    .bind(command.url.trim())
    .bind(event.as_str())
    .bind(command.enabled)
    .fetch_optional(pool)
    .await?
    .ok_or(WebhookError::NotFound(id))
}

#[tracing::instrument(skip(pool))]
pub async fn delete(pool: &PgPool, id: i64) -> Result<(), WebhookError> {
    let result = sqlx::query("DELETE FROM webhooks WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(WebhookError::NotFound(id));
    }
    tracing::info!("Webhook deleted");
    Ok(())
}

/// Flip `enabled`
#[tracing::instrument(skip(pool))]
pub async fn toggle(pool: &PgPool, id: i64) -> Result<Webhook, WebhookError> {
    sqlx::query_as::<_, Webhook>(&format!(
        "UPDATE webhooks SET enabled = NOT enabled WHERE id = $1 RETURNING {WEBHOOK_COLUMNS}"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(WebhookError::NotFound(id))
}

/// Result of a test delivery
#[derive(Debug, Clone, Serialize)]
pub struct TestDelivery {
    pub success: bool,
    pub status_code: Option<u16>,
    /// Milliseconds
    pub response_time: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub webhook: Webhook,
}

/// POST a sample payload to the webhook and record the outcome on the row.
///
/// A failed delivery is a normal result (`success: false`), not an error.
#[tracing::instrument(skip(pool, client))]
pub async fn test(
    pool: &PgPool,
    client: &reqwest::Client,
    id: i64,
) -> Result<TestDelivery, WebhookError> {
    let webhook = super::queries::get(pool, id).await?;

    let payload = json!({
        "event": "webhook.test",
        "webhook_id": webhook.id,
        "message": "This is a test delivery from the product catalog",
        "timestamp": Utc::now(),
    });

    let started = Instant::now();
    let sent = client.post(&webhook.url).json(&payload).send().await;

    let (status_code, response_body, error) = match sent {
        Ok(response) => {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(MAX_TEST_BODY_CHARS).collect();
            (Some(status.as_u16()), Some(body), None)
        }
        Err(err) => {
            tracing::warn!(error = %err, url = %webhook.url, "Webhook test delivery failed");
            let reason = if err.is_timeout() {
                "Request timed out".to_string()
            } else {
                err.to_string()
            };
            (None, None, Some(reason))
        }
    };
    let response_time = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);

    let webhook = sqlx::query_as::<_, Webhook>(&format!(
        "UPDATE webhooks SET last_test_at = NOW(), last_test_status = $2, \
         last_test_response_time = $3 WHERE id = $1 RETURNING {WEBHOOK_COLUMNS}"
    ))
    .bind(id)
    .bind(status_code.map(i32::from))
    .bind(response_time)
    .fetch_optional(pool)
    .await?
    .ok_or(WebhookError::NotFound(id))?;

    let success = status_code.is_some_and(|code| (200..300).contains(&code));
    let error = error.or_else(|| (!success).then(|| "Non-success status code".to_string()));

    tracing::info!(status_code, response_time, success, "Webhook tested");

    Ok(TestDelivery {
        success,
        status_code,
        response_time,
        response_body,
        error,
        webhook,
    })
}
