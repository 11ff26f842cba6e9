//! Webhook read queries

use sqlx::PgPool;

use super::error::WebhookError;
use super::types::{Webhook, WebhookEventType, WEBHOOK_COLUMNS};

/// All webhooks, newest first
#[tracing::instrument(skip(pool))]
pub async fn list(pool: &PgPool) -> Result<Vec<Webhook>, WebhookError> {
    let webhooks = sqlx::query_as::<_, Webhook>(&format!(
        "SELECT {WEBHOOK_COLUMNS} FROM webhooks ORDER BY created_at DESC, id DESC"
    ))
    .fetch_all(pool)
    .await?;

    Ok(webhooks)
}

pub async fn get(pool: &PgPool, id: i64) -> Result<Webhook, WebhookError> {
    sqlx::query_as::<_, Webhook>(&format!(
        "SELECT {WEBHOOK_COLUMNS} FROM webhooks WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(WebhookError::NotFound(id))
}

/// Enabled webhooks subscribed to `event`, directly or through `all`
pub async fn subscribers(
    pool: &PgPool,
    event: WebhookEventType,
) -> Result<Vec<Webhook>, WebhookError> {
    let webhooks = sqlx::query_as::<_, Webhook>(&format!(
        "SELECT {WEBHOOK_COLUMNS} FROM webhooks \
         WHERE enabled AND (event_type = $1 OR event_type = $2) \
         ORDER BY id"
    ))
    .bind(event.as_str())
    .bind(WebhookEventType::All.as_str())
    .fetch_all(pool)
    .await?;

    Ok(webhooks)
}
