//! Webhook API routes
//!
//! - `POST /webhooks/init` - Ensure the schema exists
//! - `GET /webhooks` - List webhooks
//! - `POST /webhooks` - Create a webhook
//! - `PUT /webhooks/:id` - Update a webhook
//! - `DELETE /webhooks/:id` - Delete a webhook
//! - `POST /webhooks/:id/toggle` - Flip `enabled`
//! - `POST /webhooks/:id/test` - Send a test delivery

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde_json::json;

use super::{commands, commands::SaveWebhookCommand, error::WebhookError, queries};
use crate::api::response::ApiResponse;
use crate::db;
use crate::features::FeatureState;

pub fn webhooks_routes() -> Router<FeatureState> {
    Router::new()
        .route("/webhooks/init", post(init_webhooks))
        .route("/webhooks", get(list_webhooks).post(create_webhook))
        .route("/webhooks/:id", put(update_webhook).delete(delete_webhook))
        .route("/webhooks/:id/toggle", post(toggle_webhook))
        .route("/webhooks/:id/test", post(test_webhook))
}

#[tracing::instrument(skip(state))]
async fn init_webhooks(State(state): State<FeatureState>) -> Result<Response, WebhookError> {
    db::run_migrations(&state.db).await?;
    Ok(ApiResponse::success_with_message(json!({}), "Webhook tables ready").into_response())
}

#[tracing::instrument(skip(state))]
async fn list_webhooks(State(state): State<FeatureState>) -> Result<Response, WebhookError> {
    let webhooks = queries::list(&state.db).await?;
    Ok(ApiResponse::success(json!({ "webhooks": webhooks })).into_response())
}

#[tracing::instrument(skip(state, command))]
async fn create_webhook(
    State(state): State<FeatureState>,
    Json(command): Json<SaveWebhookCommand>,
) -> Result<Response, WebhookError> {
    let webhook = commands::create(&state.db, command).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(json!({ "webhook": webhook }))),
    )
        .into_response())
}

#[tracing::instrument(skip(state, command))]
async fn update_webhook(
    State(state): State<FeatureState>,
    Path(id): Path<i64>,
    Json(command): Json<SaveWebhookCommand>,
) -> Result<Response, WebhookError> {
    let webhook = commands::update(&state.db, id, command).await?;
    Ok(ApiResponse::success(json!({ "webhook": webhook })).into_response())
}

#[tracing::instrument(skip(state))]
async fn delete_webhook(
    State(state): State<FeatureState>,
    Path(id): Path<i64>,
) -> Result<Response, WebhookError> {
    commands::delete(&state.db, id).await?;
    Ok(ApiResponse::success_with_message(json!({}), format!("Webhook {id} deleted")).into_response())
}

#[tracing::instrument(skip(state))]
async fn toggle_webhook(
    State(state): State<FeatureState>,
    Path(id): Path<i64>,
) -> Result<Response, WebhookError> {
    let webhook = commands::toggle(&state.db, id).await?;
    Ok(ApiResponse::success(json!({ "webhook": webhook })).into_response())
}

/// Always `200` once the webhook exists; the delivery outcome is in the body.
#[tracing::instrument(skip(state))]
async fn test_webhook(
    State(state): State<FeatureState>,
    Path(id): Path<i64>,
) -> Result<Response, WebhookError> {
    let delivery = commands::test(&state.db, state.notifier.client(), id).await?;
    Ok(Json(delivery).into_response())
}
