use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::types::UnknownEventType;
use crate::api::response::ErrorResponse;
use crate::db::DbError;
use crate::features::shared::validation::UrlValidationError;

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error(transparent)]
    Url(#[from] UrlValidationError),

    #[error(transparent)]
    EventType(#[from] UnknownEventType),

    #[error("Webhook {0} not found")]
    NotFound(i64),

    #[error("{0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Schema(#[from] DbError),

    #[error("Could not build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let (status, label) = match &self {
            Self::Url(_) => (StatusCode::BAD_REQUEST, "Invalid URL"),
            Self::EventType(_) => (StatusCode::BAD_REQUEST, "Invalid event type"),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "Webhook not found"),
            Self::Database(_) | Self::Schema(_) => {
                tracing::error!(error = %self, "Webhook database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error")
            }
            Self::Client(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal error"),
        };
        ErrorResponse::new(label, self.to_string()).into_response_with(status)
    }
}
