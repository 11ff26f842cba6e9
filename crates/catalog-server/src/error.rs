//! Server-level error type for handlers outside the feature slices

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::api::response::ErrorResponse;
use crate::db::DbError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, label) = match &self {
            AppError::Database(e) => {
                tracing::error!(error = %e, "Database error");
                (StatusCode::SERVICE_UNAVAILABLE, "Database unavailable")
            }
        };

        ErrorResponse::new(label, self.to_string()).into_response_with(status)
    }
}
