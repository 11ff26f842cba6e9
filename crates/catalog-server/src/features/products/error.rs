use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::api::response::ErrorResponse;
use crate::db::DbError;
use crate::features::shared::validation::{NameValidationError, SkuValidationError};

#[derive(Debug, thiserror::Error)]
pub enum ProductError {
    #[error(transparent)]
    Sku(#[from] SkuValidationError),

    #[error(transparent)]
    Name(#[from] NameValidationError),

    #[error("Product with SKU '{0}' not found")]
    NotFound(String),

    #[error("Product with SKU '{0}' already exists")]
    Duplicate(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Store(#[from] DbError),
}

impl IntoResponse for ProductError {
    fn into_response(self) -> Response {
        let (status, label) = match &self {
            Self::Sku(_) | Self::Name(_) => (StatusCode::BAD_REQUEST, "Validation error"),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "Product not found"),
            Self::Duplicate(_) => (StatusCode::CONFLICT, "Duplicate SKU"),
            Self::Database(_) | Self::Store(_) => {
                tracing::error!(error = %self, "Product database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error")
            }
        };
        ErrorResponse::new(label, self.to_string()).into_response_with(status)
    }
}
