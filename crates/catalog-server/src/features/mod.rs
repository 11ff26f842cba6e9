//! Feature slices of the catalog API
//!
//! - **products**: CRUD over the product table
//! - **uploads**: bulk CSV insert-or-update with streamed progress
//! - **webhooks**: subscriptions and outbound event notification
//!
//! Each slice owns its commands, queries, error type, and routes.

pub mod products;
pub mod shared;
pub mod uploads;
pub mod webhooks;

use axum::Router;
use sqlx::PgPool;

use uploads::UploadState;
use webhooks::Notifier;

/// State for the product and webhook routes
#[derive(Clone)]
pub struct FeatureState {
    pub db: PgPool,
    pub notifier: Notifier,
}

/// All feature routes, mounted at the root to match the frontend's paths
pub fn router(state: FeatureState, uploads: UploadState) -> Router<()> {
    Router::new()
        .merge(products::products_routes().with_state(state.clone()))
        .merge(webhooks::webhooks_routes().with_state(state))
        .merge(uploads::upload_routes(uploads.max_file_bytes).with_state(uploads))
}
