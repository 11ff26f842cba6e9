//! Product API routes
//!
//! The paths keep the names the catalog frontend calls:
//!
//! - `GET /get_all_products`
//! - `GET /get_by_sku?sku=`
//! - `GET /get_by_name?name=`
//! - `GET /get_by_description?description=`
//! - `GET /get_by_is_active?is_active=`
//! - `POST /insert_by_sku`
//! - `POST /update_by_sku`
//! - `POST /delete_by_sku`
//! - `POST /delete` - delete every product

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use catalog_common::types::ProductRecord;
use serde_json::json;

use super::{
    commands::{self, DeleteProductCommand},
    error::ProductError,
    queries::{self, DescriptionParams, IsActiveParams, NameParams, ProductFilter, SkuParams},
};
use crate::api::response::ApiResponse;
use crate::features::webhooks::WebhookEventType;
use crate::features::FeatureState;

pub fn products_routes() -> Router<FeatureState> {
    Router::new()
        .route("/get_all_products", get(get_all_products))
        .route("/get_by_sku", get(get_by_sku))
        .route("/get_by_name", get(get_by_name))
        .route("/get_by_description", get(get_by_description))
        .route("/get_by_is_active", get(get_by_is_active))
        .route("/insert_by_sku", post(insert_product))
        .route("/update_by_sku", post(update_product))
        .route("/delete_by_sku", post(delete_product))
        .route("/delete", post(delete_all_products))
}

async fn respond_with_list(
    state: &FeatureState,
    filter: ProductFilter,
) -> Result<Response, ProductError> {
    let products = queries::list(&state.db, filter).await?;
    Ok(ApiResponse::success(json!({ "products": products })).into_response())
}

#[tracing::instrument(skip(state))]
async fn get_all_products(State(state): State<FeatureState>) -> Result<Response, ProductError> {
    respond_with_list(&state, ProductFilter::All).await
}

#[tracing::instrument(skip(state))]
async fn get_by_sku(
    State(state): State<FeatureState>,
    Query(params): Query<SkuParams>,
) -> Result<Response, ProductError> {
    respond_with_list(&state, ProductFilter::Sku(params.sku)).await
}

#[tracing::instrument(skip(state))]
async fn get_by_name(
    State(state): State<FeatureState>,
    Query(params): Query<NameParams>,
) -> Result<Response, ProductError> {
    respond_with_list(&state, ProductFilter::Name(params.name)).await
}

#[tracing::instrument(skip(state))]
async fn get_by_description(
    State(state): State<FeatureState>,
    Query(params): Query<DescriptionParams>,
) -> Result<Response, ProductError> {
    respond_with_list(&state, ProductFilter::Description(params.description)).await
}

#[tracing::instrument(skip(state))]
async fn get_by_is_active(
    State(state): State<FeatureState>,
    Query(params): Query<IsActiveParams>,
) -> Result<Response, ProductError> {
    respond_with_list(&state, ProductFilter::IsActive(params.is_active)).await
}

/// # Response
///
/// - `201 Created` - `{"success": true, "product": {...}}`
/// - `400 Bad Request` - Missing or oversized SKU / Name
/// - `409 Conflict` - SKU already exists
#[tracing::instrument(skip(state, product), fields(sku = %product.sku))]
async fn insert_product(
    State(state): State<FeatureState>,
    Json(product): Json<ProductRecord>,
) -> Result<Response, ProductError> {
    let product = commands::insert(&state.db, product).await?;
    state
        .notifier
        .notify(WebhookEventType::ProductCreated, json!(product));

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success_with_message(
            json!({ "product": product }),
            format!("Product '{}' inserted", product.sku),
        )),
    )
        .into_response())
}

#[tracing::instrument(skip(state, product), fields(sku = %product.sku))]
async fn update_product(
    State(state): State<FeatureState>,
    Json(product): Json<ProductRecord>,
) -> Result<Response, ProductError> {
    let product = commands::update(&state.db, product).await?;
    state
        .notifier
        .notify(WebhookEventType::ProductUpdated, json!(product));

    Ok(ApiResponse::success_with_message(
        json!({ "product": product }),
        format!("Product '{}' updated", product.sku),
    )
    .into_response())
}

#[tracing::instrument(skip(state, command), fields(sku = %command.sku))]
async fn delete_product(
    State(state): State<FeatureState>,
    Json(command): Json<DeleteProductCommand>,
) -> Result<Response, ProductError> {
    let sku = commands::delete(&state.db, command).await?;
    state
        .notifier
        .notify(WebhookEventType::ProductDeleted, json!({ "SKU": sku }));

    Ok(
        ApiResponse::success_with_message(json!({}), format!("Product '{sku}' deleted"))
            .into_response(),
    )
}

#[tracing::instrument(skip(state))]
async fn delete_all_products(State(state): State<FeatureState>) -> Result<Response, ProductError> {
    let deleted = commands::delete_all(&state.db).await?;
    Ok(ApiResponse::success_with_message(
        json!({ "deleted": deleted }),
        format!("Deleted {deleted} products"),
    )
    .into_response())
}
