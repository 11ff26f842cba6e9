//! Product write commands
//!
//! Insert and update take the full product in its wire form
//! (`{"SKU", "Name", "Description", "IsActive"}`). SKUs are normalized to
//! upper case before they reach the database.

use catalog_common::types::ProductRecord;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use super::error::ProductError;
use crate::db::products::ProductRow;
use crate::db::{PgProductStore, ProductStore};
use crate::features::shared::validation::{
    validate_name, validate_sku, MAX_NAME_LENGTH, MAX_SKU_LENGTH,
};

/// Validate and normalize a product coming from the API
pub fn prepare(mut product: ProductRecord) -> Result<ProductRecord, ProductError> {
    validate_sku(&product.sku, MAX_SKU_LENGTH)?;
    validate_name(&product.name, MAX_NAME_LENGTH)?;

    product.normalize();
    product.name = product.name.trim().to_string();
    product.description = product.description.trim().to_string();
    Ok(product)
}

#[tracing::instrument(skip(pool, product), fields(sku = %product.sku))]
pub async fn insert(pool: &PgPool, product: ProductRecord) -> Result<ProductRecord, ProductError> {
    let product = prepare(product)?;

    let row = sqlx::query_as::<_, ProductRow>(
        "INSERT INTO products (sku, name, description, is_active) VALUES ($1, $2, $3, $4) \
         RETURNING sku, name, description, is_active",
    )
    .bind(&product.sku)
    .bind(&product.name)
    .bind(&product.description)
    .bind(product.is_active)
    .fetch_one(pool)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            ProductError::Duplicate(product.sku.clone())
        }
        other => ProductError::Database(other),
    })?;

    tracing::info!("Product inserted");
    Ok(row.into())
}

#[tracing::instrument(skip(pool, product), fields(sku = %product.sku))]
pub async fn update(pool: &PgPool, product: ProductRecord) -> Result<ProductRecord, ProductError> {
    let product = prepare(product)?;

    let row = sqlx::query_as::<_, ProductRow>(
        "UPDATE products SET name = $2, description = $3, is_active = $4 WHERE sku = $1 \
         RETURNING sku, name, description, is_active",
    )
    .bind(&product.sku)
    .bind(&product.name)
    .bind(&product.description)
    .bind(product.is_active)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ProductError::NotFound(product.sku.clone()))?;

    tracing::info!("Product updated");
    Ok(row.into())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteProductCommand {
    #[serde(rename = "SKU")]
    pub sku: String,
}

/// Returns the normalized SKU that was deleted
#[tracing::instrument(skip(pool, command), fields(sku = %command.sku))]
pub async fn delete(pool: &PgPool, command: DeleteProductCommand) -> Result<String, ProductError> {
    validate_sku(&command.sku, MAX_SKU_LENGTH)?;
    let sku = catalog_common::types::normalize_sku(&command.sku);

    if !PgProductStore::new(pool.clone()).delete_by_sku(&sku).await? {
        return Err(ProductError::NotFound(sku));
    }

    tracing::info!("Product deleted");
    Ok(sku)
}

/// Remove every product; returns how many rows went away
#[tracing::instrument(skip(pool))]
pub async fn delete_all(pool: &PgPool) -> Result<u64, ProductError> {
    let result = sqlx::query("DELETE FROM products").execute(pool).await?;
    tracing::warn!(deleted = result.rows_affected(), "All products deleted");
    Ok(result.rows_affected())
}
