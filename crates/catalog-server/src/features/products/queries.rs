//! Product read queries
//!
//! Every query returns a list ordered by SKU, so the API always answers
//! `{"success": true, "products": [...]}`.

use catalog_common::types::ProductRecord;
use serde::Deserialize;
use sqlx::PgPool;

use super::error::ProductError;
use crate::db::products::ProductRow;
use crate::db::{PgProductStore, ProductStore};

const SELECT_PRODUCTS: &str = "SELECT sku, name, description, is_active FROM products";

/// Filter applied to the product listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductFilter {
    All,
    /// Exact, case-insensitive
    Sku(String),
    /// Case-insensitive substring
    Name(String),
    /// Case-insensitive substring
    Description(String),
    IsActive(bool),
}

#[derive(Debug, Deserialize)]
pub struct SkuParams {
    pub sku: String,
}

#[derive(Debug, Deserialize)]
pub struct NameParams {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct DescriptionParams {
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct IsActiveParams {
    pub is_active: bool,
}

#[tracing::instrument(skip(pool))]
pub async fn list(pool: &PgPool, filter: ProductFilter) -> Result<Vec<ProductRecord>, ProductError> {
    let rows = match filter {
        ProductFilter::All => {
            sqlx::query_as::<_, ProductRow>(&format!("{SELECT_PRODUCTS} ORDER BY sku"))
                .fetch_all(pool)
                .await?
        }
        ProductFilter::Sku(sku) => {
            let found = PgProductStore::new(pool.clone()).find_by_sku(&sku).await?;
            return Ok(found.into_iter().collect());
        }
        ProductFilter::Name(needle) => contains(pool, "name", &needle).await?,
        ProductFilter::Description(needle) => contains(pool, "description", &needle).await?,
        ProductFilter::IsActive(active) => {
            sqlx::query_as::<_, ProductRow>(&format!(
                "{SELECT_PRODUCTS} WHERE is_active = $1 ORDER BY sku"
            ))
            .bind(active)
            .fetch_all(pool)
            .await?
        }
    };

    tracing::debug!(count = rows.len(), "Products listed");
    Ok(rows.into_iter().map(ProductRecord::from).collect())
}

/// `column` is one of our own column names, never user input.
async fn contains(pool: &PgPool, column: &str, needle: &str) -> Result<Vec<ProductRow>, sqlx::Error> {
    sqlx::query_as::<_, ProductRow>(&format!(
        "{SELECT_PRODUCTS} WHERE strpos(lower({column}), lower($1)) > 0 ORDER BY sku"
    ))
    .bind(needle.trim())
    .fetch_all(pool)
    .await
}
