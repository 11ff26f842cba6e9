//! Product persistence
//!
//! The bulk upload pipeline reaches the `products` table only through the
//! [`ProductStore`] trait: a transactional batch upsert, lookup by key, and
//! delete by key.

use async_trait::async_trait;
use catalog_common::types::{normalize_sku, ProductRecord};
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::DbResult;

/// Narrow persistence interface for products
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Insert-or-update every record in one transaction.
    ///
    /// Records must already carry distinct, normalized SKUs; PostgreSQL rejects
    /// a single `ON CONFLICT` statement that touches the same key twice.
    /// Returns the number of rows inserted or updated.
    async fn upsert_batch(&self, records: &[ProductRecord]) -> DbResult<u64>;

    async fn find_by_sku(&self, sku: &str) -> DbResult<Option<ProductRecord>>;

    /// Returns `true` when a row was deleted
    async fn delete_by_sku(&self, sku: &str) -> DbResult<bool>;
}

/// Database row for the `products` table
#[derive(Debug, sqlx::FromRow)]
pub struct ProductRow {
    pub sku: String,
    pub name: String,
    pub description: String,
    pub is_active: bool,
}

impl From<ProductRow> for ProductRecord {
    fn from(row: ProductRow) -> Self {
        Self {
            sku: row.sku,
            name: row.name,
            description: row.description,
            is_active: row.is_active,
        }
    }
}

/// PostgreSQL-backed [`ProductStore`]
#[derive(Clone)]
pub struct PgProductStore {
    pool: PgPool,
}

impl PgProductStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProductStore for PgProductStore {
    #[tracing::instrument(skip(self, records), fields(rows = records.len()))]
    async fn upsert_batch(&self, records: &[ProductRecord]) -> DbResult<u64> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;

        let mut query_builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO products (sku, name, description, is_active) ");

        query_builder.push_values(records, |mut b, record| {
            b.push_bind(&record.sku)
                .push_bind(&record.name)
                .push_bind(&record.description)
                .push_bind(record.is_active);
        });

        query_builder.push(
            " ON CONFLICT (sku) DO UPDATE SET \
              name = EXCLUDED.name, \
              description = EXCLUDED.description, \
              is_active = EXCLUDED.is_active",
        );

        // Dropping `tx` on error rolls the batch back.
        let result = query_builder.build().execute(&mut *tx).await?;
        tx.commit().await?;

        Ok(result.rows_affected())
    }

    async fn find_by_sku(&self, sku: &str) -> DbResult<Option<ProductRecord>> {
        let row = sqlx::query_as::<_, ProductRow>(
            "SELECT sku, name, description, is_active FROM products WHERE sku = $1",
        )
        .bind(normalize_sku(sku))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ProductRecord::from))
    }

    async fn delete_by_sku(&self, sku: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM products WHERE sku = $1")
            .bind(normalize_sku(sku))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
