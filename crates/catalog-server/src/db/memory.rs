//! In-memory [`ProductStore`] for unit tests

use async_trait::async_trait;
use catalog_common::types::{normalize_sku, ProductRecord};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{DbError, DbResult, ProductStore};

#[derive(Default)]
pub struct InMemoryProductStore {
    rows: Mutex<BTreeMap<String, ProductRecord>>,
    upsert_calls: AtomicUsize,
    /// 1-based upsert call that fails instead of writing
    fail_on_call: Option<usize>,
    /// 1-based upsert call that panics instead of writing
    panic_on_call: Option<usize>,
}

impl InMemoryProductStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on_call(call: usize) -> Self {
        Self {
            fail_on_call: Some(call),
            ..Self::default()
        }
    }

    pub fn panicking_on_call(call: usize) -> Self {
        Self {
            panic_on_call: Some(call),
            ..Self::default()
        }
    }

    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.rows.lock().map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn snapshot(&self) -> BTreeMap<String, ProductRecord> {
        self.rows.lock().map(|rows| rows.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ProductStore for InMemoryProductStore {
    async fn upsert_batch(&self, records: &[ProductRecord]) -> DbResult<u64> {
        let call = self.upsert_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on_call == Some(call) {
            return Err(DbError::Sqlx(sqlx::Error::PoolTimedOut));
        }
        if self.panic_on_call == Some(call) {
            panic!("store panicked on upsert call {call}");
        }

        // Mirrors PostgreSQL refusing to update the same row twice in one statement.
        let mut seen = HashSet::new();
        if let Some(dup) = records.iter().find(|r| !seen.insert(r.sku.clone())) {
            return Err(DbError::duplicate("Product", &dup.sku));
        }

        let mut rows = self.rows.lock().map_err(|_| DbError::Sqlx(sqlx::Error::PoolClosed))?;
        for record in records {
            rows.insert(record.sku.clone(), record.clone());
        }
        Ok(records.len() as u64)
    }

    async fn find_by_sku(&self, sku: &str) -> DbResult<Option<ProductRecord>> {
        Ok(self.snapshot().get(&normalize_sku(sku)).cloned())
    }

    async fn delete_by_sku(&self, sku: &str) -> DbResult<bool> {
        let mut rows = self.rows.lock().map_err(|_| DbError::Sqlx(sqlx::Error::PoolClosed))?;
        Ok(rows.remove(&normalize_sku(sku)).is_some())
    }
}
