//! Batch upsert engine
//!
//! Collapses duplicate SKUs inside a batch (last occurrence wins), normalizes
//! keys, optionally consults the memory guard, and commits the batch through
//! the [`ProductStore`] in a single transaction.

use std::collections::HashMap;

use catalog_common::types::ProductRecord;

use super::memory::{MemoryGuard, MemoryStatus};
use crate::db::{DbError, ProductStore};

#[derive(Debug, thiserror::Error)]
pub enum UpsertError {
    #[error("Memory limit exceeded ({used_mb:.1} MB in use)")]
    MemoryExhausted { used_mb: f64 },

    #[error("{0}")]
    Store(#[from] DbError),
}

/// Outcome of one committed batch
#[derive(Debug, Clone, Copy)]
pub struct BatchOutcome {
    /// Rows the database reported as inserted or updated
    pub rows_affected: u64,
    /// Present when the guard ran before this batch
    pub memory: Option<MemoryStatus>,
}

/// Normalize keys and keep only the last record for each SKU, in order of
/// first appearance
pub fn dedup_batch(batch: Vec<ProductRecord>) -> Vec<ProductRecord> {
    let mut index: HashMap<String, usize> = HashMap::with_capacity(batch.len());
    let mut unique: Vec<ProductRecord> = Vec::with_capacity(batch.len());

    for mut record in batch {
        record.normalize();
        match index.get(&record.sku) {
            Some(&slot) => unique[slot] = record,
            None => {
                index.insert(record.sku.clone(), unique.len());
                unique.push(record);
            }
        }
    }

    unique
}

/// Commit one batch.
///
/// When `guard` is given, memory is checked after deduplication and before
/// any write; an unsafe reading aborts the batch with nothing written.
#[tracing::instrument(skip(store, guard, batch), fields(rows = batch.len()))]
pub async fn upsert_batch(
    store: &dyn ProductStore,
    guard: Option<&MemoryGuard>,
    batch: Vec<ProductRecord>,
) -> Result<BatchOutcome, UpsertError> {
    let records = dedup_batch(batch);

    let memory = guard.map(MemoryGuard::check_limit);
    if let Some(status) = memory.filter(|s| !s.is_safe) {
        return Err(UpsertError::MemoryExhausted {
            used_mb: status.used_mb,
        });
    }

    let rows_affected = store.upsert_batch(&records).await?;
    tracing::debug!(unique = records.len(), rows_affected, "Batch committed");

    Ok(BatchOutcome {
        rows_affected,
        memory,
    })
}
