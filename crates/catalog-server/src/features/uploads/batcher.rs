//! Fixed-size batching of parsed rows
//!
//! The batcher owns the only in-flight buffer of an upload. A full batch is
//! handed out by value so the caller drops it once the commit attempt is over,
//! keeping resident memory proportional to the batch size rather than the
//! file size.

use catalog_common::types::ProductRecord;

#[derive(Debug)]
pub struct Batcher {
    batch_size: usize,
    total_rows: usize,
    batch: Vec<ProductRecord>,
    rows_processed: usize,
    batches_committed: usize,
}

impl Batcher {
    /// `batch_size` is clamped to at least one row.
    pub fn new(batch_size: usize, total_rows: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            batch_size,
            total_rows,
            batch: Vec::with_capacity(batch_size),
            rows_processed: 0,
            batches_committed: 0,
        }
    }

    /// Add a row; returns the batch once it reaches `batch_size`
    pub fn push(&mut self, record: ProductRecord) -> Option<Vec<ProductRecord>> {
        self.batch.push(record);
        if self.batch.len() >= self.batch_size {
            Some(self.take())
        } else {
            None
        }
    }

    /// Hand out the final partial batch at end of input
    pub fn flush(&mut self) -> Option<Vec<ProductRecord>> {
        if self.batch.is_empty() {
            None
        } else {
            Some(self.take())
        }
    }

    fn take(&mut self) -> Vec<ProductRecord> {
        std::mem::replace(&mut self.batch, Vec::with_capacity(self.batch_size))
    }

    /// Account for a committed batch of `rows` input rows
    pub fn record_commit(&mut self, rows: usize) {
        self.rows_processed += rows;
        self.batches_committed += 1;
    }

    pub fn total_rows(&self) -> usize {
        self.total_rows
    }

    pub fn total_batches(&self) -> usize {
        self.total_rows.div_ceil(self.batch_size)
    }

    pub fn rows_processed(&self) -> usize {
        self.rows_processed
    }

    pub fn batches_committed(&self) -> usize {
        self.batches_committed
    }

    /// 1-based number of the batch about to be committed
    pub fn next_batch_number(&self) -> usize {
        self.batches_committed + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(i: usize) -> ProductRecord {
        ProductRecord::new(&format!("SKU{i}"), &format!("Product {i}"), "")
    }

    fn drain(batcher: &mut Batcher, n: usize) -> Vec<Vec<ProductRecord>> {
        let mut batches: Vec<_> = (0..n).filter_map(|i| batcher.push(record(i))).collect();
        batches.extend(batcher.flush());
        batches
    }

    #[test]
    fn test_batches_are_full_except_last() {
        let mut batcher = Batcher::new(250, 600);
        let batches = drain(&mut batcher, 600);

        let sizes: Vec<_> = batches.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![250, 250, 100]);
        assert_eq!(batcher.total_batches(), 3);
    }

    #[test]
    fn test_exact_multiple_has_no_trailing_batch() {
        let mut batcher = Batcher::new(3, 6);
        let batches = drain(&mut batcher, 6);
        assert_eq!(batches.len(), 2);
        assert!(batcher.flush().is_none());
    }

    #[test]
    fn test_total_batches_rounds_up() {
        assert_eq!(Batcher::new(250, 1).total_batches(), 1);
        assert_eq!(Batcher::new(250, 250).total_batches(), 1);
        assert_eq!(Batcher::new(250, 251).total_batches(), 2);
        assert_eq!(Batcher::new(250, 0).total_batches(), 0);
    }

    #[test]
    fn test_commit_accounting() {
        let mut batcher = Batcher::new(2, 3);
        assert_eq!(batcher.next_batch_number(), 1);

        batcher.record_commit(2);
        batcher.record_commit(1);

        assert_eq!(batcher.rows_processed(), 3);
        assert_eq!(batcher.batches_committed(), 2);
        assert_eq!(batcher.next_batch_number(), 3);
    }

    #[test]
    fn test_zero_batch_size_is_clamped() {
        let mut batcher = Batcher::new(0, 2);
        assert!(batcher.push(record(0)).is_some());
        assert_eq!(batcher.total_batches(), 2);
    }
}
