//! Bulk upload pipeline
//!
//! Drives parsed rows through the batcher and the upsert engine one batch at
//! a time, reporting progress after every commit. Batches are never
//! processed concurrently within one upload.

use std::sync::Arc;

use catalog_common::types::ProductRecord;

use super::{
    batcher::Batcher,
    memory::MemoryGuard,
    parser::{self, ParseError},
    progress::{ProgressSink, UploadProgress},
    upsert::{self, UpsertError},
};
use crate::db::ProductStore;

/// Everything one upload run needs
#[derive(Clone)]
pub struct UploadContext {
    pub store: Arc<dyn ProductStore>,
    pub guard: Arc<MemoryGuard>,
    pub batch_size: usize,
    /// Memory and the client connection are checked before every Nth batch.
    /// Configuration rejects zero; a zero here checks every batch.
    pub memory_check_interval: usize,
}

/// Counters of a finished upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadSummary {
    pub total_rows: usize,
    pub rows_processed: usize,
    pub batches_committed: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Upsert(#[from] UpsertError),

    #[error("Client disconnected")]
    Disconnected,
}

impl PipelineError {
    /// Short label shown to the client next to the message
    pub fn label(&self) -> &'static str {
        match self {
            Self::Parse(_) => "Invalid CSV",
            Self::Upsert(UpsertError::MemoryExhausted { .. }) => "Memory limit exceeded",
            Self::Upsert(UpsertError::Store(_)) => "Database error",
            Self::Disconnected => "Client disconnected",
        }
    }
}

impl UploadContext {
    fn checks_memory_before(&self, batch_number: usize) -> bool {
        batch_number % self.memory_check_interval.max(1) == 0
    }

    async fn commit(
        &self,
        batcher: &mut Batcher,
        batch: Vec<ProductRecord>,
        sink: &ProgressSink,
    ) -> Result<(), PipelineError> {
        let batch_number = batcher.next_batch_number();
        let rows = batch.len();

        let guard = if self.checks_memory_before(batch_number) {
            if sink.is_closed() {
                return Err(PipelineError::Disconnected);
            }
            Some(self.guard.as_ref())
        } else {
            None
        };

        // The batch is consumed here and dropped once the attempt is over.
        let outcome = upsert::upsert_batch(self.store.as_ref(), guard, batch).await?;
        batcher.record_commit(rows);

        let mut event = UploadProgress::progress(batcher);
        if let Some(memory) = outcome.memory {
            event = event.with_memory(memory.used_mb);
        }
        sink.emit(event).await;
        Ok(())
    }
}

/// Process `text` (already decoded, holding `total_rows` rows) and report
/// through `sink`.
///
/// Emits one initial progress event, one per committed batch, and exactly
/// one terminal event. Batches committed before a failure stay committed.
#[tracing::instrument(skip_all, fields(total_rows = total_rows, batch_size = ctx.batch_size))]
pub async fn run_upload(
    ctx: &UploadContext,
    text: &str,
    total_rows: usize,
    sink: &ProgressSink,
) -> Result<UploadSummary, PipelineError> {
    let mut batcher = Batcher::new(ctx.batch_size, total_rows);
    sink.emit(UploadProgress::progress(&batcher)).await;

    match process(ctx, text, &mut batcher, sink).await {
        Ok(()) => {
            tracing::info!(
                rows_processed = batcher.rows_processed(),
                batches = batcher.batches_committed(),
                "Upload complete"
            );
            sink.emit(UploadProgress::complete(&batcher)).await;
            Ok(UploadSummary {
                total_rows: batcher.total_rows(),
                rows_processed: batcher.rows_processed(),
                batches_committed: batcher.batches_committed(),
            })
        }
        Err(err) => {
            tracing::error!(
                error = %err,
                rows_processed = batcher.rows_processed(),
                batches = batcher.batches_committed(),
                "Upload aborted"
            );
            sink.emit(UploadProgress::error(&batcher, err.label(), err.to_string()))
                .await;
            Err(err)
        }
    }
}

async fn process(
    ctx: &UploadContext,
    text: &str,
    batcher: &mut Batcher,
    sink: &ProgressSink,
) -> Result<(), PipelineError> {
    for row in parser::rows(text) {
        if let Some(batch) = batcher.push(row?) {
            ctx.commit(batcher, batch, sink).await?;
        }
    }

    if let Some(batch) = batcher.flush() {
        ctx.commit(batcher, batch, sink).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::InMemoryProductStore;
    use crate::features::uploads::memory::testing::ScriptedProbe;
    use crate::features::uploads::progress::UploadPhase;
    use tokio::sync::mpsc;

    fn context(
        store: Arc<InMemoryProductStore>,
        probe: Arc<ScriptedProbe>,
        batch_size: usize,
    ) -> UploadContext {
        UploadContext {
            store,
            guard: Arc::new(MemoryGuard::new(probe, 450.0, 80.0)),
            batch_size,
            memory_check_interval: 3,
        }
    }

    fn csv(rows: usize) -> String {
        let mut text = String::from("name,sku,description\n");
        for i in 0..rows {
            text.push_str(&format!("Product {i},SKU{i},Item {i}\n"));
        }
        text
    }

    async fn run_collect(
        ctx: &UploadContext,
        text: &str,
    ) -> (Result<UploadSummary, PipelineError>, Vec<UploadProgress>) {
        let total = parser::count_rows(text).unwrap();
        let (tx, mut rx) = mpsc::channel(1024);
        let sink = ProgressSink::new(tx);

        let result = run_upload(ctx, text, total, &sink).await;
        drop(sink);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        (result, events)
    }

    #[tokio::test]
    async fn test_three_rows_with_duplicate_sku() {
        let store = Arc::new(InMemoryProductStore::new());
        let ctx = context(store.clone(), ScriptedProbe::constant(100.0), 250);
        let text = "name,sku,description\nWidget,W1,Blue\nWidget2,w1,Red\nGadget,G1,Green\n";

        let (result, events) = run_collect(&ctx, text).await;
        let summary = result.unwrap();

        assert_eq!(summary.rows_processed, 3);
        let rows = store.snapshot();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows["W1"].name, "Widget2");
        assert_eq!(rows["W1"].description, "Red");
        assert_eq!(rows["G1"].name, "Gadget");

        let last = events.last().unwrap();
        assert_eq!(last.phase, UploadPhase::Complete);
        assert_eq!(last.total_batches, 1);
        assert_eq!(last.current_batch, 1);
        assert_eq!(last.rows_processed, 3);
    }

    #[tokio::test]
    async fn test_six_hundred_rows_make_three_batches() {
        let store = Arc::new(InMemoryProductStore::new());
        let ctx = context(store.clone(), ScriptedProbe::constant(100.0), 250);

        let (result, events) = run_collect(&ctx, &csv(600)).await;
        result.unwrap();

        let progress: Vec<_> = events
            .iter()
            .filter(|e| e.phase == UploadPhase::Progress)
            .collect();
        assert_eq!(progress.len(), 4);
        assert!(progress.iter().all(|e| e.total_batches == 3));

        let processed: Vec<_> = progress.iter().map(|e| e.rows_processed).collect();
        assert_eq!(processed, vec![0, 250, 500, 600]);

        // Only the third batch ran behind the guard.
        assert!(progress[1].memory_mb.is_none());
        assert!(progress[3].memory_mb.is_some());

        assert_eq!(store.upsert_calls(), 3);
        assert_eq!(store.len(), 600);
    }

    #[tokio::test]
    async fn test_exactly_one_terminal_event() {
        let store = Arc::new(InMemoryProductStore::new());
        let ctx = context(store, ScriptedProbe::constant(100.0), 10);

        let (_, events) = run_collect(&ctx, &csv(25)).await;

        let terminal: Vec<_> = events.iter().filter(|e| e.is_terminal()).collect();
        assert_eq!(terminal.len(), 1);
        assert!(events.last().unwrap().is_terminal());
    }

    #[tokio::test]
    async fn test_store_failure_keeps_prior_batches() {
        let store = Arc::new(InMemoryProductStore::failing_on_call(2));
        let ctx = context(store.clone(), ScriptedProbe::constant(100.0), 10);

        let (result, events) = run_collect(&ctx, &csv(30)).await;

        assert!(matches!(result, Err(PipelineError::Upsert(UpsertError::Store(_)))));
        assert_eq!(store.len(), 10);

        let last = events.last().unwrap();
        assert_eq!(last.phase, UploadPhase::Error);
        assert_eq!(last.error.as_deref(), Some("Database error"));
        assert_eq!(last.rows_processed, 10);
        assert_eq!(last.current_batch, 1);
    }

    #[tokio::test]
    async fn test_memory_fault_stops_before_write() {
        let store = Arc::new(InMemoryProductStore::new());
        let ctx = context(store.clone(), ScriptedProbe::constant(1000.0), 10);

        let (result, events) = run_collect(&ctx, &csv(50)).await;

        assert!(matches!(
            result,
            Err(PipelineError::Upsert(UpsertError::MemoryExhausted { .. }))
        ));
        // Batches 1 and 2 commit, the guard stops batch 3.
        assert_eq!(store.upsert_calls(), 2);
        assert_eq!(store.len(), 20);

        let last = events.last().unwrap();
        assert_eq!(last.error.as_deref(), Some("Memory limit exceeded"));
    }

    #[tokio::test]
    async fn test_progress_is_monotonic() {
        let store = Arc::new(InMemoryProductStore::new());
        let ctx = context(store, ScriptedProbe::constant(100.0), 7);

        let (_, events) = run_collect(&ctx, &csv(100)).await;

        for pair in events.windows(2) {
            assert!(pair[1].rows_processed >= pair[0].rows_processed);
            assert!(pair[1].current_batch >= pair[0].current_batch);
        }
        assert!(events.iter().all(|e| e.rows_processed <= e.total_rows));
    }

    #[tokio::test]
    async fn test_disconnected_client_stops_at_check() {
        let store = Arc::new(InMemoryProductStore::new());
        let ctx = context(store.clone(), ScriptedProbe::constant(100.0), 10);
        let text = csv(100);
        let total = parser::count_rows(&text).unwrap();

        let (tx, rx) = mpsc::channel(1024);
        drop(rx);
        let sink = ProgressSink::new(tx);

        let result = run_upload(&ctx, &text, total, &sink).await;

        assert!(matches!(result, Err(PipelineError::Disconnected)));
        assert_eq!(store.upsert_calls(), 2);
    }

    #[tokio::test]
    async fn test_zero_interval_checks_every_batch() {
        let store = Arc::new(InMemoryProductStore::new());
        let mut ctx = context(store, ScriptedProbe::constant(100.0), 10);
        ctx.memory_check_interval = 0;

        let (result, events) = run_collect(&ctx, &csv(30)).await;
        result.unwrap();

        let committed: Vec<_> = events
            .iter()
            .filter(|e| e.phase == UploadPhase::Progress && e.current_batch > 0)
            .collect();
        assert_eq!(committed.len(), 3);
        assert!(committed.iter().all(|e| e.memory_mb.is_some()));
    }
}
