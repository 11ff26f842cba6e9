//! Upload progress events
//!
//! Each event is sent to the client as one SSE `data:` line holding a JSON
//! object. A stream ends with exactly one terminal event, `complete` or
//! `error`.

use std::sync::{Arc, Mutex};

use axum::response::sse::Event;
use serde::Serialize;
use tokio::sync::mpsc;

use super::batcher::Batcher;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadPhase {
    Progress,
    Complete,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadProgress {
    #[serde(rename = "type")]
    pub phase: UploadPhase,
    pub total_batches: usize,
    pub current_batch: usize,
    pub total_rows: usize,
    pub rows_processed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UploadProgress {
    fn from_batcher(phase: UploadPhase, batcher: &Batcher) -> Self {
        Self {
            phase,
            total_batches: batcher.total_batches(),
            current_batch: batcher.batches_committed(),
            total_rows: batcher.total_rows(),
            rows_processed: batcher.rows_processed(),
            memory_mb: None,
            message: None,
            error: None,
        }
    }

    pub fn progress(batcher: &Batcher) -> Self {
        Self::from_batcher(UploadPhase::Progress, batcher)
    }

    pub fn complete(batcher: &Batcher) -> Self {
        Self {
            message: Some(format!(
                "Successfully processed {} products",
                batcher.rows_processed()
            )),
            ..Self::from_batcher(UploadPhase::Complete, batcher)
        }
    }

    pub fn error(batcher: &Batcher, error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            message: Some(message.into()),
            ..Self::from_batcher(UploadPhase::Error, batcher)
        }
    }

    /// Error event for a failure with no pipeline state to report
    pub fn failure(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            phase: UploadPhase::Error,
            total_batches: 0,
            current_batch: 0,
            total_rows: 0,
            rows_processed: 0,
            memory_mb: None,
            message: Some(message.into()),
            error: Some(error.into()),
        }
    }

    pub fn with_memory(mut self, used_mb: f64) -> Self {
        self.memory_mb = Some((used_mb * 10.0).round() / 10.0);
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.phase != UploadPhase::Progress
    }

    /// Encode as an SSE event with a JSON `data` field
    pub fn to_event(&self) -> Event {
        Event::default().json_data(self).unwrap_or_else(|err| {
            tracing::error!(error = %err, "Failed to encode progress event");
            Event::default().data(r#"{"type":"error","error":"Internal error"}"#)
        })
    }
}

/// Sending half of a progress stream.
///
/// Delivery is best effort: a client that went away does not fail the
/// upload by itself, the pipeline polls [`ProgressSink::is_closed`] instead.
/// The sink remembers the last event it sent so a failure raised outside the
/// pipeline can still report how far the upload got.
#[derive(Clone)]
pub struct ProgressSink {
    tx: mpsc::Sender<UploadProgress>,
    last: Arc<Mutex<Option<UploadProgress>>>,
}

impl ProgressSink {
    pub fn new(tx: mpsc::Sender<UploadProgress>) -> Self {
        Self {
            tx,
            last: Arc::new(Mutex::new(None)),
        }
    }

    pub async fn emit(&self, event: UploadProgress) {
        if let Ok(mut last) = self.last.lock() {
            *last = Some(event.clone());
        }
        if self.tx.send(event).await.is_err() {
            tracing::debug!("Progress receiver dropped");
        }
        // Let the response task flush the event before the next batch.
        tokio::task::yield_now().await;
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Terminal error event carrying the counters of the last event sent
    pub fn failure(
        &self,
        error: impl Into<String>,
        message: impl Into<String>,
    ) -> UploadProgress {
        let last = self.last.lock().ok().and_then(|last| last.clone());
        match last {
            Some(last) => UploadProgress {
                phase: UploadPhase::Error,
                memory_mb: None,
                message: Some(message.into()),
                error: Some(error.into()),
                ..last
            },
            None => UploadProgress::failure(error, message),
        }
    }
}
