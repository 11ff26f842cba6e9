//! Upload API route
//!
//! - `POST /upload` - Bulk insert-or-update products from a CSV file
//!
//! The request is multipart with the file in the `csv_file` field. Rejections
//! (bad file, oversize, memory pressure) are plain JSON errors. An accepted
//! upload answers `200` with `text/event-stream` and streams
//! [`UploadProgress`](super::progress::UploadProgress) events until one
//! terminal event closes the stream.

use std::{convert::Infallible, panic::AssertUnwindSafe};

use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{
        sse::{KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::post,
    Router,
};
use futures::{FutureExt, StreamExt};
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use super::{
    memory::MemoryGuard,
    parser::{self, ParseError},
    pipeline::{self, UploadContext},
    progress::ProgressSink,
};
use crate::api::response::ErrorResponse;
use crate::features::webhooks::{notifier::Notifier, types::WebhookEventType};

/// Multipart field carrying the file
pub const CSV_FIELD: &str = "csv_file";

/// Headroom over the file cap for multipart framing and other fields
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Progress events buffered between the pipeline and the response
const PROGRESS_BUFFER: usize = 32;

#[derive(Clone)]
pub struct UploadState {
    pub ctx: UploadContext,
    pub max_file_bytes: usize,
    pub notifier: Option<Notifier>,
}

pub fn upload_routes(max_file_bytes: usize) -> Router<UploadState> {
    Router::new()
        .route("/upload", post(upload_products))
        .layer(DefaultBodyLimit::max(
            max_file_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES),
        ))
}

/// Accept a CSV upload and stream its progress.
///
/// # Response
///
/// - `200 OK` - `text/event-stream` of progress events
/// - `400 Bad Request` - Missing file, wrong extension, no rows, or bad CSV
/// - `413 Payload Too Large` - File exceeds the configured cap
/// - `503 Service Unavailable` - Process memory at the ceiling
#[tracing::instrument(skip_all)]
async fn upload_products(
    State(state): State<UploadState>,
    multipart: Multipart,
) -> Result<Response, UploadError> {
    ensure_memory(&state.ctx.guard)?;

    let bytes = read_csv_field(multipart, state.max_file_bytes).await?;

    ensure_memory(&state.ctx.guard)?;

    let text = parser::decode(&bytes).into_owned();
    let size = bytes.len();
    drop(bytes);

    let total_rows = parser::count_rows(&text)?;
    if total_rows == 0 {
        return Err(UploadError::NoRows);
    }

    tracing::info!(size, total_rows, "Upload accepted");

    let (tx, rx) = mpsc::channel(PROGRESS_BUFFER);
    tokio::spawn(drive_upload(state, text, total_rows, ProgressSink::new(tx)));

    let stream = ReceiverStream::new(rx).map(|event| Ok::<_, Infallible>(event.to_event()));
    Ok(Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response())
}

/// Run the pipeline to completion, turning a panic into a terminal error event
async fn drive_upload(state: UploadState, text: String, total_rows: usize, sink: ProgressSink) {
    let run = AssertUnwindSafe(pipeline::run_upload(&state.ctx, &text, total_rows, &sink))
        .catch_unwind()
        .await;

    match run {
        Ok(Ok(summary)) => {
            if let Some(notifier) = &state.notifier {
                notifier.notify(
                    WebhookEventType::ProductUploaded,
                    json!({
                        "total_rows": summary.total_rows,
                        "rows_processed": summary.rows_processed,
                        "batches": summary.batches_committed,
                    }),
                );
            }
        }
        // The pipeline already reported the failure on the stream.
        Ok(Err(_)) => {}
        Err(_) => {
            tracing::error!("Upload task panicked");
            let event = sink.failure("Internal error", "The upload stopped unexpectedly");
            sink.emit(event).await;
        }
    }
}

fn ensure_memory(guard: &MemoryGuard) -> Result<(), UploadError> {
    let status = guard.check_limit();
    if status.is_safe {
        Ok(())
    } else {
        Err(UploadError::MemoryExhausted {
            used_mb: status.used_mb,
        })
    }
}

/// Buffer the `csv_file` part, stopping as soon as it passes `max_bytes`
async fn read_csv_field(
    mut multipart: Multipart,
    max_bytes: usize,
) -> Result<Vec<u8>, UploadError> {
    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some(CSV_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        if file_name.is_empty() {
            return Err(UploadError::MissingFile);
        }
        if !file_name.to_ascii_lowercase().ends_with(".csv") {
            return Err(UploadError::InvalidFileType(file_name));
        }

        let mut buffer = Vec::new();
        while let Some(chunk) = field.chunk().await? {
            if buffer.len() + chunk.len() > max_bytes {
                return Err(UploadError::FileTooLarge);
            }
            buffer.extend_from_slice(&chunk);
        }
        return Ok(buffer);
    }

    Err(UploadError::MissingFile)
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("No file provided in the 'csv_file' field")]
    MissingFile,

    #[error("Only .csv files are accepted, got '{0}'")]
    InvalidFileType(String),

    #[error("File exceeds the maximum upload size")]
    FileTooLarge,

    #[error("The file contains no product rows")]
    NoRows,

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Malformed upload: {0}")]
    Multipart(String),

    #[error("Server memory usage is too high ({used_mb:.1} MB), try again later")]
    MemoryExhausted { used_mb: f64 },
}

impl From<MultipartError> for UploadError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::FileTooLarge
        } else {
            Self::Multipart(err.body_text())
        }
    }
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        let (status, label) = match &self {
            Self::MissingFile => (StatusCode::BAD_REQUEST, "No file provided"),
            Self::InvalidFileType(_) => (StatusCode::BAD_REQUEST, "Invalid file type"),
            Self::FileTooLarge => (StatusCode::PAYLOAD_TOO_LARGE, "File too large"),
            Self::NoRows => (StatusCode::BAD_REQUEST, "Empty file"),
            Self::Parse(_) => (StatusCode::BAD_REQUEST, "Invalid CSV"),
            Self::Multipart(_) => (StatusCode::BAD_REQUEST, "Invalid upload"),
            Self::MemoryExhausted { .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, "Memory limit exceeded")
            }
        };

        tracing::warn!(status = %status, error = %self, "Upload rejected");
        ErrorResponse::new(label, self.to_string()).into_response_with(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::InMemoryProductStore;
    use crate::features::uploads::memory::testing::ScriptedProbe;
    use axum::{body::Body, http::Request};
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use tower::ServiceExt;

    const BOUNDARY: &str = "catalog-test-boundary";

    fn app(store: Arc<InMemoryProductStore>, memory_mb: f64, max_file_bytes: usize) -> Router {
        let state = UploadState {
            ctx: UploadContext {
                store,
                guard: Arc::new(MemoryGuard::new(
                    ScriptedProbe::constant(memory_mb),
                    450.0,
                    80.0,
                )),
                batch_size: 250,
                memory_check_interval: 3,
            },
            max_file_bytes,
            notifier: None,
        };
        upload_routes(max_file_bytes).with_state(state)
    }

    fn multipart_request(field: &str, file_name: &str, content: &str) -> Request<Body> {
        let body = format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n\
             Content-Type: text/csv\r\n\r\n\
             {content}\r\n\
             --{BOUNDARY}--\r\n"
        );
        Request::builder()
            .method("POST")
            .uri("/upload")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn sse_events(body: &str) -> Vec<serde_json::Value> {
        body.lines()
            .filter_map(|line| line.strip_prefix("data: "))
            .map(|data| serde_json::from_str(data).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_upload_streams_progress_and_writes_rows() {
        let store = Arc::new(InMemoryProductStore::new());
        let csv = "name,sku,description\nWidget,W1,Blue\nWidget2,w1,Red\nGadget,G1,Green";

        let response = app(store.clone(), 100.0, 1024 * 1024)
            .oneshot(multipart_request(CSV_FIELD, "products.csv", csv))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream"));

        let events = sse_events(&body_string(response).await);
        assert_eq!(events.first().unwrap()["type"], "progress");
        let last = events.last().unwrap();
        assert_eq!(last["type"], "complete");
        assert_eq!(last["rows_processed"], 3);
        assert_eq!(last["total_batches"], 1);

        assert_eq!(store.snapshot()["W1"].name, "Widget2");
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_file_field() {
        let store = Arc::new(InMemoryProductStore::new());
        let response = app(store, 100.0, 1024)
            .oneshot(multipart_request("other", "products.csv", "a,b,c"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value =
            serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "No file provided");
    }

    #[tokio::test]
    async fn test_wrong_extension_rejected() {
        let store = Arc::new(InMemoryProductStore::new());
        let response = app(store, 100.0, 1024)
            .oneshot(multipart_request(CSV_FIELD, "products.txt", "a,b,c"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_header_only_file_rejected() {
        let store = Arc::new(InMemoryProductStore::new());
        let response = app(store.clone(), 100.0, 1024)
            .oneshot(multipart_request(CSV_FIELD, "p.csv", "name,sku,description"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(store.upsert_calls(), 0);
    }

    #[tokio::test]
    async fn test_oversize_file_rejected() {
        let store = Arc::new(InMemoryProductStore::new());
        let csv = format!("name,sku,description\n{}", "Widget,W1,Blue\n".repeat(200));

        let response = app(store.clone(), 100.0, 512)
            .oneshot(multipart_request(CSV_FIELD, "big.csv", &csv))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(store.upsert_calls(), 0);
    }

    #[tokio::test]
    async fn test_memory_pressure_rejected_before_reading() {
        let store = Arc::new(InMemoryProductStore::new());
        let response = app(store.clone(), 900.0, 1024)
            .oneshot(multipart_request(CSV_FIELD, "p.csv", "name,sku,description\nA,1,a"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(store.upsert_calls(), 0);
    }

    #[tokio::test]
    async fn test_database_failure_ends_stream_with_error() {
        let store = Arc::new(InMemoryProductStore::failing_on_call(1));
        let response = app(store, 100.0, 1024)
            .oneshot(multipart_request(CSV_FIELD, "p.csv", "name,sku,description\nA,1,a"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let events = sse_events(&body_string(response).await);
        let last = events.last().unwrap();
        assert_eq!(last["type"], "error");
        assert_eq!(last["error"], "Database error");
        assert_eq!(events.iter().filter(|e| e["type"] != "progress").count(), 1);
    }

    #[tokio::test]
    async fn test_panic_mid_upload_reports_rows_so_far() {
        let store = Arc::new(InMemoryProductStore::panicking_on_call(2));
        let state = UploadState {
            ctx: UploadContext {
                store,
                guard: Arc::new(MemoryGuard::new(
                    ScriptedProbe::constant(100.0),
                    450.0,
                    80.0,
                )),
                batch_size: 2,
                memory_check_interval: 3,
            },
            max_file_bytes: 1024,
            notifier: None,
        };
        let text = "name,sku,description\nA,1,a\nB,2,b\nC,3,c\nD,4,d\n".to_string();
        let (tx, mut rx) = mpsc::channel(16);

        drive_upload(state, text, 4, ProgressSink::new(tx)).await;

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        let counters: Vec<_> = events
            .iter()
            .map(|e| (e.is_terminal(), e.rows_processed, e.total_rows))
            .collect();
        assert_eq!(counters, vec![(false, 0, 4), (false, 2, 4), (true, 2, 4)]);

        let last = events.last().unwrap();
        assert_eq!(last.error.as_deref(), Some("Internal error"));
        assert_eq!(last.total_batches, 2);
        assert_eq!(last.current_batch, 1);
    }
}
