//! Bulk CSV upload
//!
//! An upload flows through these stages, one batch at a time:
//!
//! - `parser` - decode the file and yield product rows
//! - `batcher` - group rows into fixed-size batches
//! - `memory` - guard process memory before and during the run
//! - `upsert` - dedup a batch and commit it in one transaction
//! - `progress` - events streamed back to the client over SSE
//! - `pipeline` - drives the stages and emits the terminal event
//! - `routes` - the multipart HTTP entry point

pub mod batcher;
pub mod memory;
pub mod parser;
pub mod pipeline;
pub mod progress;
pub mod routes;
pub mod upsert;

pub use memory::{MemoryGuard, MemoryProbe, MemoryStatus, SysinfoProbe};
pub use pipeline::{run_upload, UploadContext, UploadSummary};
pub use progress::{UploadPhase, UploadProgress};
pub use routes::{upload_routes, UploadState};
