//! Product catalog server library
//!
//! HTTP service over a PostgreSQL product table:
//!
//! - **Product CRUD**: lookups by SKU, name, description, and active flag
//! - **Bulk upload**: CSV files are parsed, batched, and upserted one
//!   transaction per batch while progress streams back over SSE
//! - **Webhooks**: outbound notifications on product changes
//!
//! Handlers live in vertical feature slices under [`features`]; persistence
//! helpers and the [`db::ProductStore`] seam live in [`db`].
//!
//! # Example
//!
//! ```no_run
//! use catalog_server::{api, config::Config, db};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let pool = db::create_pool(&config.database).await?;
//!     db::run_migrations(&pool).await?;
//!     let state = api::AppState::new(pool, &config)?;
//!     api::serve(state, &config, async { let _ = tokio::signal::ctrl_c().await; }).await
//! }
//! ```
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod features;
pub mod middleware;

pub use error::AppError;
