//! Catalog Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, logging setup, and error handling for the product catalog.
//!
//! # Overview
//!
//! - **Error Handling**: [`CatalogError`] and the [`Result`] alias
//! - **Logging**: [`logging::init_logging`] configured from the environment
//! - **Types**: the product wire type and SKU normalization shared by the
//!   CRUD API and the bulk upload pipeline
//!
//! # Example
//!
//! ```no_run
//! use catalog_common::logging::{init_logging, LogConfig};
//! use catalog_common::types::normalize_sku;
//!
//! fn main() -> catalog_common::Result<()> {
//!     init_logging(&LogConfig::from_env()?)?;
//!     assert_eq!(normalize_sku("  abc-1 "), "ABC-1");
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{CatalogError, Result};
