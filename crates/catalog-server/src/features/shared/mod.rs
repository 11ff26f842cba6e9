//! Code shared across feature slices

pub mod validation;

pub use validation::{validate_name, validate_sku, validate_url};
