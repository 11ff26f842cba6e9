//! Shared input validation
//!
//! ```rust,ignore
//! use catalog_server::features::shared::validation::{validate_sku, validate_name};
//!
//! validate_sku(&command.sku, MAX_SKU_LENGTH)?;
//! validate_name(&command.name, MAX_NAME_LENGTH)?;
//! ```

use thiserror::Error;

/// Longest accepted SKU, in characters
pub const MAX_SKU_LENGTH: usize = 64;

/// Longest accepted product name, in characters
pub const MAX_NAME_LENGTH: usize = 256;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SkuValidationError {
    #[error("SKU is required and cannot be empty")]
    Required,

    #[error("SKU must be between 1 and {max_length} characters")]
    TooLong { max_length: usize },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NameValidationError {
    #[error("Name is required and cannot be empty")]
    Required,

    #[error("Name must be between 1 and {max_length} characters")]
    TooLong { max_length: usize },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UrlValidationError {
    #[error("{field_name} is required")]
    Required { field_name: String },

    #[error("{field_name} is invalid: must start with http:// or https://")]
    InvalidFormat { field_name: String },
}

/// SKU must be non-empty after trimming and at most `max_length` characters
pub fn validate_sku(sku: &str, max_length: usize) -> Result<(), SkuValidationError> {
    let sku = sku.trim();
    if sku.is_empty() {
        return Err(SkuValidationError::Required);
    }
    if sku.chars().count() > max_length {
        return Err(SkuValidationError::TooLong { max_length });
    }
    Ok(())
}

pub fn validate_name(name: &str, max_length: usize) -> Result<(), NameValidationError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(NameValidationError::Required);
    }
    if name.chars().count() > max_length {
        return Err(NameValidationError::TooLong { max_length });
    }
    Ok(())
}

/// A required URL with an http(s) scheme
pub fn validate_url(url: &str, field_name: &str) -> Result<(), UrlValidationError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(UrlValidationError::Required {
            field_name: field_name.to_string(),
        });
    }
    if !is_valid_url(url) {
        return Err(UrlValidationError::InvalidFormat {
            field_name: field_name.to_string(),
        });
    }
    Ok(())
}

#[inline]
pub fn is_valid_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}
