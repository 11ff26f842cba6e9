//! Domain value types shared by the catalog crates

use serde::{Deserialize, Serialize};

/// A single product as it travels between pipeline stages and over the wire.
///
/// The JSON form keeps the column-style field names the catalog frontend
/// reads (`SKU`, `Name`, `Description`, `IsActive`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    #[serde(rename = "SKU")]
    pub sku: String,

    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "Description", default)]
    pub description: String,

    #[serde(rename = "IsActive", default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl ProductRecord {
    /// Build an active product record, trimming every field
    pub fn new(sku: &str, name: &str, description: &str) -> Self {
        Self {
            sku: sku.trim().to_string(),
            name: name.trim().to_string(),
            description: description.trim().to_string(),
            is_active: true,
        }
    }

    /// Rewrite the SKU to its normalized form in place
    pub fn normalize(&mut self) {
        self.sku = normalize_sku(&self.sku);
    }
}

/// Normalize a SKU for storage and lookup.
///
/// SKUs are case-insensitive: `"w1"` and `"W1"` name the same product.
pub fn normalize_sku(sku: &str) -> String {
    sku.trim().to_uppercase()
}
