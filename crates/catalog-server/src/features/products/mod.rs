//! Product CRUD

pub mod commands;
pub mod error;
pub mod queries;
pub mod routes;

pub use error::ProductError;
pub use routes::products_routes;
