//! Webhook subscriptions and outbound notifications

pub mod commands;
pub mod error;
pub mod notifier;
pub mod queries;
pub mod routes;
pub mod types;

pub use error::WebhookError;
pub use notifier::Notifier;
pub use routes::webhooks_routes;
pub use types::{Webhook, WebhookEventType};
