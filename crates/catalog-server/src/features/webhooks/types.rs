//! Webhook types shared by commands, queries, and the notifier

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Events a webhook can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WebhookEventType {
    #[serde(rename = "product.created")]
    ProductCreated,
    #[serde(rename = "product.updated")]
    ProductUpdated,
    #[serde(rename = "product.deleted")]
    ProductDeleted,
    #[serde(rename = "product.uploaded")]
    ProductUploaded,
    #[serde(rename = "all")]
    All,
}

impl WebhookEventType {
    pub const VALUES: [Self; 5] = [
        Self::ProductCreated,
        Self::ProductUpdated,
        Self::ProductDeleted,
        Self::ProductUploaded,
        Self::All,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProductCreated => "product.created",
            Self::ProductUpdated => "product.updated",
            Self::ProductDeleted => "product.deleted",
            Self::ProductUploaded => "product.uploaded",
            Self::All => "all",
        }
    }
}

impl fmt::Display for WebhookEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown event type '{0}'")]
pub struct UnknownEventType(pub String);

impl FromStr for WebhookEventType {
    type Err = UnknownEventType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::VALUES
            .into_iter()
            .find(|event| event.as_str() == s.trim())
            .ok_or_else(|| UnknownEventType(s.to_string()))
    }
}

/// Row of the `webhooks` table, also its JSON form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Webhook {
    pub id: i64,
    pub url: String,
    pub event_type: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub last_test_at: Option<DateTime<Utc>>,
    pub last_test_status: Option<i32>,
    /// Milliseconds
    pub last_test_response_time: Option<i64>,
}

pub(crate) const WEBHOOK_COLUMNS: &str = "id, url, event_type, enabled, created_at, \
     last_test_at, last_test_status, last_test_response_time";
