//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

// ============================================================================
// Server Configuration Constants
// ============================================================================

/// Default server host binding.
pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";

/// Default server port (the frontend's development default).
pub const DEFAULT_SERVER_PORT: u16 = 5000;

/// Default shutdown timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Default database URL for local development.
pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/catalog";

/// Default maximum database connections in the pool.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 10;

/// Default minimum database connections in the pool.
pub const DEFAULT_DATABASE_MIN_CONNECTIONS: u32 = 1;

/// Default database connection timeout in seconds.
pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default database idle timeout in seconds (10 minutes).
pub const DEFAULT_DATABASE_IDLE_TIMEOUT_SECS: u64 = 600;

/// Default CORS allowed origin: any.
pub const DEFAULT_CORS_ALLOWED_ORIGIN: &str = "*";

// ============================================================================
// Upload Configuration Constants
// ============================================================================

/// Rows per committed batch. Smaller batches lower peak memory at the cost of
/// more database round trips.
pub const DEFAULT_UPLOAD_BATCH_SIZE: usize = 250;

/// Largest accepted upload, in megabytes.
pub const DEFAULT_UPLOAD_MAX_FILE_MB: usize = 30;

/// Resident memory ceiling for the whole process, in megabytes.
pub const DEFAULT_UPLOAD_MEMORY_LIMIT_MB: f64 = 450.0;

/// Percentage of the ceiling at which a reclamation pass runs.
pub const DEFAULT_UPLOAD_MEMORY_WARN_PERCENT: f64 = 80.0;

/// Memory is re-checked on every Nth batch while streaming.
pub const DEFAULT_UPLOAD_MEMORY_CHECK_INTERVAL: usize = 3;

/// Upper bound on the batch size: four bind parameters per row must stay
/// under PostgreSQL's 65535 parameter limit.
pub const MAX_UPLOAD_BATCH_SIZE: usize = 10_000;

/// Timeout for the outbound webhook test call, in seconds.
pub const DEFAULT_WEBHOOK_TIMEOUT_SECS: u64 = 5;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cors: CorsConfig,
    pub upload: UploadConfig,
    pub webhooks: WebhookConfig,
}

/// Server-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
    /// Directory holding the static frontend; not served when unset
    pub static_dir: Option<PathBuf>,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
}

/// Bulk upload pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    pub batch_size: usize,
    pub max_file_mb: usize,
    pub memory_limit_mb: f64,
    pub memory_warn_percent: f64,
    pub memory_check_interval: usize,
}

impl UploadConfig {
    pub fn max_file_bytes(&self) -> usize {
        self.max_file_mb * 1024 * 1024
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_UPLOAD_BATCH_SIZE,
            max_file_mb: DEFAULT_UPLOAD_MAX_FILE_MB,
            memory_limit_mb: DEFAULT_UPLOAD_MEMORY_LIMIT_MB,
            memory_warn_percent: DEFAULT_UPLOAD_MEMORY_WARN_PERCENT,
            memory_check_interval: DEFAULT_UPLOAD_MEMORY_CHECK_INTERVAL,
        }
    }
}

/// Outbound webhook configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub timeout_secs: u64,
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config {
            server: ServerConfig {
                host: std::env::var("CATALOG_HOST")
                    .unwrap_or_else(|_| DEFAULT_SERVER_HOST.to_string()),
                port: env_or("CATALOG_PORT", DEFAULT_SERVER_PORT),
                shutdown_timeout_secs: env_or(
                    "CATALOG_SHUTDOWN_TIMEOUT",
                    DEFAULT_SHUTDOWN_TIMEOUT_SECS,
                ),
                static_dir: std::env::var("CATALOG_STATIC_DIR").ok().map(PathBuf::from),
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
                max_connections: env_or(
                    "DATABASE_MAX_CONNECTIONS",
                    DEFAULT_DATABASE_MAX_CONNECTIONS,
                ),
                min_connections: env_or(
                    "DATABASE_MIN_CONNECTIONS",
                    DEFAULT_DATABASE_MIN_CONNECTIONS,
                ),
                connect_timeout_secs: env_or(
                    "DATABASE_CONNECT_TIMEOUT",
                    DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
                ),
                idle_timeout_secs: env_or(
                    "DATABASE_IDLE_TIMEOUT",
                    DEFAULT_DATABASE_IDLE_TIMEOUT_SECS,
                ),
            },
            cors: CorsConfig {
                allowed_origins: std::env::var("CORS_ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| DEFAULT_CORS_ALLOWED_ORIGIN.to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                allow_credentials: env_or("CORS_ALLOW_CREDENTIALS", false),
            },
            upload: UploadConfig {
                batch_size: env_or("UPLOAD_BATCH_SIZE", DEFAULT_UPLOAD_BATCH_SIZE),
                max_file_mb: env_or("UPLOAD_MAX_FILE_MB", DEFAULT_UPLOAD_MAX_FILE_MB),
                memory_limit_mb: env_or("UPLOAD_MEMORY_LIMIT_MB", DEFAULT_UPLOAD_MEMORY_LIMIT_MB),
                memory_warn_percent: env_or(
                    "UPLOAD_MEMORY_WARN_PERCENT",
                    DEFAULT_UPLOAD_MEMORY_WARN_PERCENT,
                ),
                memory_check_interval: env_or(
                    "UPLOAD_MEMORY_CHECK_INTERVAL",
                    DEFAULT_UPLOAD_MEMORY_CHECK_INTERVAL,
                ),
            },
            webhooks: WebhookConfig {
                timeout_secs: env_or("WEBHOOK_TIMEOUT_SECS", DEFAULT_WEBHOOK_TIMEOUT_SECS),
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Server port must be greater than 0");
        }

        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }

        if self.database.max_connections == 0 {
            anyhow::bail!("Database max_connections must be greater than 0");
        }

        if self.database.min_connections > self.database.max_connections {
            anyhow::bail!(
                "Database min_connections ({}) cannot be greater than max_connections ({})",
                self.database.min_connections,
                self.database.max_connections
            );
        }

        if self.upload.batch_size == 0 || self.upload.batch_size > MAX_UPLOAD_BATCH_SIZE {
            anyhow::bail!(
                "Upload batch size must be between 1 and {}, got {}",
                MAX_UPLOAD_BATCH_SIZE,
                self.upload.batch_size
            );
        }

        if self.upload.max_file_mb == 0 {
            anyhow::bail!("Upload max file size must be greater than 0");
        }

        if self.upload.memory_limit_mb <= 0.0 {
            anyhow::bail!("Upload memory limit must be greater than 0");
        }

        if !(0.0..=100.0).contains(&self.upload.memory_warn_percent) {
            anyhow::bail!(
                "Upload memory warn percent must be between 0 and 100, got {}",
                self.upload.memory_warn_percent
            );
        }

        if self.upload.memory_check_interval == 0 {
            anyhow::bail!("Upload memory check interval must be greater than 0");
        }

        if self.cors.allowed_origins.is_empty() {
            tracing::warn!("No CORS origins configured - all origins will be allowed");
        }

        if self.cors.allow_credentials && self.cors.allowed_origins.iter().any(|o| o == "*") {
            anyhow::bail!("CORS credentials cannot be combined with a wildcard origin");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: DEFAULT_SERVER_HOST.to_string(),
                port: DEFAULT_SERVER_PORT,
                shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
                static_dir: None,
            },
            database: DatabaseConfig {
                url: DEFAULT_DATABASE_URL.to_string(),
                max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
                min_connections: DEFAULT_DATABASE_MIN_CONNECTIONS,
                connect_timeout_secs: DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
                idle_timeout_secs: DEFAULT_DATABASE_IDLE_TIMEOUT_SECS,
            },
            cors: CorsConfig {
                allowed_origins: vec![DEFAULT_CORS_ALLOWED_ORIGIN.to_string()],
                allow_credentials: false,
            },
            upload: UploadConfig::default(),
            webhooks: WebhookConfig {
                timeout_secs: DEFAULT_WEBHOOK_TIMEOUT_SECS,
            },
        }
    }
}
