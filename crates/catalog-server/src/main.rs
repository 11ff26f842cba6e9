//! Product catalog server - main entry point

use anyhow::Result;
use catalog_common::logging::{init_logging, LogConfig};
use std::time::Duration;
use tokio::signal;
use tracing::info;

use catalog_server::{api, config::Config, db};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let log_config = LogConfig::default()
        .with_file_prefix("catalog-server")
        .with_filter_directives("catalog_server=debug,tower_http=debug,sqlx=warn")
        .merge_env()?;
    let _log_guard = init_logging(&log_config)?;

    info!("Starting product catalog server");

    let config = Config::load()?;
    info!(
        host = %config.server.host,
        port = config.server.port,
        batch_size = config.upload.batch_size,
        memory_limit_mb = config.upload.memory_limit_mb,
        "Configuration loaded"
    );

    let pool = db::create_pool(&config.database).await?;
    db::run_migrations(&pool).await?;

    let state = api::AppState::new(pool, &config)?;
    api::serve(
        state,
        &config,
        shutdown_signal(config.server.shutdown_timeout_secs),
    )
    .await?;

    info!("Server shut down gracefully");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal(timeout_secs: u64) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting graceful shutdown"),
        _ = terminate => info!("Received terminate signal, starting graceful shutdown"),
    }

    // In-flight upload streams get a short grace period to finish.
    info!(timeout_secs, "Waiting for connections to close");
    tokio::time::sleep(Duration::from_secs(timeout_secs.min(5))).await;
}
