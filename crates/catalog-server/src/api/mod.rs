pub mod response;

use std::{future::Future, net::SocketAddr, sync::Arc};

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use serde_json::json;
use sqlx::PgPool;
use tower_http::services::ServeDir;

use crate::config::Config;
use crate::db::{self, PgProductStore};
use crate::error::AppError;
use crate::features::{
    self,
    uploads::{MemoryGuard, UploadContext, UploadState},
    webhooks::Notifier,
    FeatureState,
};
use crate::middleware;

/// Long-lived handles shared by every request
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub notifier: Notifier,
    pub guard: Arc<MemoryGuard>,
}

impl AppState {
    pub fn new(db: PgPool, config: &Config) -> anyhow::Result<Self> {
        let notifier = Notifier::new(
            db.clone(),
            std::time::Duration::from_secs(config.webhooks.timeout_secs),
        )?;
        let guard = Arc::new(MemoryGuard::from_config(&config.upload));
        Ok(Self {
            db,
            notifier,
            guard,
        })
    }
}

pub fn create_router(state: AppState, config: &Config) -> Router {
    let feature_state = FeatureState {
        db: state.db.clone(),
        notifier: state.notifier.clone(),
    };

    let upload_state = UploadState {
        ctx: UploadContext {
            store: Arc::new(PgProductStore::new(state.db.clone())),
            guard: state.guard.clone(),
            batch_size: config.upload.batch_size,
            memory_check_interval: config.upload.memory_check_interval,
        },
        max_file_bytes: config.upload.max_file_bytes(),
        notifier: Some(state.notifier.clone()),
    };

    let mut router = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .with_state(state.db.clone())
        .merge(features::router(feature_state, upload_state));

    if let Some(dir) = &config.server.static_dir {
        tracing::info!(dir = %dir.display(), "Serving static frontend");
        router = router.fallback_service(ServeDir::new(dir));
    }

    router
        .layer(middleware::compression_layer())
        .layer(middleware::tracing_layer())
        .layer(middleware::cors_layer(&config.cors))
}

/// Bind and serve until `shutdown` resolves
pub async fn serve(
    state: AppState,
    config: &Config,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = create_router(state, config);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

async fn root() -> impl IntoResponse {
    Json(json!({
        "name": "Product Catalog",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

async fn health(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    db::health_check(&pool).await?;
    Ok(Json(json!({
        "status": "healthy",
        "database": "connected"
    })))
}
