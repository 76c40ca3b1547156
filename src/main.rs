mod api;
mod batch;
mod config;
mod db;
mod email;
mod extraction;
mod migration;

use std::sync::Arc;

use config::AppConfig;
use email::composer::{DraftComposer, MimeComposer};
use extraction::provider::{ExtractionProvider, PdfExtractor};
use sea_orm::DatabaseConnection;
use sea_orm_migration::MigratorTrait;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub db: DatabaseConnection,
    pub extractor: Arc<dyn ExtractionProvider>,
    pub composer: Arc<dyn DraftComposer>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = AppConfig::from_env()?;
    tracing::info!("Statement draft generator starting...");
    tracing::info!("Server: {}:{}", config.server.host, config.server.port);
    tracing::info!("Output directory: {}", config.storage.output_dir.display());
    tracing::info!(
        "Delivery: {:?} (pacing {} ms)",
        config.batch.delivery,
        config.batch.pacing_ms
    );

    tokio::fs::create_dir_all(&config.storage.output_dir).await?;
    tokio::fs::create_dir_all(&config.storage.upload_dir).await?;

    // Connect to database
    let db = db::connect(&config.database.url).await?;

    // Run migrations
    migration::Migrator::up(&db, None).await?;
    tracing::info!("Database migrations complete");

    let state = AppState {
        extractor: Arc::new(PdfExtractor::new(config.storage.upload_dir.clone())),
        composer: Arc::new(MimeComposer::new()),
        config: config.clone(),
        db,
    };

    let app = api::router::build_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("API listening on http://{}/api/", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
