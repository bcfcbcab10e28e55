use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use framechain_core::storage::LocalObjectStore;
use framechain_db::repositories::{
    AssetCatalog, GenerationStore, InMemoryAssetCatalog, InMemoryGenerationStore, PgAssetCatalog,
    PgGenerationStore,
};
use framechain_db::DbPool;
use framechain_pipeline::{
    FfmpegFrameExtractor, GenerationDriver, JobCoordinator, RunRegistry, SegmentOrchestrator,
};
use framechain_provider::ArkClient;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use framechain_api::config::AppConfig;
use framechain_api::router::build_app_router;
use framechain_api::state::AppState;

type Stores = (Arc<dyn GenerationStore>, Arc<dyn AssetCatalog>, Option<DbPool>);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "framechain_api=debug,framechain_pipeline=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = AppConfig::from_env().context("Invalid configuration")?;
    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        model = %config.provider.model,
        max_segment_secs = config.pipeline.max_segment_secs,
        "Loaded configuration",
    );

    // --- Stores ---
    let (store, catalog, pool) = open_stores(config.database_url.as_deref()).await?;

    // --- Pipeline ---
    let objects = Arc::new(LocalObjectStore::new(
        &config.storage.root,
        config.storage.public_url.clone(),
    ));
    let frames = Arc::new(
        FfmpegFrameExtractor::new(objects)
            .with_sample_ratio(config.pipeline.frame_sample_ratio)
            .with_scratch_dir(config.pipeline.scratch_dir.clone()),
    );
    let client = Arc::new(ArkClient::new(config.provider.clone()));

    let orchestrator = Arc::new(SegmentOrchestrator::new(
        Arc::clone(&store),
        client,
        frames,
        config.pipeline.poll.clone(),
    ));
    let coordinator = Arc::new(JobCoordinator::new(
        Arc::clone(&store),
        Arc::clone(&catalog),
        config.pipeline.max_segment_secs,
    ));
    let driver = Arc::new(GenerationDriver::new(store, Arc::clone(&orchestrator)));

    let shutdown = CancellationToken::new();
    let runs = Arc::new(RunRegistry::new(driver, shutdown.clone()));

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.server.clone()),
        catalog,
        coordinator,
        orchestrator,
        runs: Arc::clone(&runs),
        shutdown,
        pool,
    };

    // --- Router ---
    let app = build_app_router(state, &config.server, Some(&config.storage.root))
        .context("Failed to build router")?;

    // --- Start server ---
    let host = config
        .server
        .host
        .parse::<IpAddr>()
        .with_context(|| format!("Invalid HOST address '{}'", config.server.host))?;
    let addr = SocketAddr::new(host, config.server.port);
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    // Cancelling on the signal releases in-flight segment requests, which
    // graceful shutdown would otherwise wait on.
    let cancel_runs = Arc::clone(&runs);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            tracing::info!(active_runs = cancel_runs.active(), "Cancelling runs");
            cancel_runs.cancel_all();
        })
        .await
        .context("Server error")?;

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, waiting for runs");

    let deadline = Duration::from_secs(config.server.shutdown_timeout_secs);
    let drained = tokio::time::timeout(deadline, async {
        while runs.active() > 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    })
    .await;
    if drained.is_err() {
        tracing::warn!(
            active_runs = runs.active(),
            "Runs still active after shutdown timeout"
        );
    }

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Postgres stores when `database_url` is set, in-memory stores otherwise.
async fn open_stores(database_url: Option<&str>) -> anyhow::Result<Stores> {
    let Some(database_url) = database_url else {
        tracing::warn!("DATABASE_URL not set, jobs are kept in memory only");
        let store: Arc<dyn GenerationStore> = Arc::new(InMemoryGenerationStore::new());
        let catalog: Arc<dyn AssetCatalog> = Arc::new(InMemoryAssetCatalog::new());
        return Ok((store, catalog, None));
    };

    let pool = framechain_db::create_pool(database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connection pool created");

    framechain_db::health_check(&pool)
        .await
        .context("Database health check failed")?;
    tracing::info!("Database health check passed");

    framechain_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    let store: Arc<dyn GenerationStore> = Arc::new(PgGenerationStore::new(pool.clone()));
    let catalog: Arc<dyn AssetCatalog> = Arc::new(PgAssetCatalog::new(pool.clone()));
    Ok((store, catalog, Some(pool)))
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
