use std::sync::Arc;

use framechain_db::repositories::AssetCatalog;
use framechain_db::DbPool;
use framechain_pipeline::{JobCoordinator, RunRegistry, SegmentOrchestrator};
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything inside is behind an `Arc` or is a token.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub catalog: Arc<dyn AssetCatalog>,
    pub coordinator: Arc<JobCoordinator>,
    pub orchestrator: Arc<SegmentOrchestrator>,
    pub runs: Arc<RunRegistry>,
    /// Cancelled on shutdown; segment requests run under a child token.
    pub shutdown: CancellationToken,
    /// Present when the Postgres stores are in use.
    pub pool: Option<DbPool>,
}
