use std::sync::Arc;

use cloudspend_cloud::service::OptimizationService;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheap to clone: everything is behind `Arc` or already `Clone`.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool (user accounts).
    pub pool: cloudspend_db::DbPool,
    pub config: Arc<ServerConfig>,
    /// Aggregation and recommendation pipeline over the configured connectors.
    pub service: Arc<OptimizationService>,
}
