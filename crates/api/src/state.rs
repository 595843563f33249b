use std::sync::Arc;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via
/// `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`). The engines
/// inside the services are built once at startup from validated
/// configuration and never change afterwards.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: verdant_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Normalization orchestrator.
    pub normalization: Arc<verdant_pipeline::NormalizationService>,
    /// Validation orchestrator and review workflow.
    pub validation: Arc<verdant_pipeline::ValidationService>,
}
