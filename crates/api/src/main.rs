use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use verdant_api::config::ServerConfig;
use verdant_api::{router, state::AppState};
use verdant_core::units::{UnitNormalizer, UnitTaxonomy};
use verdant_core::validation::{RuleCatalog, ValidationEngine};
use verdant_pipeline::{NormalizationService, ValidationService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "verdant_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Domain engines (fatal on malformed configuration) ---
    let taxonomy = UnitTaxonomy::from_path(&config.taxonomy_path)
        .with_context(|| format!("loading unit taxonomy from {}", config.taxonomy_path))?;
    let catalog = RuleCatalog::from_path(&config.rules_path)
        .with_context(|| format!("loading validation rules from {}", config.rules_path))?;
    tracing::info!(
        rules = catalog.summary().total_rules,
        "Domain configuration loaded"
    );

    let normalizer = Arc::new(UnitNormalizer::new(taxonomy));
    let engine = Arc::new(ValidationEngine::new(catalog));

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

    let pool = verdant_db::create_pool(&database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connection pool created");

    verdant_db::health_check(&pool)
        .await
        .context("Database health check failed")?;

    verdant_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    // --- Services ---
    let normalization = Arc::new(NormalizationService::new(Arc::clone(&normalizer)));
    let validation = Arc::new(ValidationService::new(Arc::clone(&engine)));

    // --- CORS ---
    let cors = build_cors_layer(&config)?;

    // --- App state ---
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        normalization,
        validation,
    };

    // --- Router ---
    let app = Router::new()
        .merge(router::health_routes())
        .nest("/api/v1", router::api_routes())
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    // --- Serve ---
    let host = config.host.parse().context("Invalid HOST")?;
    let addr = SocketAddr::new(host, config.port);
    tracing::info!("Starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

/// Build the CORS layer from the configured origins.
fn build_cors_layer(config: &ServerConfig) -> anyhow::Result<CorsLayer> {
    let origins = config
        .cors_origins
        .iter()
        .map(|origin| {
            origin
                .parse::<HeaderValue>()
                .with_context(|| format!("Invalid CORS origin: {origin}"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]))
}
