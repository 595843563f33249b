//! Route table for the API.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// All `/api/v1` routes.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Normalization
        .route(
            "/uploads/{id}/normalize",
            post(handlers::normalization::normalize_upload),
        )
        .route(
            "/uploads/{id}/normalization/conflicts",
            get(handlers::normalization::unit_conflicts),
        )
        .route("/units", get(handlers::normalization::supported_units))
        // Validation
        .route(
            "/uploads/{id}/validate",
            post(handlers::validation::validate_upload),
        )
        .route(
            "/records/{id}/revalidate",
            post(handlers::validation::revalidate_record),
        )
        .route(
            "/uploads/{id}/validation/report",
            get(handlers::validation::validation_report),
        )
        .route(
            "/uploads/{id}/validation/statistics",
            get(handlers::validation::validation_statistics),
        )
        .route(
            "/uploads/{id}/validation/errors",
            get(handlers::validation::validation_errors),
        )
        .route(
            "/uploads/{id}/validation/warnings",
            get(handlers::validation::validation_warnings),
        )
        .route(
            "/validation/rules/summary",
            get(handlers::validation::rules_summary),
        )
        // Review workflow
        .route(
            "/outcomes/{id}/review",
            post(handlers::review::mark_reviewed),
        )
        .route(
            "/outcomes/{id}/suppress",
            post(handlers::review::suppress_warning),
        )
        .route("/outcomes/bulk-review", post(handlers::review::bulk_review))
        .route(
            "/uploads/{id}/review/summary",
            get(handlers::review::review_summary),
        )
        .route(
            "/uploads/{id}/review/unreviewed-errors",
            get(handlers::review::unreviewed_errors),
        )
        .route(
            "/uploads/{id}/review/reviewed-items",
            get(handlers::review::reviewed_items),
        )
        .route(
            "/uploads/{id}/review/pass-rate",
            get(handlers::review::final_pass_rate),
        )
}

/// Health check at root level (not under `/api/v1`).
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health::health_check))
}
