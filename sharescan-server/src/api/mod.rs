use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::{DefaultOnFailure, TraceLayer};
use tracing::Level;

use crate::ApiContextRef;

mod handlers;

pub fn router() -> Router<ApiContextRef> {
    Router::new()
        .route("/", get(handlers::dashboard))
        .route("/api/sites", post(handlers::start_site_scan))
        .route("/api/permissions", post(handlers::start_permission_scan))
        .route("/api/enrich", post(handlers::start_enrichment))
        .route("/api/progress", get(handlers::get_progress))
        .route("/api/report", get(handlers::get_report))
        .route("/api/export", get(handlers::export_report))
        .route("/api/shutdown", post(handlers::shutdown))
        .layer(TraceLayer::new_for_http().on_failure(DefaultOnFailure::new().level(Level::ERROR)))
}
