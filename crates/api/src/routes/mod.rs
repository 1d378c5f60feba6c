//! API routes.

pub mod admin;
pub mod gateway;
pub mod health;
pub mod license;

use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::state::AppState;

/// Creates the API router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/v1/transcript", post(gateway::transcript_handler))
        .route("/v1/description", post(gateway::description_handler))
        .route("/v1/videos/:video_id", get(gateway::video_handler))
        .route("/v1/license", get(license::license_handler))
        .route("/v1/admin/cache/clear", post(admin::clear_cache_handler))
        .route("/v1/admin/stats", get(admin::stats_handler))
        .route("/health", get(health::health_handler))
        .route("/health/ready", get(health::ready_handler))
        .route("/health/live", get(health::live_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(CompressionLayer::new()),
        )
        .with_state(state)
}
