//! Operator endpoints, guarded by `X-Admin-Token`.

use axum::{body::Bytes, extract::State, Json};
use gateway::CacheScope;
use serde::Deserialize;
use telemetry::metrics;
use tracing::info;

use crate::extractors::AdminAccess;
use crate::response::{ApiError, CacheClearResponse, StatsResponse};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CacheClearBody {
    #[serde(default)]
    pub scope: Option<String>,
}

/// POST /v1/admin/cache/clear
///
/// Scope defaults to `all` when the body is empty.
pub async fn clear_cache_handler(
    State(state): State<AppState>,
    _admin: AdminAccess,
    body: Bytes,
) -> Result<Json<CacheClearResponse>, ApiError> {
    let request: CacheClearBody = if body.is_empty() {
        CacheClearBody::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::bad_request(format!("Invalid JSON body: {}", e)))?
    };

    let scope: CacheScope = request.scope.as_deref().unwrap_or("all").parse()?;
    let removed = state.gateway.clear_cache(scope).await?;

    info!(scope = scope.as_str(), removed = removed, "Cache cleared by operator");

    Ok(Json(CacheClearResponse {
        success: true,
        scope: scope.as_str().to_string(),
        removed,
    }))
}

/// GET /v1/admin/stats
pub async fn stats_handler(
    State(state): State<AppState>,
    _admin: AdminAccess,
) -> Result<Json<StatsResponse>, ApiError> {
    let endpoints = state.gateway.performance_stats().await?;

    Ok(Json(StatsResponse {
        success: true,
        window_hours: state.gateway.config().audit.stats_window_hours,
        endpoints,
        metrics: metrics().snapshot(),
    }))
}
