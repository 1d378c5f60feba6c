//! License info endpoint.

use axum::{extract::State, Json};
use gateway_core::EndpointClass;

use crate::extractors::{LicensedTenant, Origin};
use crate::response::{ApiError, LicenseResponse};
use crate::state::AppState;

/// GET /v1/license - Quota of the calling license.
///
/// Counted against the `info` rate-limit class, not the gateway quota.
pub async fn license_handler(
    State(state): State<AppState>,
    LicensedTenant(tenant): LicensedTenant,
    Origin(origin): Origin,
) -> Result<Json<LicenseResponse>, ApiError> {
    state
        .gateway
        .check_rate_limit(&tenant, EndpointClass::Info, &origin)
        .await?;

    Ok(Json(LicenseResponse {
        success: true,
        license_id: tenant.id,
        quota_window_requests: tenant.quota_window_requests,
        quota_window_seconds: tenant.quota_window_seconds,
    }))
}
