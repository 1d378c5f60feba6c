//! Request extractors.

use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Request},
    http::{header, request::Parts, HeaderMap},
};
use gateway_core::{Error, RequestOrigin, Tenant};
use http_body_util::{BodyExt, LengthLimitError, Limited};

use crate::response::ApiError;
use crate::state::{is_well_formed_license_key, AppState};

/// License key sent in headers: `Authorization: Bearer <key>`, then
/// `X-License-Key`. A key in the JSON body takes precedence over both.
#[derive(Debug, Clone)]
pub struct HeaderLicenseKey(pub Option<String>);

impl HeaderLicenseKey {
    fn from_headers(headers: &HeaderMap) -> Option<String> {
        let bearer = headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|k| !k.is_empty());

        let custom = headers
            .get("X-License-Key")
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|k| !k.is_empty());

        bearer.or(custom).map(str::to_string)
    }

    /// Picks the body key if present, else the header key.
    pub fn or_body(self, body_key: Option<&str>) -> Option<String> {
        body_key
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .or(self.0)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for HeaderLicenseKey
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(HeaderLicenseKey(Self::from_headers(&parts.headers)))
    }
}

/// Resolves a license key into a tenant via the license service.
pub async fn resolve_tenant(state: &AppState, license_key: Option<String>) -> Result<Tenant, ApiError> {
    let key = license_key.ok_or_else(ApiError::missing_license)?;
    if !is_well_formed_license_key(&key) {
        return Err(ApiError::invalid_license());
    }

    let info = state.licenses.validate(&key).await?;
    info.tenant().ok_or_else(ApiError::invalid_license)
}

/// Tenant resolved from header credentials.
///
/// For routes without a JSON body.
#[derive(Debug, Clone)]
pub struct LicensedTenant(pub Tenant);

#[async_trait]
impl FromRequestParts<AppState> for LicensedTenant {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let key = HeaderLicenseKey::from_headers(&parts.headers);
        Ok(LicensedTenant(resolve_tenant(state, key).await?))
    }
}

/// Client IP address.
#[derive(Debug, Clone)]
pub struct ClientIp(pub Option<String>);

impl ClientIp {
    fn from_headers(headers: &HeaderMap) -> Option<String> {
        // Try X-Forwarded-For first (for proxied requests)
        if let Some(xff) = headers.get("X-Forwarded-For") {
            if let Ok(xff_str) = xff.to_str() {
                // Take the first IP in the chain
                if let Some(ip) = xff_str.split(',').next().map(str::trim) {
                    if !ip.is_empty() {
                        return Some(ip.to_string());
                    }
                }
            }
        }

        // Try X-Real-IP
        headers
            .get("X-Real-IP")
            .and_then(|h| h.to_str().ok())
            .map(|ip| ip.trim().to_string())
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientIp(Self::from_headers(&parts.headers)))
    }
}

/// Caller IP and user agent.
#[derive(Debug, Clone)]
pub struct Origin(pub RequestOrigin);

impl Origin {
    fn from_headers(headers: &HeaderMap) -> RequestOrigin {
        let user_agent = headers
            .get(header::USER_AGENT)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string);
        RequestOrigin::new(ClientIp::from_headers(headers), user_agent)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Origin
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Origin(Self::from_headers(&parts.headers)))
    }
}

/// Request body that has passed the security filter.
///
/// The body is read up to `security.max_request_bytes`. Larger bodies are
/// not buffered, but still reach the filter by size so the rejection is
/// recorded like any other.
#[derive(Debug, Clone)]
pub struct ScreenedBody(pub Bytes);

#[async_trait]
impl FromRequest<AppState> for ScreenedBody {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let origin = Origin::from_headers(req.headers());
        let declared = req
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|h| h.to_str().ok())
            .and_then(|v| v.trim().parse::<usize>().ok());
        let limit = state.gateway.config().security.max_request_bytes;

        let body = match Limited::new(req.into_body(), limit).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) if e.is::<LengthLimitError>() => {
                let size = declared.filter(|&n| n > limit).unwrap_or(limit + 1);
                state.gateway.screen_request("", size, &origin).await?;
                return Err(Error::RequestTooLarge { size, limit }.into());
            }
            Err(e) => {
                return Err(ApiError::bad_request(format!(
                    "Failed to read request body: {}",
                    e
                )))
            }
        };

        let payload = String::from_utf8_lossy(&body);
        state
            .gateway
            .screen_request(&payload, body.len(), &origin)
            .await?;
        Ok(ScreenedBody(body))
    }
}

/// Guard for `/v1/admin/*`: requires `X-Admin-Token` to match.
#[derive(Debug, Clone, Copy)]
pub struct AdminAccess;

#[async_trait]
impl FromRequestParts<AppState> for AdminAccess {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.admin_token.as_deref() else {
            return Err(ApiError::admin_disabled());
        };

        let provided = parts
            .headers
            .get("X-Admin-Token")
            .and_then(|h| h.to_str().ok())
            .unwrap_or("");

        if constant_time_eq(provided.as_bytes(), expected.as_bytes()) {
            Ok(AdminAccess)
        } else {
            Err(ApiError::admin_unauthorized())
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
