//! Application state shared across handlers.

use gateway::Gateway;
use gateway_core::limits::{RATE_LIMIT_GATEWAY_MAX, RATE_LIMIT_WINDOW_SECS};
use gateway_core::{Error, Tenant};
use moka::future::Cache;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracing::{debug, warn};
use validator::Validate;

/// Cache TTL for license answers (30 seconds).
const LICENSE_CACHE_TTL: Duration = Duration::from_secs(30);

/// Maximum cache entries.
const LICENSE_CACHE_MAX_CAPACITY: u64 = 10_000;

/// Plausible license key: 8-128 URL-safe characters.
static LICENSE_KEY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_-]{8,128}$").expect("invalid license key pattern")
});

/// Whether `key` looks like a license key at all.
pub fn is_well_formed_license_key(key: &str) -> bool {
    LICENSE_KEY_REGEX.is_match(key)
}

#[derive(Debug, Serialize)]
struct LicenseRequest<'a> {
    license_key: &'a str,
}

/// Answer from the license service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LicenseInfo {
    pub valid: bool,
    pub license_id: Option<String>,
    /// Requests per window for this license
    pub rate_limit: Option<u32>,
    pub rate_window_secs: Option<u64>,
    pub error: Option<String>,
}

impl LicenseInfo {
    /// The tenant this license stands for, if it is valid.
    pub fn tenant(&self) -> Option<Tenant> {
        if !self.valid {
            return None;
        }
        let id = self.license_id.as_deref()?;
        let tenant = Tenant::new(id).with_quota(
            self.rate_limit.unwrap_or(RATE_LIMIT_GATEWAY_MAX).max(1),
            self.rate_window_secs.unwrap_or(RATE_LIMIT_WINDOW_SECS).max(1),
        );
        match tenant.validate() {
            Ok(()) => Some(tenant),
            Err(e) => {
                warn!(error = %e, "License service returned an unusable license id");
                None
            }
        }
    }
}

/// License service client.
///
/// Calls `POST {base_url}/license/validate` and caches answers for 30
/// seconds. The gateway never authenticates on its own.
#[derive(Clone)]
pub struct LicenseClient {
    /// License service URL (e.g., "http://licenses:8080")
    base_url: String,
    http_client: reqwest::Client,
    /// License key -> answer
    cache: Cache<String, LicenseInfo>,
    mock_mode: bool,
}

impl LicenseClient {
    /// Creates a new license client. An empty URL or "mock" enables mock mode.
    pub fn new(base_url: impl Into<String>) -> Result<Self, Error> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let mock_mode = base_url.is_empty() || base_url == "mock";

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| Error::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            http_client,
            cache: Cache::builder()
                .max_capacity(LICENSE_CACHE_MAX_CAPACITY)
                .time_to_live(LICENSE_CACHE_TTL)
                .build(),
            mock_mode,
        })
    }

    pub fn is_mock(&self) -> bool {
        self.mock_mode
    }

    /// Validates a license key, returning the cached answer when fresh.
    pub async fn validate(&self, license_key: &str) -> Result<LicenseInfo, Error> {
        if let Some(cached) = self.cache.get(license_key).await {
            debug!("License cache hit");
            return Ok(cached);
        }

        let info = if self.mock_mode {
            mock_validate(license_key)
        } else {
            self.remote_validate(license_key).await?
        };

        self.cache.insert(license_key.to_string(), info.clone()).await;
        Ok(info)
    }

    async fn remote_validate(&self, license_key: &str) -> Result<LicenseInfo, Error> {
        let url = format!("{}/license/validate", self.base_url);
        debug!(url = %url, "Calling license service");

        let response = self
            .http_client
            .post(&url)
            .json(&LicenseRequest { license_key })
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "License service request failed");
                Error::internal(format!("License service unavailable: {}", e))
            })?;

        let status = response.status();
        if status.is_client_error() {
            // Unknown, expired or revoked keys come back as 4xx
            return Ok(LicenseInfo {
                valid: false,
                error: Some(format!("license service returned {}", status)),
                ..Default::default()
            });
        }
        if !status.is_success() {
            warn!(status = %status, "License service returned error");
            return Err(Error::internal(format!("License service returned {}", status)));
        }

        response.json().await.map_err(|e| {
            warn!(error = %e, "Failed to parse license response");
            Error::internal(format!("Invalid license response: {}", e))
        })
    }

    /// Drops the cached answer for a key.
    pub async fn invalidate(&self, license_key: &str) {
        self.cache.invalidate(license_key).await;
    }
}

/// Mock validation for testing/development.
fn mock_validate(license_key: &str) -> LicenseInfo {
    debug!("Using mock license validation");
    LicenseInfo {
        valid: true,
        license_id: Some(generate_mock_license_id(license_key)),
        rate_limit: None,
        rate_window_secs: None,
        error: None,
    }
}

/// Deterministic license id for mock mode.
fn generate_mock_license_id(license_key: &str) -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    license_key.hash(&mut hasher);
    format!("lic-{:016x}", hasher.finish())
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
    pub licenses: LicenseClient,
    /// Token for `/v1/admin/*`. Admin routes are disabled without one.
    pub admin_token: Option<String>,
}

impl AppState {
    pub fn new(
        gateway: Arc<Gateway>,
        license_url: impl Into<String>,
        admin_token: Option<String>,
    ) -> Result<Self, Error> {
        Ok(Self {
            gateway,
            licenses: LicenseClient::new(license_url)?,
            admin_token: admin_token.filter(|t| !t.trim().is_empty()),
        })
    }
}
