//! Tenant (license holder) and per-call caller context.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::limits::{
    MAX_USER_AGENT_LEN, RATE_LIMIT_GATEWAY_MAX, RATE_LIMIT_WINDOW_SECS,
};
use crate::text::truncate_chars;

/// A fixed-window quota: at most `max_requests` per `window_secs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitRule {
    pub max_requests: u32,
    pub window_secs: u64,
}

impl RateLimitRule {
    pub const fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            max_requests,
            window_secs,
        }
    }
}

/// A license holder making requests through the gateway.
///
/// The gateway does not authenticate tenants; a resolved `Tenant` is
/// handed to it by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Tenant {
    /// Opaque tenant id (license id)
    #[validate(length(min = 1, max = 128))]
    pub id: String,
    /// Requests allowed per quota window
    #[validate(range(min = 1))]
    pub quota_window_requests: u32,
    /// Quota window length in seconds
    #[validate(range(min = 1))]
    pub quota_window_seconds: u64,
}

impl Tenant {
    /// Creates a tenant with the default gateway quota.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            quota_window_requests: RATE_LIMIT_GATEWAY_MAX,
            quota_window_seconds: RATE_LIMIT_WINDOW_SECS,
        }
    }

    pub fn with_quota(mut self, max_requests: u32, window_secs: u64) -> Self {
        self.quota_window_requests = max_requests;
        self.quota_window_seconds = window_secs;
        self
    }

    /// The tenant's own quota for the general gateway endpoints.
    pub fn quota(&self) -> RateLimitRule {
        RateLimitRule::new(self.quota_window_requests, self.quota_window_seconds)
    }
}

/// Where a request came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestOrigin {
    pub client_ip: String,
    pub user_agent: String,
}

impl RequestOrigin {
    pub fn new(client_ip: Option<String>, user_agent: Option<String>) -> Self {
        Self {
            client_ip: client_ip
                .filter(|ip| !ip.trim().is_empty())
                .unwrap_or_else(|| "unknown".to_string()),
            user_agent: truncate_chars(user_agent.as_deref().unwrap_or(""), MAX_USER_AGENT_LEN),
        }
    }

    pub fn unknown() -> Self {
        Self::new(None, None)
    }
}

impl Default for RequestOrigin {
    fn default() -> Self {
        Self::unknown()
    }
}

/// Everything the gateway knows about the caller of one operation.
#[derive(Debug, Clone)]
pub struct CallerContext {
    pub tenant: Tenant,
    pub origin: RequestOrigin,
    /// Raw body size as received by the host, if there was one
    pub body_size: Option<usize>,
}

impl CallerContext {
    pub fn new(tenant: Tenant) -> Self {
        Self {
            tenant,
            origin: RequestOrigin::unknown(),
            body_size: None,
        }
    }

    pub fn with_origin(mut self, origin: RequestOrigin) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_body_size(mut self, size: usize) -> Self {
        self.body_size = Some(size);
        self
    }
}
