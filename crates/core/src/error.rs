//! Unified error types for the gateway.
//!
//! Error codes:
//! - CRED_001: No usable credential for a provider
//! - SEC_001-003: Security filter rejections
//! - RATE_001: Rate limit rejections
//! - UP_001-005: Upstream provider failures
//! - INFRA_001-005: Store, audit, configuration and internal failures

use thiserror::Error;

use crate::credential::CredentialKind;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Security filter error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityErrorCode {
    /// SEC_001: Request body exceeds the size cap
    TooLarge,
    /// SEC_002: Blocked user agent
    Forbidden,
    /// SEC_003: Suspicious or malformed payload
    InvalidRequest,
}

impl SecurityErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::TooLarge => "SEC_001",
            Self::Forbidden => "SEC_002",
            Self::InvalidRequest => "SEC_003",
        }
    }

    /// Get the HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::TooLarge => 413,
            Self::Forbidden => 403,
            Self::InvalidRequest => 400,
        }
    }
}

/// Unified error type for the gateway.
#[derive(Debug, Error)]
pub enum Error {
    #[error("no credential configured for {kind} provider")]
    MissingCredential { kind: CredentialKind },

    #[error("request body of {size} bytes exceeds {limit} bytes")]
    RequestTooLarge { size: usize, limit: usize },

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("rate limit exceeded: {limit} requests in {window_secs} seconds")]
    RateLimitExceeded { limit: u32, window_secs: u64 },

    #[error("upstream transport error: {0}")]
    UpstreamTransport(String),

    #[error("upstream quota exhausted (HTTP {status})")]
    UpstreamQuotaExhausted { status: u16 },

    #[error("upstream error (HTTP {status}): {message}")]
    UpstreamRequest { status: u16, message: String },

    #[error("item not found: {0}")]
    ItemNotFound(String),

    #[error("all {attempts} attempts failed, last error: {last}")]
    RetryExhausted { attempts: u32, last: Box<Error> },

    #[error("store error: {0}")]
    Store(String),

    #[error("audit error: {0}")]
    Audit(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn missing_credential(kind: CredentialKind) -> Self {
        Self::MissingCredential { kind }
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::UpstreamTransport(msg.into())
    }

    pub fn upstream(status: u16, msg: impl Into<String>) -> Self {
        Self::UpstreamRequest {
            status,
            message: msg.into(),
        }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::ItemNotFound(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    pub fn audit(msg: impl Into<String>) -> Self {
        Self::Audit(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Get the stable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingCredential { .. } => "CRED_001",
            Self::RequestTooLarge { .. } => SecurityErrorCode::TooLarge.code(),
            Self::Forbidden(_) => SecurityErrorCode::Forbidden.code(),
            Self::InvalidRequest(_) => SecurityErrorCode::InvalidRequest.code(),
            Self::RateLimitExceeded { .. } => "RATE_001",
            Self::UpstreamTransport(_) => "UP_001",
            Self::UpstreamQuotaExhausted { .. } => "UP_002",
            Self::UpstreamRequest { .. } => "UP_003",
            Self::ItemNotFound(_) => "UP_004",
            Self::RetryExhausted { .. } => "UP_005",
            Self::Store(_) => "INFRA_001",
            Self::Audit(_) => "INFRA_002",
            Self::Config(_) => "INFRA_003",
            Self::Serialization(_) => "INFRA_004",
            Self::Internal(_) => "INFRA_005",
        }
    }

    /// Get the HTTP status code for this error.
    ///
    /// Upstream request errors keep the provider's status.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::MissingCredential { .. } => 500,
            Self::RequestTooLarge { .. } => SecurityErrorCode::TooLarge.http_status(),
            Self::Forbidden(_) => SecurityErrorCode::Forbidden.http_status(),
            Self::InvalidRequest(_) => SecurityErrorCode::InvalidRequest.http_status(),
            Self::RateLimitExceeded { .. } => 429,
            Self::UpstreamTransport(_) => 502,
            Self::UpstreamQuotaExhausted { .. } => 503,
            Self::UpstreamRequest { status, .. } => *status,
            Self::ItemNotFound(_) => 404,
            Self::RetryExhausted { .. } => 503,
            Self::Store(_) => 500,
            Self::Audit(_) => 500,
            Self::Config(_) => 500,
            Self::Serialization(_) => 500,
            Self::Internal(_) => 500,
        }
    }

    /// Seconds a caller should wait before retrying, if known.
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            Self::RateLimitExceeded { window_secs, .. } => Some(*window_secs),
            _ => None,
        }
    }

    /// Whether the orchestrator may try again after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::UpstreamTransport(_) | Self::UpstreamQuotaExhausted { .. }
        )
    }

    /// Configuration errors need an operator, not a retry.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::MissingCredential { .. } | Self::Config(_))
    }

    /// Whether this is a security filter or rate limiter rejection.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::RequestTooLarge { .. }
                | Self::Forbidden(_)
                | Self::InvalidRequest(_)
                | Self::RateLimitExceeded { .. }
        )
    }

    /// Message safe to show to end users.
    ///
    /// Never includes blocklist terms, thresholds or upstream internals.
    pub fn public_message(&self) -> String {
        match self {
            Self::RateLimitExceeded { .. } => "Too many requests, please try again later".into(),
            Self::RequestTooLarge { .. } | Self::Forbidden(_) => "Request denied".into(),
            Self::InvalidRequest(_) => "Invalid request".into(),
            Self::UpstreamTransport(_)
            | Self::UpstreamQuotaExhausted { .. }
            | Self::RetryExhausted { .. } => {
                "Service temporarily unavailable, please try again later".into()
            }
            Self::UpstreamRequest { message, .. } => message.clone(),
            Self::ItemNotFound(_) => "Resource not found".into(),
            Self::MissingCredential { .. } | Self::Config(_) => {
                "Service is not configured, contact the administrator".into()
            }
            Self::Store(_) | Self::Audit(_) | Self::Serialization(_) | Self::Internal(_) => {
                "Internal error".into()
            }
        }
    }
}
