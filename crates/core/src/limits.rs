//! Default limits and policy constants for the gateway.
//!
//! These are the fallbacks used by `GatewayConfig::default()`. Everything
//! here can be overridden through configuration.

// === Rate Limits ===

/// Fixed rate-limit window (1 hour).
pub const RATE_LIMIT_WINDOW_SECS: u64 = 3600;

/// Requests per window per tenant for the general gateway.
pub const RATE_LIMIT_GATEWAY_MAX: u32 = 100;

/// License activations per window.
pub const RATE_LIMIT_ACTIVATE_MAX: u32 = 20;

/// License deactivations per window.
pub const RATE_LIMIT_DEACTIVATE_MAX: u32 = 20;

/// License validations per window.
pub const RATE_LIMIT_VALIDATE_MAX: u32 = 100;

/// License info lookups per window.
pub const RATE_LIMIT_INFO_MAX: u32 = 50;

// === Cache TTLs ===

/// Transcripts are stable, keep them a week.
pub const CACHE_TRANSCRIPT_TTL_SECS: u64 = 7 * 24 * 3600;

/// Video metadata (view counts etc.) changes, keep it an hour.
pub const CACHE_YOUTUBE_TTL_SECS: u64 = 3600;

// === Security ===

/// Maximum request body size in bytes (1MB).
pub const MAX_REQUEST_SIZE_BYTES: usize = 1024 * 1024;

/// User agent substrings treated as bots.
pub const BLOCKED_USER_AGENTS: &[&str] = &["bot", "crawler", "spider", "scraper"];

/// Payload substrings treated as injection probes.
pub const SUSPICIOUS_PATTERNS: &[&str] = &[
    "UNION", "SELECT", "DROP", "INSERT", "DELETE", "UPDATE", "--", "/*", "*/",
];

// === Audit Field Limits (chars) ===

/// Resource id length stored in audit records.
pub const MAX_AUDIT_RESOURCE_ID_LEN: usize = 100;

/// User agent length stored in audit records.
pub const MAX_USER_AGENT_LEN: usize = 255;

/// Title prefix used as resource id for AI descriptions.
pub const MAX_AUDIT_TITLE_LEN: usize = 50;

/// Tenant id max length.
pub const MAX_TENANT_ID_LEN: usize = 128;

// === Retry ===

/// Attempts for the transcript provider.
pub const TRANSCRIPT_MAX_ATTEMPTS: u32 = 3;

/// Base unit for exponential backoff (2^(k-1) units).
pub const BACKOFF_UNIT_MS: u64 = 1000;

// === Upstream Timeouts ===

pub const TRANSCRIPT_TIMEOUT_SECS: u64 = 180;
pub const AI_TIMEOUT_SECS: u64 = 120;
pub const YOUTUBE_TIMEOUT_SECS: u64 = 30;

// === Stats ===

/// Trailing window for performance stats.
pub const STATS_WINDOW_HOURS: i64 = 24;
