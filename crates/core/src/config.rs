//! Typed gateway configuration.
//!
//! Every recognised option lives here and is supplied at construction
//! time. All sections default to the values in `limits`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::limits::*;
use crate::tenant::RateLimitRule;

/// Root configuration for a gateway instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub credentials: CredentialConfig,
    #[serde(default)]
    pub rate_limits: RateLimitSettings,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub audit: AuditConfig,
}

impl GatewayConfig {
    /// Checks for values that would make the gateway misbehave.
    pub fn validate(&self) -> Result<()> {
        for (class, rule) in self.rate_limits.rules() {
            if rule.max_requests == 0 || rule.window_secs == 0 {
                return Err(Error::config(format!(
                    "rate limit for '{}' must have a non-zero max and window",
                    class
                )));
            }
        }

        if self.retry.transcript_max_attempts == 0 {
            return Err(Error::config("retry.transcript_max_attempts must be at least 1"));
        }

        if self.cache.transcript_ttl_secs == 0 || self.cache.youtube_ttl_secs == 0 {
            return Err(Error::config("cache TTLs must be non-zero"));
        }

        for (name, value) in [
            ("upstream.transcription_url", &self.upstream.transcription_url),
            ("upstream.ai_url", &self.upstream.ai_url),
            ("upstream.youtube_url", &self.upstream.youtube_url),
        ] {
            url::Url::parse(value)
                .map_err(|e| Error::config(format!("{} is not a valid URL: {}", name, e)))?;
        }

        if self.credentials.allow_insecure_fallback
            && self
                .credentials
                .insecure_fallback
                .as_deref()
                .map_or(true, |s| s.trim().is_empty())
        {
            return Err(Error::config(
                "credentials.allow_insecure_fallback is set but no fallback credential is configured",
            ));
        }

        Ok(())
    }
}

// === Credentials ===

/// How the transcription key pool picks a credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationMode {
    /// Persistent cursor advanced once per call.
    #[default]
    RoundRobin,
    /// Always start at the primary key and fall through on later attempts.
    FixedWithFallback,
}

/// Upstream credentials per provider.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct CredentialConfig {
    /// Transcription provider keys, tried per the rotation mode
    #[serde(default)]
    pub transcription: Vec<String>,
    /// AI provider keys (the first non-empty one is used)
    #[serde(default)]
    pub ai: Vec<String>,
    /// Video metadata provider keys (the first non-empty one is used)
    #[serde(default)]
    pub youtube: Vec<String>,
    #[serde(default)]
    pub rotation: RotationMode,
    /// Insecure default used only when the transcription pool is empty
    /// and `allow_insecure_fallback` is set. Never enable in production.
    #[serde(default)]
    pub insecure_fallback: Option<String>,
    #[serde(default)]
    pub allow_insecure_fallback: bool,
}

impl fmt::Debug for CredentialConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialConfig")
            .field("transcription", &self.transcription.len())
            .field("ai", &self.ai.len())
            .field("youtube", &self.youtube.len())
            .field("rotation", &self.rotation)
            .field("insecure_fallback", &self.insecure_fallback.is_some())
            .field("allow_insecure_fallback", &self.allow_insecure_fallback)
            .finish()
    }
}

// === Rate Limits ===

/// Named rate-limit classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointClass {
    /// General gateway operations (transcript, description, video data)
    Gateway,
    Activate,
    Deactivate,
    Validate,
    Info,
}

impl EndpointClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gateway => "gateway",
            Self::Activate => "activate",
            Self::Deactivate => "deactivate",
            Self::Validate => "validate",
            Self::Info => "info",
        }
    }

    /// Classifies a license-service route. Unknown routes count as validate.
    pub fn from_route(route: &str) -> Self {
        let route = route.to_ascii_lowercase();
        if route.contains("deactivate") {
            Self::Deactivate
        } else if route.contains("activate") {
            Self::Activate
        } else if route.contains("info") {
            Self::Info
        } else {
            Self::Validate
        }
    }
}

impl fmt::Display for EndpointClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rate-limit rule per endpoint class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Default tenant quota for the general gateway
    #[serde(default = "default_gateway_rule")]
    pub gateway: RateLimitRule,
    #[serde(default = "default_activate_rule")]
    pub activate: RateLimitRule,
    #[serde(default = "default_deactivate_rule")]
    pub deactivate: RateLimitRule,
    #[serde(default = "default_validate_rule")]
    pub validate: RateLimitRule,
    #[serde(default = "default_info_rule")]
    pub info: RateLimitRule,
}

fn default_true() -> bool {
    true
}

fn default_gateway_rule() -> RateLimitRule {
    RateLimitRule::new(RATE_LIMIT_GATEWAY_MAX, RATE_LIMIT_WINDOW_SECS)
}

fn default_activate_rule() -> RateLimitRule {
    RateLimitRule::new(RATE_LIMIT_ACTIVATE_MAX, RATE_LIMIT_WINDOW_SECS)
}

fn default_deactivate_rule() -> RateLimitRule {
    RateLimitRule::new(RATE_LIMIT_DEACTIVATE_MAX, RATE_LIMIT_WINDOW_SECS)
}

fn default_validate_rule() -> RateLimitRule {
    RateLimitRule::new(RATE_LIMIT_VALIDATE_MAX, RATE_LIMIT_WINDOW_SECS)
}

fn default_info_rule() -> RateLimitRule {
    RateLimitRule::new(RATE_LIMIT_INFO_MAX, RATE_LIMIT_WINDOW_SECS)
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            gateway: default_gateway_rule(),
            activate: default_activate_rule(),
            deactivate: default_deactivate_rule(),
            validate: default_validate_rule(),
            info: default_info_rule(),
        }
    }
}

impl RateLimitSettings {
    pub fn rule_for(&self, class: EndpointClass) -> RateLimitRule {
        match class {
            EndpointClass::Gateway => self.gateway,
            EndpointClass::Activate => self.activate,
            EndpointClass::Deactivate => self.deactivate,
            EndpointClass::Validate => self.validate,
            EndpointClass::Info => self.info,
        }
    }

    pub fn rules(&self) -> [(EndpointClass, RateLimitRule); 5] {
        [
            (EndpointClass::Gateway, self.gateway),
            (EndpointClass::Activate, self.activate),
            (EndpointClass::Deactivate, self.deactivate),
            (EndpointClass::Validate, self.validate),
            (EndpointClass::Info, self.info),
        ]
    }
}

// === Cache ===

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_transcript_ttl")]
    pub transcript_ttl_secs: u64,
    #[serde(default = "default_youtube_ttl")]
    pub youtube_ttl_secs: u64,
}

fn default_transcript_ttl() -> u64 {
    CACHE_TRANSCRIPT_TTL_SECS
}

fn default_youtube_ttl() -> u64 {
    CACHE_YOUTUBE_TTL_SECS
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            transcript_ttl_secs: default_transcript_ttl(),
            youtube_ttl_secs: default_youtube_ttl(),
        }
    }
}

impl CacheConfig {
    pub fn transcript_ttl(&self) -> Duration {
        Duration::from_secs(self.transcript_ttl_secs)
    }

    pub fn youtube_ttl(&self) -> Duration {
        Duration::from_secs(self.youtube_ttl_secs)
    }
}

// === Security ===

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(default = "default_max_request_bytes")]
    pub max_request_bytes: usize,
    /// Case-insensitive user agent substrings to reject
    #[serde(default = "default_blocked_user_agents")]
    pub blocked_user_agents: Vec<String>,
    /// Case-insensitive payload substrings to reject (best effort only)
    #[serde(default = "default_suspicious_patterns")]
    pub suspicious_patterns: Vec<String>,
    /// Also reject user agents the UA parser classifies as crawlers
    #[serde(default)]
    pub block_known_crawlers: bool,
}

fn default_max_request_bytes() -> usize {
    MAX_REQUEST_SIZE_BYTES
}

fn default_blocked_user_agents() -> Vec<String> {
    BLOCKED_USER_AGENTS.iter().map(|s| s.to_string()).collect()
}

fn default_suspicious_patterns() -> Vec<String> {
    SUSPICIOUS_PATTERNS.iter().map(|s| s.to_string()).collect()
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_request_bytes: default_max_request_bytes(),
            blocked_user_agents: default_blocked_user_agents(),
            suspicious_patterns: default_suspicious_patterns(),
            block_known_crawlers: false,
        }
    }
}

// === Retry ===

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_transcript_max_attempts")]
    pub transcript_max_attempts: u32,
    /// Backoff before attempt k+1 is 2^(k-1) of these
    #[serde(default = "default_backoff_unit_ms")]
    pub backoff_unit_ms: u64,
}

fn default_transcript_max_attempts() -> u32 {
    TRANSCRIPT_MAX_ATTEMPTS
}

fn default_backoff_unit_ms() -> u64 {
    BACKOFF_UNIT_MS
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            transcript_max_attempts: default_transcript_max_attempts(),
            backoff_unit_ms: default_backoff_unit_ms(),
        }
    }
}

impl RetryConfig {
    pub fn backoff_unit(&self) -> Duration {
        Duration::from_millis(self.backoff_unit_ms)
    }
}

// === Upstream ===

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_transcription_url")]
    pub transcription_url: String,
    #[serde(default = "default_ai_url")]
    pub ai_url: String,
    #[serde(default = "default_youtube_url")]
    pub youtube_url: String,
    #[serde(default = "default_transcript_timeout")]
    pub transcript_timeout_secs: u64,
    #[serde(default = "default_ai_timeout")]
    pub ai_timeout_secs: u64,
    #[serde(default = "default_youtube_timeout")]
    pub youtube_timeout_secs: u64,
    #[serde(default = "default_ai_model")]
    pub ai_model: String,
    #[serde(default = "default_ai_temperature")]
    pub ai_temperature: f32,
    #[serde(default = "default_ai_max_tokens")]
    pub ai_max_tokens: u32,
    #[serde(default = "default_system_prompt")]
    pub default_system_prompt: String,
    #[serde(default = "default_language")]
    pub default_language: String,
}

fn default_transcription_url() -> String {
    "https://api.supadata.ai/v1/transcript".to_string()
}

fn default_ai_url() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_youtube_url() -> String {
    "https://www.googleapis.com/youtube/v3/videos".to_string()
}

fn default_transcript_timeout() -> u64 {
    TRANSCRIPT_TIMEOUT_SECS
}

fn default_ai_timeout() -> u64 {
    AI_TIMEOUT_SECS
}

fn default_youtube_timeout() -> u64 {
    YOUTUBE_TIMEOUT_SECS
}

fn default_ai_model() -> String {
    "gpt-4".to_string()
}

fn default_ai_temperature() -> f32 {
    0.7
}

fn default_ai_max_tokens() -> u32 {
    2000
}

fn default_system_prompt() -> String {
    "You are an assistant that writes descriptions for YouTube videos.".to_string()
}

fn default_language() -> String {
    "it".to_string()
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            transcription_url: default_transcription_url(),
            ai_url: default_ai_url(),
            youtube_url: default_youtube_url(),
            transcript_timeout_secs: default_transcript_timeout(),
            ai_timeout_secs: default_ai_timeout(),
            youtube_timeout_secs: default_youtube_timeout(),
            ai_model: default_ai_model(),
            ai_temperature: default_ai_temperature(),
            ai_max_tokens: default_ai_max_tokens(),
            default_system_prompt: default_system_prompt(),
            default_language: default_language(),
        }
    }
}

// === Audit ===

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_stats_window_hours")]
    pub stats_window_hours: i64,
}

fn default_stats_window_hours() -> i64 {
    STATS_WINDOW_HOURS
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            stats_window_hours: default_stats_window_hours(),
        }
    }
}
