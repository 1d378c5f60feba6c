//! Audit records, security events and the sink they are written to.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::Result;
use crate::limits::MAX_AUDIT_RESOURCE_ID_LEN;
use crate::tenant::RequestOrigin;
use crate::text::truncate_chars;

/// Gateway operations that are audited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    Transcript,
    AiDescription,
    YoutubeData,
}

impl Endpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transcript => "transcript",
            Self::AiDescription => "ai_description",
            Self::YoutubeData => "youtube_data",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One completed gateway operation. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub tenant_id: Option<String>,
    pub endpoint: String,
    /// Truncated to 100 characters
    pub resource_id: String,
    pub status_code: u16,
    pub response_size: u64,
    pub attempts: u32,
    pub cache_hit: bool,
    pub client_ip: String,
    pub user_agent: String,
    pub timestamp: DateTime<Utc>,
}

impl AuditRecord {
    pub fn new(
        tenant_id: Option<&str>,
        endpoint: Endpoint,
        resource_id: &str,
        origin: &RequestOrigin,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.map(str::to_string),
            endpoint: endpoint.as_str().to_string(),
            resource_id: truncate_chars(resource_id, MAX_AUDIT_RESOURCE_ID_LEN),
            status_code: 200,
            response_size: 0,
            attempts: 0,
            cache_hit: false,
            client_ip: origin.client_ip.clone(),
            user_agent: origin.user_agent.clone(),
            timestamp,
        }
    }

    pub fn status(mut self, status_code: u16) -> Self {
        self.status_code = status_code;
        self
    }

    pub fn response_size(mut self, size: u64) -> Self {
        self.response_size = size;
        self
    }

    pub fn attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn cache_hit(mut self, hit: bool) -> Self {
        self.cache_hit = hit;
        self
    }

    pub fn is_error(&self) -> bool {
        self.status_code >= 400
    }
}

/// Kinds of security-relevant rejections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityEventType {
    RequestTooLarge,
    BlockedUserAgent,
    SuspiciousPayload,
    InvalidRequest,
    RateLimitExceeded,
}

impl SecurityEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RequestTooLarge => "request_too_large",
            Self::BlockedUserAgent => "blocked_user_agent",
            Self::SuspiciousPayload => "suspicious_payload",
            Self::InvalidRequest => "invalid_request",
            Self::RateLimitExceeded => "rate_limit_exceeded",
        }
    }
}

impl fmt::Display for SecurityEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rejected request. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityEvent {
    pub event_type: SecurityEventType,
    pub event_data: serde_json::Value,
    pub client_ip: String,
    pub user_agent: String,
    pub timestamp: DateTime<Utc>,
}

/// Per-endpoint aggregate over a trailing window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointStats {
    pub endpoint: String,
    pub total_calls: u64,
    pub cache_hits: u64,
    pub avg_response_size: f64,
    pub avg_attempts: f64,
    pub errors: u64,
}

/// Append-only destination for audit data.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record_call(&self, record: AuditRecord) -> Result<()>;

    async fn record_security_event(&self, event: SecurityEvent) -> Result<()>;

    /// Aggregates records with `timestamp >= since`, one row per endpoint.
    async fn endpoint_stats(&self, since: DateTime<Utc>) -> Result<Vec<EndpointStats>>;
}

/// In-process aggregation shared by sinks that hold records in memory.
pub fn aggregate_stats<'a, I>(records: I, since: DateTime<Utc>) -> Vec<EndpointStats>
where
    I: IntoIterator<Item = &'a AuditRecord>,
{
    #[derive(Default)]
    struct Acc {
        calls: u64,
        hits: u64,
        size: u64,
        attempts: u64,
        errors: u64,
    }

    let mut by_endpoint: BTreeMap<&str, Acc> = BTreeMap::new();
    for record in records.into_iter().filter(|r| r.timestamp >= since) {
        let acc = by_endpoint.entry(record.endpoint.as_str()).or_default();
        acc.calls += 1;
        acc.hits += u64::from(record.cache_hit);
        acc.size += record.response_size;
        acc.attempts += u64::from(record.attempts);
        acc.errors += u64::from(record.is_error());
    }

    by_endpoint
        .into_iter()
        .map(|(endpoint, acc)| EndpointStats {
            endpoint: endpoint.to_string(),
            total_calls: acc.calls,
            cache_hits: acc.hits,
            avg_response_size: acc.size as f64 / acc.calls as f64,
            avg_attempts: acc.attempts as f64 / acc.calls as f64,
            errors: acc.errors,
        })
        .collect()
}
