//! Request screening: size cap, user agent blocklist, payload patterns.
//!
//! Pattern screening is a coarse substring heuristic, not a parser. It
//! catches obvious injection probes and nothing more.

use gateway_core::{Error, RequestOrigin, Result, SecurityConfig, SecurityEventType};
use serde_json::json;
use std::sync::Arc;
use telemetry::metrics;
use tracing::debug;
use woothee::parser::Parser;

use crate::audit::AuditLog;

/// What the filter looks at for one call.
#[derive(Debug, Clone, Copy)]
pub struct RequestDescriptor<'a> {
    /// Body size in bytes
    pub body_size: usize,
    /// Serialized request payload
    pub payload: &'a str,
    pub origin: &'a RequestOrigin,
}

pub struct SecurityFilter {
    max_request_bytes: usize,
    blocked_user_agents: Vec<String>,
    suspicious_patterns: Vec<String>,
    crawler_parser: Option<Parser>,
    audit: Arc<AuditLog>,
}

impl SecurityFilter {
    pub fn new(config: &SecurityConfig, audit: Arc<AuditLog>) -> Self {
        let lowered = |terms: &[String]| -> Vec<String> {
            terms
                .iter()
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect()
        };

        Self {
            max_request_bytes: config.max_request_bytes,
            blocked_user_agents: lowered(&config.blocked_user_agents),
            suspicious_patterns: lowered(&config.suspicious_patterns),
            crawler_parser: config.block_known_crawlers.then(Parser::new),
            audit,
        }
    }

    /// Screens a request. Every rejection is recorded as a security event.
    pub async fn validate(&self, request: RequestDescriptor<'_>) -> Result<()> {
        let origin = request.origin;

        if request.body_size > self.max_request_bytes {
            return self
                .reject(
                    SecurityEventType::RequestTooLarge,
                    json!({
                        "size": request.body_size,
                        "limit": self.max_request_bytes,
                        "ip": origin.client_ip,
                    }),
                    origin,
                    Error::RequestTooLarge {
                        size: request.body_size,
                        limit: self.max_request_bytes,
                    },
                )
                .await;
        }

        let user_agent = origin.user_agent.to_lowercase();
        if let Some(term) = self
            .blocked_user_agents
            .iter()
            .find(|term| user_agent.contains(term.as_str()))
        {
            return self
                .reject(
                    SecurityEventType::BlockedUserAgent,
                    json!({
                        "user_agent": origin.user_agent,
                        "matched": term,
                        "ip": origin.client_ip,
                    }),
                    origin,
                    Error::forbidden("blocked user agent"),
                )
                .await;
        }

        if self.is_known_crawler(&origin.user_agent) {
            return self
                .reject(
                    SecurityEventType::BlockedUserAgent,
                    json!({
                        "user_agent": origin.user_agent,
                        "matched": "crawler",
                        "ip": origin.client_ip,
                    }),
                    origin,
                    Error::forbidden("crawler user agent"),
                )
                .await;
        }

        let payload = request.payload.to_lowercase();
        if let Some(pattern) = self
            .suspicious_patterns
            .iter()
            .find(|pattern| payload.contains(pattern.as_str()))
        {
            return self
                .reject(
                    SecurityEventType::SuspiciousPayload,
                    json!({
                        "pattern": pattern,
                        "ip": origin.client_ip,
                    }),
                    origin,
                    Error::invalid_request("suspicious payload"),
                )
                .await;
        }

        debug!(ip = %origin.client_ip, size = request.body_size, "Request passed security filter");
        Ok(())
    }

    /// Rejects a malformed request (e.g. a required field is empty).
    pub async fn reject_invalid(&self, reason: &str, origin: &RequestOrigin) -> Error {
        metrics().security_rejections.inc();
        self.audit
            .record_security_event(
                SecurityEventType::InvalidRequest,
                json!({ "reason": reason, "ip": origin.client_ip }),
                origin,
            )
            .await;
        Error::invalid_request(reason)
    }

    fn is_known_crawler(&self, user_agent: &str) -> bool {
        let Some(parser) = &self.crawler_parser else {
            return false;
        };
        if user_agent.is_empty() {
            return false;
        }
        parser
            .parse(user_agent)
            .map_or(false, |result| result.category == "crawler")
    }

    async fn reject(
        &self,
        event_type: SecurityEventType,
        data: serde_json::Value,
        origin: &RequestOrigin,
        error: Error,
    ) -> Result<()> {
        metrics().security_rejections.inc();
        self.audit.record_security_event(event_type, data, origin).await;
        Err(error)
    }
}
