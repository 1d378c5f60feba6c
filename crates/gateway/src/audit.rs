//! Audit log front-end used by the pipeline.
//!
//! Writes are best effort: a failing sink is logged and counted but never
//! fails the call being audited.

use chrono::Duration as ChronoDuration;
use gateway_core::{
    AuditRecord, AuditSink, Clock, EndpointStats, RequestOrigin, Result, SecurityEvent,
    SecurityEventType,
};
use std::sync::Arc;
use telemetry::{health, metrics};
use tracing::{error, warn};

pub struct AuditLog {
    sink: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
    enabled: bool,
}

impl AuditLog {
    pub fn new(sink: Arc<dyn AuditSink>, clock: Arc<dyn Clock>, enabled: bool) -> Self {
        Self {
            sink,
            clock,
            enabled,
        }
    }

    /// Appends one call record.
    pub async fn record_call(&self, record: AuditRecord) {
        if !self.enabled {
            return;
        }

        if let Err(e) = self.sink.record_call(record).await {
            error!(error = %e, "Failed to write audit record");
            metrics().audit_write_errors.inc();
            health().audit.set_unhealthy(e.to_string());
        }
    }

    /// Appends a security event and mirrors it to the log.
    pub async fn record_security_event(
        &self,
        event_type: SecurityEventType,
        event_data: serde_json::Value,
        origin: &RequestOrigin,
    ) {
        warn!(
            event = %event_type,
            ip = %origin.client_ip,
            data = %event_data,
            "Security event"
        );

        if !self.enabled {
            return;
        }

        let event = SecurityEvent {
            event_type,
            event_data,
            client_ip: origin.client_ip.clone(),
            user_agent: origin.user_agent.clone(),
            timestamp: self.clock.now(),
        };

        if let Err(e) = self.sink.record_security_event(event).await {
            error!(error = %e, "Failed to write security event");
            metrics().audit_write_errors.inc();
            health().audit.set_unhealthy(e.to_string());
        }
    }

    /// Per-endpoint stats over the trailing `window_hours`.
    pub async fn stats(&self, window_hours: i64) -> Result<Vec<EndpointStats>> {
        let since = self.clock.now() - ChronoDuration::hours(window_hours);
        self.sink.endpoint_stats(since).await
    }
}
