//! Per-tenant fixed-window rate limiting.

use gateway_core::{
    EndpointClass, Error, KvStore, RateLimitRule, RateLimitSettings, RequestOrigin, Result,
    SecurityEventType, Tenant,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use telemetry::{health, metrics};
use tracing::{debug, warn};

use crate::audit::AuditLog;

/// Store key of the active window for a tenant and class.
pub fn window_key(class: EndpointClass, tenant_id: &str) -> String {
    format!("gw:ratelimit:{}:{}", class, tenant_id)
}

/// Fixed-window limiter keyed by (endpoint class, tenant).
///
/// Counting happens in the shared store so every gateway process sees the
/// same windows.
pub struct RateLimiter {
    store: Arc<dyn KvStore>,
    settings: RateLimitSettings,
    audit: Arc<AuditLog>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn KvStore>, settings: RateLimitSettings, audit: Arc<AuditLog>) -> Self {
        Self {
            store,
            settings,
            audit,
        }
    }

    /// Rule in force for `tenant` on `class`.
    ///
    /// General gateway traffic is governed by the tenant's own quota.
    pub fn rule_for(&self, tenant: &Tenant, class: EndpointClass) -> RateLimitRule {
        match class {
            EndpointClass::Gateway => tenant.quota(),
            other => self.settings.rule_for(other),
        }
    }

    /// Admits the call and counts it, or rejects it without counting.
    ///
    /// Returns the window count after this call (0 when limiting is off).
    pub async fn check_and_increment(
        &self,
        tenant: &Tenant,
        class: EndpointClass,
        origin: &RequestOrigin,
    ) -> Result<u64> {
        if !self.settings.enabled {
            return Ok(0);
        }

        let rule = self.rule_for(tenant, class);
        let admission = self
            .store
            .increment_within(
                &window_key(class, &tenant.id),
                u64::from(rule.max_requests),
                Duration::from_secs(rule.window_secs),
            )
            .await
            .inspect_err(|e| {
                warn!(tenant = %tenant.id, class = %class, error = %e, "Rate limit check failed");
                metrics().store_errors.inc();
                health().store.set_unhealthy(e.to_string());
            })?;

        if admission.is_admitted() {
            debug!(
                tenant = %tenant.id,
                class = %class,
                count = admission.count(),
                limit = rule.max_requests,
                "Rate limit check passed"
            );
            return Ok(admission.count());
        }

        metrics().rate_limited_requests.inc();
        self.audit
            .record_security_event(
                SecurityEventType::RateLimitExceeded,
                json!({
                    "license_id": tenant.id,
                    "endpoint_class": class.as_str(),
                    "requests": admission.count(),
                    "limit": rule.max_requests,
                }),
                origin,
            )
            .await;

        Err(Error::RateLimitExceeded {
            limit: rule.max_requests,
            window_secs: rule.window_secs,
        })
    }
}
