//! Retry/failover orchestration of upstream calls.
//!
//! Per attempt k (1-indexed):
//! - transport failure: back off `unit * 2^(k-1)`, then retry
//! - 402/429: rotate to the next credential immediately, no backoff
//! - 2xx: parse the payload and stop
//! - any other status: stop with the provider's status and message
//!
//! Backoff is only slept when another attempt follows.

use gateway_core::{Clock, Credential, Error, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use telemetry::{health, metrics};
use tracing::{debug, info, warn};
use upstream::{Transport, UpstreamRequest, UpstreamResponse};

use crate::key_pool::KeySelection;

/// Attempt budget and backoff unit for one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_unit: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_unit: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_unit,
        }
    }

    /// One attempt, no retries.
    pub fn single() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Backoff slept after a transient failure of `attempt`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.backoff_unit.saturating_mul(1u32 << exp)
    }
}

/// Terminal state of an orchestrated call.
#[derive(Debug)]
pub struct Execution<T> {
    pub outcome: Result<T>,
    /// Attempts actually made
    pub attempts: u32,
    /// Last HTTP status seen, if any response arrived
    pub status: Option<u16>,
}

/// Drives a key selection against the transport.
pub struct Orchestrator {
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
}

impl Orchestrator {
    pub fn new(transport: Arc<dyn Transport>, clock: Arc<dyn Clock>) -> Self {
        Self { transport, clock }
    }

    /// Runs the state machine.
    ///
    /// `build` turns the attempt's credential into a request, `parse` turns
    /// a 2xx response into the result. A `parse` error is terminal.
    pub async fn execute<T, B, P>(
        &self,
        selection: &KeySelection<'_>,
        policy: RetryPolicy,
        build: B,
        parse: P,
    ) -> Execution<T>
    where
        B: Fn(&Credential) -> Result<UpstreamRequest>,
        P: Fn(&UpstreamResponse) -> Result<T>,
    {
        let mut last_error: Option<Error> = None;
        let mut last_status: Option<u16> = None;
        let mut attempts = 0;

        for attempt in 1..=policy.max_attempts {
            attempts = attempt;
            let credential = selection.select(attempt);

            let request = match build(credential) {
                Ok(request) => request,
                Err(e) => {
                    return Execution {
                        outcome: Err(e),
                        attempts,
                        status: last_status,
                    }
                }
            };

            debug!(
                attempt = attempt,
                max_attempts = policy.max_attempts,
                key = %credential.masked(),
                url = %request.url,
                "Upstream attempt"
            );

            metrics().upstream_attempts.inc();
            let started = Instant::now();
            let sent = self.transport.send(request).await;
            metrics()
                .upstream_latency_ms
                .observe(started.elapsed().as_millis() as u64);

            let response = match sent {
                Ok(response) => response,
                Err(e) => {
                    warn!(
                        attempt = attempt,
                        key = %credential.masked(),
                        error = %e,
                        "Upstream transport failure"
                    );
                    metrics().upstream_failures.inc();
                    health().upstream.set_unhealthy(e.to_string());
                    last_error = Some(Error::transport(e.0));

                    if attempt < policy.max_attempts {
                        let backoff = policy.backoff(attempt);
                        metrics().backoff_sleeps.inc();
                        self.clock.sleep(backoff).await;
                    }
                    continue;
                }
            };

            health().upstream.set_healthy();
            last_status = Some(response.status);

            if response.is_success() {
                let outcome = parse(&response);
                if outcome.is_ok() && attempt > 1 {
                    info!(attempts = attempt, "Upstream call succeeded after retry");
                }
                return Execution {
                    outcome,
                    attempts,
                    status: last_status,
                };
            }

            if response.is_quota_exhausted() {
                warn!(
                    attempt = attempt,
                    status = response.status,
                    key = %credential.masked(),
                    "Upstream quota exhausted, rotating credential"
                );
                metrics().upstream_failures.inc();
                metrics().key_rotations.inc();
                last_error = Some(Error::UpstreamQuotaExhausted {
                    status: response.status,
                });
                continue;
            }

            metrics().upstream_failures.inc();
            let message = response.error_message();
            warn!(status = response.status, message = %message, "Upstream request rejected");
            return Execution {
                outcome: Err(Error::upstream(response.status, message)),
                attempts,
                status: last_status,
            };
        }

        let last = last_error.unwrap_or_else(|| Error::internal("no upstream attempt was made"));
        let outcome = if policy.max_attempts > 1 {
            Err(Error::RetryExhausted {
                attempts,
                last: Box::new(last),
            })
        } else {
            Err(last)
        };

        Execution {
            outcome,
            attempts,
            status: last_status,
        }
    }
}
