//! Internal metrics collection.
//!
//! Process-local counters and histograms for the gateway pipeline. Shared
//! state lives in the store; these numbers only describe this process.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// A counter metric.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn reset(&self) -> u64 {
        self.0.swap(0, Ordering::Relaxed)
    }
}

/// A gauge metric (can go up or down).
#[derive(Debug, Default)]
pub struct Gauge(AtomicU64);

impl Gauge {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn set(&self, val: u64) {
        self.0.store(val, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec(&self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Histogram for latency tracking.
#[derive(Debug)]
pub struct Histogram {
    /// Buckets: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 5s, 10s
    buckets: [AtomicU64; 11],
    sum: AtomicU64,
    count: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    const BUCKET_BOUNDS: [u64; 11] = [1, 5, 10, 25, 50, 100, 250, 500, 1000, 5000, 10000];

    pub fn new() -> Self {
        Self {
            buckets: Default::default(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Records a value in milliseconds.
    pub fn observe(&self, ms: u64) {
        self.sum.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        for (i, &bound) in Self::BUCKET_BOUNDS.iter().enumerate() {
            if ms <= bound {
                self.buckets[i].fetch_add(1, Ordering::Relaxed);
                return;
            }
        }
        // Value exceeds all buckets, add to last
        self.buckets[10].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum() as f64 / count as f64
        }
    }

    /// Returns bucket counts.
    pub fn buckets(&self) -> Vec<(u64, u64)> {
        Self::BUCKET_BOUNDS
            .iter()
            .zip(self.buckets.iter())
            .map(|(&bound, count)| (bound, count.load(Ordering::Relaxed)))
            .collect()
    }
}

/// Collected metrics for the gateway.
#[derive(Debug, Default)]
pub struct Metrics {
    // Facade metrics
    pub gateway_calls: Counter,
    pub gateway_errors: Counter,
    pub cache_hits: Counter,
    pub cache_misses: Counter,

    // Gate metrics
    pub rate_limited_requests: Counter,
    pub security_rejections: Counter,

    // Upstream metrics
    pub upstream_attempts: Counter,
    pub upstream_failures: Counter,
    pub key_rotations: Counter,
    pub backoff_sleeps: Counter,

    // Storage metrics
    pub store_errors: Counter,
    pub audit_write_errors: Counter,

    // Latency histograms
    pub gateway_latency_ms: Histogram,
    pub upstream_latency_ms: Histogram,

    // Gauges
    pub in_flight_calls: Gauge,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fraction of cacheable lookups served from cache.
    pub fn cache_hit_ratio(&self) -> f64 {
        let hits = self.cache_hits.get();
        let total = hits + self.cache_misses.get();
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

/// A snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub gateway_calls: u64,
    pub gateway_errors: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub rate_limited_requests: u64,
    pub security_rejections: u64,
    pub upstream_attempts: u64,
    pub upstream_failures: u64,
    pub key_rotations: u64,
    pub backoff_sleeps: u64,
    pub store_errors: u64,
    pub audit_write_errors: u64,
    pub gateway_latency_mean_ms: f64,
    pub upstream_latency_mean_ms: f64,
    pub in_flight_calls: u64,
}

impl Metrics {
    /// Takes a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            gateway_calls: self.gateway_calls.get(),
            gateway_errors: self.gateway_errors.get(),
            cache_hits: self.cache_hits.get(),
            cache_misses: self.cache_misses.get(),
            rate_limited_requests: self.rate_limited_requests.get(),
            security_rejections: self.security_rejections.get(),
            upstream_attempts: self.upstream_attempts.get(),
            upstream_failures: self.upstream_failures.get(),
            key_rotations: self.key_rotations.get(),
            backoff_sleeps: self.backoff_sleeps.get(),
            store_errors: self.store_errors.get(),
            audit_write_errors: self.audit_write_errors.get(),
            gateway_latency_mean_ms: self.gateway_latency_ms.mean(),
            upstream_latency_mean_ms: self.upstream_latency_ms.mean(),
            in_flight_calls: self.in_flight_calls.get(),
        }
    }
}

/// Global metrics registry.
pub static METRICS: std::sync::LazyLock<Metrics> = std::sync::LazyLock::new(Metrics::new);

/// Get the global metrics instance.
pub fn metrics() -> &'static Metrics {
    &METRICS
}
