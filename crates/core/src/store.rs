//! Shared key-value state used by the key pool, cache and rate limiter.
//!
//! Implementations must make `increment` and `increment_within` atomic with
//! respect to every other process using the same backend.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Outcome of a bounded increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The counter was incremented to `count`.
    Admitted { count: u64 },
    /// The counter was already at the limit and was left untouched.
    Rejected { count: u64 },
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Self::Admitted { .. })
    }

    pub fn count(&self) -> u64 {
        match self {
            Self::Admitted { count } | Self::Rejected { count } => *count,
        }
    }
}

/// Key-value store with TTLs and atomic counters.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Reads a live value. Expired entries read as `None`.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Writes a value, optionally expiring after `ttl`. Last write wins.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;

    /// Removes a key. Returns whether it existed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Removes every key starting with `prefix`. Returns how many were removed.
    async fn delete_prefix(&self, prefix: &str) -> Result<u64>;

    /// Atomically increments a persistent counter and returns the new value.
    async fn increment(&self, key: &str) -> Result<u64>;

    /// Fixed-window increment.
    ///
    /// If the key is missing or expired, a new window of length `window`
    /// starts with count 1. If the count is below `max` it is incremented.
    /// Otherwise the call is rejected and the count is not changed.
    async fn increment_within(&self, key: &str, max: u64, window: Duration) -> Result<Admission>;
}
