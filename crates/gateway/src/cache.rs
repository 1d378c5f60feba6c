//! Response cache over the shared key-value store.
//!
//! Keys are `gw:cache:<operation>:<digest>`, where the digest covers the
//! resource id and every parameter that changes the upstream answer.
//! Store failures degrade to misses and are never surfaced to callers.

use gateway_core::{Error, KvStore, Result};
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use telemetry::{health, metrics};
use tracing::{debug, info, warn};

pub const CACHE_PREFIX: &str = "gw:cache:";

/// Operation whose results are cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOperation {
    Transcript,
    YoutubeData,
}

impl CacheOperation {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Transcript => "gw:cache:transcript:",
            Self::YoutubeData => "gw:cache:yt_data:",
        }
    }
}

/// Scope of an operator-triggered cache clear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheScope {
    All,
    Transcript,
    YoutubeData,
}

impl CacheScope {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::All => CACHE_PREFIX,
            Self::Transcript => CacheOperation::Transcript.prefix(),
            Self::YoutubeData => CacheOperation::YoutubeData.prefix(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Transcript => "transcript",
            Self::YoutubeData => "youtube_data",
        }
    }
}

impl fmt::Display for CacheScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheScope {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "transcript" | "transcripts" => Ok(Self::Transcript),
            "youtube" | "youtube_data" | "yt_data" => Ok(Self::YoutubeData),
            other => Err(Error::invalid_request(format!(
                "unknown cache scope '{}'",
                other
            ))),
        }
    }
}

/// Derives the cache key for an operation.
///
/// Parts are length-prefixed before hashing so ("ab", "c") and ("a", "bc")
/// never collide.
pub fn cache_key(operation: CacheOperation, resource_id: &str, params: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in std::iter::once(resource_id).chain(params.iter().copied()) {
        hasher.update((part.len() as u64).to_be_bytes());
        hasher.update(part.as_bytes());
    }
    let digest = format!("{:x}", hasher.finalize());
    format!("{}{}", operation.prefix(), &digest[..32])
}

/// Typed cache in front of a `KvStore`.
pub struct ResponseCache {
    store: Arc<dyn KvStore>,
    enabled: bool,
}

impl ResponseCache {
    pub fn new(store: Arc<dyn KvStore>, enabled: bool) -> Self {
        Self { store, enabled }
    }

    /// Looks up a live entry. Expired, unreadable and undecodable entries
    /// are all misses.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        if !self.enabled {
            return None;
        }

        let raw = match self.store.get(key).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache read failed, treating as miss");
                metrics().store_errors.inc();
                health().store.set_unhealthy(e.to_string());
                None
            }
        };

        let value = raw.and_then(|raw| match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = %key, error = %e, "Discarding undecodable cache entry");
                None
            }
        });

        if value.is_some() {
            metrics().cache_hits.inc();
            debug!(key = %key, "Cache hit");
        } else {
            metrics().cache_misses.inc();
            debug!(key = %key, "Cache miss");
        }
        value
    }

    /// Stores a value for `ttl`. Failures are logged and swallowed.
    pub async fn put<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        if !self.enabled {
            return;
        }

        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to encode cache entry");
                return;
            }
        };

        if let Err(e) = self.store.set(key, &raw, Some(ttl)).await {
            warn!(key = %key, error = %e, "Cache write failed");
            metrics().store_errors.inc();
            health().store.set_unhealthy(e.to_string());
        }
    }

    /// Removes every entry in `scope`. Returns how many were removed.
    pub async fn clear(&self, scope: CacheScope) -> Result<u64> {
        let removed = self.store.delete_prefix(scope.prefix()).await?;
        info!(scope = %scope, removed = removed, "Cache cleared");
        Ok(removed)
    }
}
