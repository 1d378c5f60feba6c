//! Redis configuration.

use serde::{Deserialize, Serialize};

/// Redis connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// `redis://` or `rediss://` URL
    pub url: String,
    /// Keys fetched per SCAN round when clearing a prefix
    #[serde(default = "default_scan_count")]
    pub scan_count: usize,
}

fn default_scan_count() -> usize {
    500
}

impl RedisConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            scan_count: default_scan_count(),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self::new("redis://localhost:6379")
    }
}
