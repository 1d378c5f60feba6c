//! `KvStore` on Redis.
//!
//! Counters use server-side atomics (`INCR` and a Lua script), so any
//! number of gateway processes can share one Redis.

use async_trait::async_trait;
use gateway_core::{Admission, Error, KvStore, Result};
use redis::aio::ConnectionManager;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::RedisConfig;

/// Fixed-window admission.
///
/// Returns the new count, or the negated current count when the window is
/// already full. The expiry is set on the first hit of a window and repaired
/// if a key ever lost it.
const INCREMENT_WITHIN_SCRIPT: &str = r#"
local current = tonumber(redis.call('GET', KEYS[1]) or '0')
local max = tonumber(ARGV[1])
if current >= max and current > 0 then
    return -current
end
local count = redis.call('INCR', KEYS[1])
if count == 1 or redis.call('PTTL', KEYS[1]) == -1 then
    redis.call('PEXPIRE', KEYS[1], ARGV[2])
end
return count
"#;

fn store_err(op: &str, e: redis::RedisError) -> Error {
    Error::store(format!("redis {} failed: {}", op, e))
}

/// Escapes glob metacharacters for `SCAN MATCH`.
fn escape_pattern(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('*');
    escaped
}

/// Redis store with automatic reconnection.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    script: redis::Script,
    scan_count: usize,
}

impl RedisStore {
    /// Connects to the configured server.
    pub async fn connect(config: &RedisConfig) -> Result<Self> {
        let client = redis::Client::open(config.url.as_str())
            .map_err(|e| Error::config(format!("invalid redis url: {}", e)))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| store_err("connect", e))?;

        info!("Connected to Redis");

        Ok(Self {
            conn,
            script: redis::Script::new(INCREMENT_WITHIN_SCRIPT),
            scan_count: config.scan_count.max(1),
        })
    }

    /// A cloned handle to the managed connection.
    pub fn connection(&self) -> ConnectionManager {
        self.conn.clone()
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| store_err("GET", e))?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("PX").arg(ttl.as_millis().max(1) as u64);
        }
        let _: () = cmd
            .query_async(&mut conn)
            .await
            .map_err(|e| store_err("SET", e))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let removed: i64 = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| store_err("DEL", e))?;
        Ok(removed > 0)
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64> {
        let mut conn = self.conn.clone();
        let pattern = escape_pattern(prefix);
        let mut cursor: u64 = 0;
        let mut removed: u64 = 0;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(self.scan_count)
                .query_async(&mut conn)
                .await
                .map_err(|e| store_err("SCAN", e))?;

            if !keys.is_empty() {
                let deleted: i64 = redis::cmd("DEL")
                    .arg(&keys)
                    .query_async(&mut conn)
                    .await
                    .map_err(|e| store_err("DEL", e))?;
                removed += deleted.max(0) as u64;
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        debug!(prefix = %prefix, removed = removed, "Deleted keys by prefix");
        Ok(removed)
    }

    async fn increment(&self, key: &str) -> Result<u64> {
        let mut conn = self.conn.clone();
        let value: i64 = redis::cmd("INCR")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| store_err("INCR", e))?;
        Ok(value.max(0) as u64)
    }

    async fn increment_within(&self, key: &str, max: u64, window: Duration) -> Result<Admission> {
        let mut conn = self.conn.clone();
        let result: i64 = self
            .script
            .key(key)
            .arg(max)
            .arg(window.as_millis().max(1) as u64)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| store_err("EVALSHA", e))?;

        Ok(if result < 0 {
            Admission::Rejected {
                count: result.unsigned_abs(),
            }
        } else {
            Admission::Admitted {
                count: result as u64,
            }
        })
    }
}
