//! In-process store and audit log.
//!
//! Suitable for a single gateway process and for tests. Multi-process
//! deployments use the Redis store and the ClickHouse audit log instead.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gateway_core::{
    aggregate_stats, Admission, AuditRecord, AuditSink, Clock, EndpointStats, KvStore, Result,
    SecurityEvent,
};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

/// `KvStore` over a mutex-guarded map.
///
/// TTLs are evaluated against the injected clock, so a `ManualClock`
/// makes expiry deterministic.
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    fn expiry(&self, ttl: Option<Duration>) -> Option<DateTime<Utc>> {
        let ttl = ttl?;
        let ttl = chrono::Duration::from_std(ttl).ok()?;
        self.clock.now().checked_add_signed(ttl)
    }

    /// Drops expired entries. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed = removed, "Purged expired store entries");
        }
        removed
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = self.clock.now();
        let entries = self.entries.lock();
        Ok(entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let entry = Entry {
            value: value.to_string(),
            expires_at: self.expiry(ttl),
        };
        self.entries.lock().insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let now = self.clock.now();
        Ok(self
            .entries
            .lock()
            .remove(key)
            .map_or(false, |entry| entry.is_live(now)))
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        let mut removed = 0u64;
        entries.retain(|key, entry| {
            if key.starts_with(prefix) {
                removed += u64::from(entry.is_live(now));
                false
            } else {
                true
            }
        });
        Ok(removed)
    }

    async fn increment(&self, key: &str) -> Result<u64> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        let entry = entries
            .entry(key.to_string())
            .and_modify(|entry| {
                if !entry.is_live(now) {
                    entry.value = "0".to_string();
                    entry.expires_at = None;
                }
            })
            .or_insert_with(|| Entry {
                value: "0".to_string(),
                expires_at: None,
            });

        let next = entry.value.parse::<u64>().unwrap_or(0) + 1;
        entry.value = next.to_string();
        Ok(next)
    }

    async fn increment_within(&self, key: &str, max: u64, window: Duration) -> Result<Admission> {
        let now = self.clock.now();
        let window_end = self.expiry(Some(window));
        let mut entries = self.entries.lock();

        let current = entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .and_then(|entry| entry.value.parse::<u64>().ok());

        match current {
            None => {
                entries.insert(
                    key.to_string(),
                    Entry {
                        value: "1".to_string(),
                        expires_at: window_end,
                    },
                );
                Ok(Admission::Admitted { count: 1 })
            }
            Some(count) if count < max => {
                if let Some(entry) = entries.get_mut(key) {
                    entry.value = (count + 1).to_string();
                }
                Ok(Admission::Admitted { count: count + 1 })
            }
            Some(count) => Ok(Admission::Rejected { count }),
        }
    }
}

/// Append-only audit log kept in memory.
#[derive(Default)]
pub struct MemoryAuditLog {
    records: RwLock<Vec<AuditRecord>>,
    events: RwLock<Vec<SecurityEvent>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.read().clone()
    }

    pub fn security_events(&self) -> Vec<SecurityEvent> {
        self.events.read().clone()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditLog {
    async fn record_call(&self, record: AuditRecord) -> Result<()> {
        self.records.write().push(record);
        Ok(())
    }

    async fn record_security_event(&self, event: SecurityEvent) -> Result<()> {
        self.events.write().push(event);
        Ok(())
    }

    async fn endpoint_stats(&self, since: DateTime<Utc>) -> Result<Vec<EndpointStats>> {
        Ok(aggregate_stats(self.records.read().iter(), since))
    }
}
