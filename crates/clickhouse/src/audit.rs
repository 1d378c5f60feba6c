//! `AuditSink` backed by the `api_logs` and `security_log` tables.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clickhouse::Row;
use gateway_core::{AuditRecord, AuditSink, EndpointStats, Error, Result, SecurityEvent};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::ClickHouseClient;

/// Row in `api_logs`.
#[derive(Debug, Clone, Row, Serialize)]
pub struct ApiLogRow {
    pub license_id: Option<String>,
    pub endpoint: String,
    pub resource_id: String,
    pub status_code: u16,
    pub response_size: u64,
    pub attempts: u32,
    pub cached: u8,
    pub ip_address: String,
    pub user_agent: String,
    pub created_at: i64, // milliseconds since epoch
}

impl From<AuditRecord> for ApiLogRow {
    fn from(record: AuditRecord) -> Self {
        Self {
            license_id: record.tenant_id,
            endpoint: record.endpoint,
            resource_id: record.resource_id,
            status_code: record.status_code,
            response_size: record.response_size,
            attempts: record.attempts,
            cached: u8::from(record.cache_hit),
            ip_address: record.client_ip,
            user_agent: record.user_agent,
            created_at: record.timestamp.timestamp_millis(),
        }
    }
}

/// Row in `security_log`.
#[derive(Debug, Clone, Row, Serialize)]
pub struct SecurityLogRow {
    pub event_type: String,
    /// JSON-encoded event data
    pub event_data: String,
    pub ip_address: String,
    pub user_agent: String,
    pub created_at: i64,
}

impl From<SecurityEvent> for SecurityLogRow {
    fn from(event: SecurityEvent) -> Self {
        Self {
            event_type: event.event_type.as_str().to_string(),
            event_data: event.event_data.to_string(),
            ip_address: event.client_ip,
            user_agent: event.user_agent,
            created_at: event.timestamp.timestamp_millis(),
        }
    }
}

#[derive(Debug, Clone, Row, Deserialize)]
struct StatsRow {
    endpoint: String,
    total_calls: u64,
    cache_hits: u64,
    avg_response_size: f64,
    avg_attempts: f64,
    errors: u64,
}

/// Audit log stored in ClickHouse.
#[derive(Clone)]
pub struct ClickHouseAuditLog {
    client: ClickHouseClient,
}

impl ClickHouseAuditLog {
    pub fn new(client: ClickHouseClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ClickHouseClient {
        &self.client
    }

    async fn insert_row<T>(&self, table: &str, row: &T) -> Result<()>
    where
        T: Row + Serialize,
    {
        let table = self.client.table(table);
        let mut insert = self
            .client
            .inner()
            .insert(&table)
            .map_err(|e| Error::audit(format!("Insert error: {}", e)))?;

        insert
            .write(row)
            .await
            .map_err(|e| Error::audit(format!("Write error: {}", e)))?;

        insert
            .end()
            .await
            .map_err(|e| Error::audit(format!("End error: {}", e)))?;

        debug!(table = %table, "Audit row inserted");
        Ok(())
    }
}

#[async_trait]
impl AuditSink for ClickHouseAuditLog {
    async fn record_call(&self, record: AuditRecord) -> Result<()> {
        self.insert_row("api_logs", &ApiLogRow::from(record)).await
    }

    async fn record_security_event(&self, event: SecurityEvent) -> Result<()> {
        self.insert_row("security_log", &SecurityLogRow::from(event))
            .await
    }

    async fn endpoint_stats(&self, since: DateTime<Utc>) -> Result<Vec<EndpointStats>> {
        let sql = format!(
            "SELECT endpoint, count() AS total_calls, sum(cached) AS cache_hits, \
             avg(response_size) AS avg_response_size, avg(attempts) AS avg_attempts, \
             countIf(status_code >= 400) AS errors \
             FROM {} WHERE created_at >= fromUnixTimestamp64Milli(?) \
             GROUP BY endpoint ORDER BY endpoint",
            self.client.table("api_logs")
        );

        let rows: Vec<StatsRow> = self
            .client
            .inner()
            .query(&sql)
            .bind(since.timestamp_millis())
            .fetch_all()
            .await
            .map_err(|e| Error::audit(format!("Query error: {}", e)))?;

        Ok(rows
            .into_iter()
            .map(|row| EndpointStats {
                endpoint: row.endpoint,
                total_calls: row.total_calls,
                cache_hits: row.cache_hits,
                avg_response_size: row.avg_response_size,
                avg_attempts: row.avg_attempts,
                errors: row.errors,
            })
            .collect())
    }
}
