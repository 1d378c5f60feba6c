//! ClickHouse table schemas for the audit log.
//!
//! Both tables are append-only. `created_at` is DateTime64(3) for
//! millisecond precision; retention is left to the operator.

/// SQL for creating the database. `{db}` is replaced with the configured name.
pub const CREATE_DATABASE: &str = r#"
CREATE DATABASE IF NOT EXISTS {db}
"#;

/// One row per completed gateway call.
pub const CREATE_API_LOGS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS {db}.api_logs (
    license_id Nullable(String),
    endpoint LowCardinality(String),
    resource_id String,
    status_code UInt16,
    response_size UInt64,
    attempts UInt32,
    cached UInt8,
    ip_address String,
    user_agent String,
    created_at DateTime64(3)
)
ENGINE = MergeTree()
PARTITION BY toYYYYMM(created_at)
ORDER BY (endpoint, created_at)
SETTINGS index_granularity = 8192
"#;

/// One row per security filter or rate limiter rejection.
pub const CREATE_SECURITY_LOG_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS {db}.security_log (
    event_type LowCardinality(String),
    event_data String,
    ip_address String,
    user_agent String,
    created_at DateTime64(3)
)
ENGINE = MergeTree()
PARTITION BY toYYYYMM(created_at)
ORDER BY (event_type, created_at)
SETTINGS index_granularity = 8192
"#;

/// All creation statements for `database`, in order.
pub fn all_tables(database: &str) -> Vec<String> {
    [CREATE_DATABASE, CREATE_API_LOGS_TABLE, CREATE_SECURITY_LOG_TABLE]
        .iter()
        .map(|ddl| ddl.replace("{db}", database))
        .collect()
}
