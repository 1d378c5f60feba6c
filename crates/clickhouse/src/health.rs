//! ClickHouse health checks.

use crate::client::ClickHouseClient;
use crate::schema::all_tables;
use gateway_core::{Error, Result};
use tracing::{debug, error};

/// Check ClickHouse connection health.
pub async fn check_connection(client: &ClickHouseClient) -> bool {
    match client.inner().query("SELECT 1").fetch_one::<u8>().await {
        Ok(_) => {
            debug!("ClickHouse connection healthy");
            true
        }
        Err(e) => {
            error!("ClickHouse health check failed: {}", e);
            false
        }
    }
}

/// Initialize database schema.
pub async fn init_schema(client: &ClickHouseClient) -> Result<()> {
    for ddl in all_tables(&client.config().database) {
        client
            .inner()
            .query(&ddl)
            .execute()
            .await
            .map_err(|e| Error::audit(format!("Failed to execute DDL: {}", e)))?;
    }

    debug!("ClickHouse schema initialized");
    Ok(())
}
