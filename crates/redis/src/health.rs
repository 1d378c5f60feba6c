//! Redis health checks.

use crate::store::RedisStore;
use tracing::{debug, error};

/// PING the server.
pub async fn check_connection(store: &RedisStore) -> bool {
    let mut conn = store.connection();
    let pong: redis::RedisResult<String> = redis::cmd("PING").query_async(&mut conn).await;
    match pong {
        Ok(_) => {
            debug!("Redis connection healthy");
            true
        }
        Err(e) => {
            error!("Redis health check failed: {}", e);
            false
        }
    }
}
