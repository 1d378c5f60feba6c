//! Transcript Gateway
//!
//! Multi-tenant front door for paid upstream providers:
//! - Transcription with key rotation, retries and backoff
//! - AI description generation
//! - Video metadata lookups
//! - Response caching, per-license rate limits, and an audit log

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};

use api::{router, AppState};
use clickhouse_client::{ClickHouseAuditLog, ClickHouseClient, ClickHouseConfig};
use gateway::{Gateway, GatewayDeps, MemoryAuditLog, MemoryStore};
use gateway_core::{AuditSink, Clock, GatewayConfig, KvStore, SystemClock};
use redis_store::{RedisConfig, RedisStore};
use telemetry::{health, init_tracing_from_env};
use upstream::HttpTransport;

/// Interval for health re-checks and in-memory expiry sweeps.
const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(300);

/// Application configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct AppConfig {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,

    /// Shared store. Without one, state is kept in process memory.
    #[serde(default)]
    redis_url: Option<String>,

    /// Audit storage. Without it, audit records are kept in process memory.
    #[serde(default)]
    clickhouse: Option<ClickHouseConfig>,

    /// License service URL ("mock" accepts any well-formed key)
    #[serde(default = "default_license_url")]
    license_url: String,

    /// Enables `/v1/admin/*` when set
    #[serde(default)]
    admin_token: Option<String>,

    #[serde(default)]
    gateway: GatewayConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_license_url() -> String {
    "http://license-service:8080".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            redis_url: None,
            clickhouse: None,
            license_url: default_license_url(),
            admin_token: None,
            gateway: GatewayConfig::default(),
        }
    }
}

/// Store and audit backends selected from configuration.
struct Backends {
    store: Arc<dyn KvStore>,
    audit_sink: Arc<dyn AuditSink>,
    redis: Option<RedisStore>,
    clickhouse: Option<ClickHouseClient>,
    memory_store: Option<Arc<MemoryStore>>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing_from_env();

    info!("Starting Transcript Gateway v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let backends = connect_backends(&config, clock.clone()).await?;
    check_health(&backends).await;

    let transport = HttpTransport::new().context("Failed to create upstream HTTP client")?;
    health().upstream.set_healthy();

    let gateway = Gateway::new(
        config.gateway.clone(),
        GatewayDeps {
            store: backends.store.clone(),
            audit_sink: backends.audit_sink.clone(),
            transport: Arc::new(transport),
            clock,
        },
    )
    .context("Invalid gateway configuration")?;

    let state = AppState::new(
        Arc::new(gateway),
        config.license_url.as_str(),
        config.admin_token.clone(),
    )
    .context("Failed to create application state")?;

    if state.licenses.is_mock() {
        warn!("License service in mock mode: every well-formed key is accepted");
    }
    if state.admin_token.is_none() {
        info!("Admin API disabled (no admin token configured)");
    }

    let backends = Arc::new(backends);
    let _maintenance = start_maintenance_task(backends.clone());
    info!("Started maintenance task (every 5 minutes)");

    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid server address")?;

    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutdown complete");
    Ok(())
}

/// Load configuration from files and environment.
fn load_config() -> Result<AppConfig> {
    let config = config::Config::builder()
        // Start with defaults
        .add_source(config::Config::try_from(&AppConfig::default())?)
        // Load from config file if exists
        .add_source(
            config::File::with_name("config/default")
                .required(false)
                .format(config::FileFormat::Toml),
        )
        // Override with environment variables
        .add_source(
            config::Environment::default()
                .separator("__")
                .prefix("GATEWAY")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    let mut config: AppConfig = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    // Flat overrides for values that are awkward as nested env keys
    if let Ok(keys) = std::env::var("GATEWAY_TRANSCRIPTION_KEYS") {
        config.gateway.credentials.transcription = split_list(&keys);
    }
    if let Ok(key) = std::env::var("GATEWAY_AI_KEY") {
        config.gateway.credentials.ai = split_list(&key);
    }
    if let Ok(key) = std::env::var("GATEWAY_YOUTUBE_KEY") {
        config.gateway.credentials.youtube = split_list(&key);
    }
    if let Ok(url) = std::env::var("GATEWAY_REDIS_URL") {
        config.redis_url = Some(url).filter(|u| !u.trim().is_empty());
    }
    if let Ok(url) = std::env::var("GATEWAY_CLICKHOUSE_URL") {
        let clickhouse = config.clickhouse.get_or_insert_with(ClickHouseConfig::default);
        clickhouse.url = url;
        if let Ok(database) = std::env::var("GATEWAY_CLICKHOUSE_DATABASE") {
            clickhouse.database = database;
        }
        if let Ok(username) = std::env::var("GATEWAY_CLICKHOUSE_USERNAME") {
            clickhouse.username = Some(username);
        }
        if let Ok(password) = std::env::var("GATEWAY_CLICKHOUSE_PASSWORD") {
            clickhouse.password = Some(password);
        }
    }
    if let Ok(license_url) = std::env::var("GATEWAY_LICENSE_URL") {
        config.license_url = license_url;
    }
    if let Ok(token) = std::env::var("GATEWAY_ADMIN_TOKEN") {
        config.admin_token = Some(token);
    }

    info!(
        transcription_keys = config.gateway.credentials.transcription.len(),
        ai_keys = config.gateway.credentials.ai.len(),
        youtube_keys = config.gateway.credentials.youtube.len(),
        redis = config.redis_url.is_some(),
        clickhouse = config.clickhouse.is_some(),
        "Loaded configuration"
    );

    Ok(config)
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Connects the configured store and audit backends.
async fn connect_backends(config: &AppConfig, clock: Arc<dyn Clock>) -> Result<Backends> {
    let mut redis = None;
    let mut memory_store = None;
    let store: Arc<dyn KvStore> = match &config.redis_url {
        Some(url) => {
            let connected = RedisStore::connect(&RedisConfig::new(url.as_str()))
                .await
                .context("Failed to connect to Redis")?;
            redis = Some(connected.clone());
            Arc::new(connected)
        }
        None => {
            warn!("No Redis configured: rate limits and cache are per process");
            let memory = Arc::new(MemoryStore::new(clock));
            memory_store = Some(memory.clone());
            memory
        }
    };

    let mut clickhouse = None;
    let audit_sink: Arc<dyn AuditSink> = match &config.clickhouse {
        Some(ch_config) => {
            let client = ClickHouseClient::new(ch_config.clone())
                .context("Failed to create ClickHouse client")?;

            if ch_config.init_schema {
                if let Err(e) = clickhouse_client::health::init_schema(&client).await {
                    error!("Failed to initialize ClickHouse schema: {}", e);
                    // Continue anyway - schema might already exist
                }
            }

            clickhouse = Some(client.clone());
            Arc::new(ClickHouseAuditLog::new(client))
        }
        None => {
            warn!("No ClickHouse configured: audit log is kept in memory");
            Arc::new(MemoryAuditLog::new())
        }
    };

    Ok(Backends {
        store,
        audit_sink,
        redis,
        clickhouse,
        memory_store,
    })
}

/// Checks backend health and updates the registry.
async fn check_health(backends: &Backends) {
    let store_healthy = match &backends.redis {
        Some(redis) => redis_store::health::check_connection(redis).await,
        None => true,
    };
    if store_healthy {
        health().store.set_healthy();
        info!("Store connection: healthy");
    } else {
        health().store.set_unhealthy("Connection failed");
        error!("Store connection: unhealthy");
    }

    let audit_healthy = match &backends.clickhouse {
        Some(client) => clickhouse_client::health::check_connection(client).await,
        None => true,
    };
    if audit_healthy {
        health().audit.set_healthy();
        info!("Audit connection: healthy");
    } else {
        health().audit.set_unhealthy("Connection failed");
        error!("Audit connection: unhealthy");
    }
}

/// Periodically re-checks backends and sweeps expired in-memory entries.
fn start_maintenance_task(backends: Arc<Backends>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(MAINTENANCE_INTERVAL);
        // First tick completes immediately
        interval.tick().await;

        loop {
            interval.tick().await;

            if let Some(memory) = &backends.memory_store {
                let purged = memory.purge_expired();
                if purged > 0 {
                    info!(purged = purged, "Purged expired in-memory entries");
                }
            }

            check_health(&backends).await;
        }
    })
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}
