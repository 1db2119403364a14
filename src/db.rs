use crate::config::AppConfig;
use crate::errors::ServiceError;
use metrics::{counter, gauge};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

pub type DbPool = DatabaseConnection;

/// Pool sizing and timeouts for the order store
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
    pub acquire_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            acquire_timeout: Duration::from_secs(8),
        }
    }
}

impl From<&AppConfig> for DbConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            url: cfg.database_url.clone(),
            max_connections: cfg.db_max_connections,
            min_connections: cfg.db_min_connections,
            connect_timeout: Duration::from_secs(cfg.db_connect_timeout_secs),
            idle_timeout: Duration::from_secs(cfg.db_idle_timeout_secs),
            acquire_timeout: Duration::from_secs(cfg.db_acquire_timeout_secs),
        }
    }
}

impl DbConfig {
    /// Every connection to `sqlite::memory:` opens its own empty database.
    fn is_in_memory_sqlite(&self) -> bool {
        self.url.starts_with("sqlite:") && self.url.contains(":memory:")
    }

    fn backend(&self) -> &'static str {
        if self.url.starts_with("postgres") {
            "postgres"
        } else if self.url.starts_with("sqlite") {
            "sqlite"
        } else {
            "unknown"
        }
    }

    /// Pool bounds actually used: in-memory SQLite is pinned to a single
    /// long-lived connection, and the minimum never exceeds the maximum.
    fn pool_bounds(&self) -> (u32, u32) {
        if self.is_in_memory_sqlite() {
            return (1, 1);
        }
        let max = self.max_connections.max(1);
        (self.min_connections.min(max), max)
    }
}

/// Opens the order store pool.
///
/// # Errors
/// Returns `ServiceError::DatabaseError` when the database is unreachable.
pub async fn establish_connection_with_config(config: &DbConfig) -> Result<DbPool, ServiceError> {
    let (min, max) = config.pool_bounds();
    if max != config.max_connections {
        warn!(
            requested = config.max_connections,
            effective = max,
            "Adjusted order store pool size"
        );
    }

    let mut opt = ConnectOptions::new(config.url.clone());
    opt.max_connections(max)
        .min_connections(min)
        .connect_timeout(config.connect_timeout)
        .acquire_timeout(config.acquire_timeout)
        .sqlx_logging(false);
    if !config.is_in_memory_sqlite() {
        opt.idle_timeout(config.idle_timeout);
    }

    gauge!("storefront_db.max_connections", max as f64);
    debug!(backend = config.backend(), min, max, "Connecting to order store");

    let db_pool = Database::connect(opt).await.map_err(|e| {
        error!(error = %e, backend = config.backend(), "Could not connect to order store");
        ServiceError::DatabaseError(e)
    })?;

    info!(backend = config.backend(), max_connections = max, "Order store connected");
    Ok(db_pool)
}

pub async fn establish_connection_from_app_config(cfg: &AppConfig) -> Result<DbPool, ServiceError> {
    establish_connection_with_config(&DbConfig::from(cfg)).await
}

/// Applies pending schema migrations.
pub async fn run_migrations(pool: &DbPool) -> Result<(), ServiceError> {
    let start = Instant::now();
    match crate::migrator::Migrator::up(pool, None).await {
        Ok(()) => {
            info!(elapsed_ms = start.elapsed().as_millis() as u64, "Order schema up to date");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Order schema migration failed");
            Err(ServiceError::DatabaseError(e))
        }
    }
}

/// Round-trips a ping; used by the health endpoint.
pub async fn check_connection(pool: &DbPool) -> Result<(), ServiceError> {
    pool.ping().await.map_err(|e| {
        counter!("storefront_db.connection_failures", 1);
        error!(error = %e, "Order store ping failed");
        ServiceError::DatabaseError(e)
    })
}
