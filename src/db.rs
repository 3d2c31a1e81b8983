//! Connection pool setup and migrations.
//!
//! SQLite is the default backend and Postgres is supported through the same URL setting.

use crate::config::AppConfig;
use crate::errors::ServiceError;
use metrics::{counter, gauge};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

pub type DbPool = DatabaseConnection;

/// Pool settings, usually derived from [`AppConfig`].
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
    /// Every connection to an in-memory SQLite URL opens its own empty database.
    pub fn is_sqlite_memory(&self) -> bool {
        self.url.starts_with("sqlite")
            && (self.url.contains(":memory:") || self.url.contains("mode=memory"))
    }

    /// Pool bounds actually used; in-memory SQLite is pinned to one connection.
    pub fn pool_bounds(&self) -> (u32, u32) {
        if self.is_sqlite_memory() {
            (1, 1)
        } else {
            let max = self.max_connections.max(1);
            (self.min_connections.min(max), max)
        }
    }
}

/// Opens the pool described by `config`.
pub async fn establish_connection_with_config(config: &DbConfig) -> Result<DbPool, ServiceError> {
    let (min, max) = config.pool_bounds();
    if max != config.max_connections {
        warn!(
            requested = config.max_connections,
            used = max,
            "Pool size adjusted for the database URL"
        );
    }

    let mut opt = ConnectOptions::new(config.url.clone());
    opt.max_connections(max)
        .min_connections(min)
        .connect_timeout(config.connect_timeout)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .sqlx_logging(false);

    debug!(min, max, "Connecting to database");
    let pool = Database::connect(opt).await.map_err(|e| {
        error!(error = %e, "Database connection failed");
        counter!("drugstore_db_connection_failures_total", 1);
        ServiceError::DatabaseError(e)
    })?;

    gauge!("drugstore_db_max_connections", max as f64);
    info!(backend = ?pool.get_database_backend(), max, "Database pool ready");
    Ok(pool)
}

/// Opens the pool with the tuning of the application configuration.
pub async fn establish_connection_from_app_config(cfg: &AppConfig) -> Result<DbPool, ServiceError> {
    establish_connection_with_config(&DbConfig::from(cfg)).await
}

/// Applies every pending migration of the four services' tables.
pub async fn run_migrations(pool: &DbPool) -> Result<(), ServiceError> {
    let started = Instant::now();
    crate::migrator::Migrator::up(pool, None)
        .await
        .map_err(|e| {
            error!(error = %e, elapsed = ?started.elapsed(), "Database migrations failed");
            ServiceError::DatabaseError(e)
        })?;

    info!(elapsed = ?started.elapsed(), "Database migrations applied");
    Ok(())
}
