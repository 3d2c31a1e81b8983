//! Entry points of the `migration` binary.

use anyhow::{Context, Result};
use sea_orm_migration::MigratorTrait;
use tracing::info;

use crate::db::{self, DbConfig, DbPool};

pub use migrations::Migrator;

async fn connect(db_url: &str) -> Result<DbPool> {
    let config = DbConfig {
        url: db_url.to_string(),
        max_connections: 2,
        ..Default::default()
    };
    db::establish_connection_with_config(&config)
        .await
        .context("failed to connect for migrations")
}

/// Applies every pending migration; returns how many were applied.
pub async fn run_migration(db_url: &str) -> Result<usize> {
    let pool = connect(db_url).await?;
    let pending = Migrator::get_pending_migrations(&pool).await?.len();
    info!(pending, "Applying migrations");

    db::run_migrations(&pool).await?;
    Ok(pending)
}

/// Rolls back the last `steps` migrations.
pub async fn rollback_migration(db_url: &str, steps: u32) -> Result<()> {
    let pool = connect(db_url).await?;
    info!(steps, "Rolling back migrations");
    Migrator::down(&pool, Some(steps)).await?;
    Ok(())
}
