use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;

use crate::config::DatabaseConfig;

pub type DbPool = Pool<Postgres>;

pub async fn create_pool(db_config: &DatabaseConfig) -> Result<DbPool> {
    let pool = PgPoolOptions::new()
        .max_connections(db_config.max_connections)
        .acquire_timeout(Duration::from_secs(db_config.acquire_timeout_secs))
        .connect(&db_config.url)
        .await
        .context("Failed to connect to database")?;
    Ok(pool)
}

/// Apply the embedded `accounts` / `tokens` migrations
pub async fn migrate(pool: &DbPool) -> Result<()> {
    sqlx::migrate!()
        .run(pool)
        .await
        .context("Failed to apply database migrations")?;
    Ok(())
}
