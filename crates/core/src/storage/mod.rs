//! Optional Postgres record of recommendation runs: one row per run, one row per recommended
//! send time.

pub mod lock;
pub mod recommendations;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

const MAX_CONNECTIONS: u32 = 5;

pub async fn connect(database_url: &str) -> anyhow::Result<sqlx::PgPool> {
    PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect(database_url)
        .await
        .context("connect DATABASE_URL failed")
}

/// Applies `migrations/` (runs and items tables).
pub async fn migrate(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("recommendation schema migration failed")
}
