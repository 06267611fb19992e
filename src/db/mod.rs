// backend/src/db/mod.rs

use sqlx::{Pool, Postgres};

use crate::config::AppConfig;

pub async fn connect(config: &AppConfig) -> anyhow::Result<Pool<Postgres>> {
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await?;

    tracing::info!(max_connections = config.db_max_connections, "connected to PostgreSQL");
    Ok(pool)
}
