pub mod tenant;

use hubsync_common::error::{HubsyncError, HubsyncResult};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Create a Postgres connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> HubsyncResult<PgPool> {
    tracing::info!("connecting to database");
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .map_err(|e| HubsyncError::Database(e.to_string()))
}
