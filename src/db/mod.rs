// ============================================================================
// Database Bootstrap - URL normalization, pool, schema
// ============================================================================

mod schema;
mod url;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

use crate::config::DatabaseSettings;

pub use self::schema::ensure_schema;
pub use self::url::{normalize_database_url, redact, DatabaseUrlOptions};

/// Open a pool for the configured database and make sure the tables exist.
pub async fn connect(settings: &DatabaseSettings) -> anyhow::Result<PgPool> {
    let url = normalize_database_url(&settings.url, &settings.url_options)?;
    tracing::info!(
        url = %redact(&url),
        max_connections = settings.max_connections,
        "Connecting to PostgreSQL"
    );

    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(url.as_str())
        .await?;

    ensure_schema(&pool).await?;
    Ok(pool)
}
