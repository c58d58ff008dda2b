use crate::config::DatabaseConfig;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, migrate::Migrator};

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Open a connection pool to the customer database.
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    log::debug!(
        "connecting to database with up to {} connections",
        config.max_connections
    );
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.url)
        .await
}

/// Run database migrations.
///
/// Idempotent: migrations that have already been applied are skipped.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    log::info!("checking database migration state");

    MIGRATOR.run(pool).await?;

    log::info!("database migrations up to date");
    Ok(())
}
