//! `PostgreSQL` connection pool provider.
//!
//! [`connect`] builds a pool from [`DatabaseConfig`] and pings it before
//! returning, so an unreachable database fails startup instead of the first
//! request. [`run_migrations`] applies the embedded schema.

use std::str::FromStr;
use std::time::Duration;

use sqlx::migrate::Migrator;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use tracing::info;

use super::config::DatabaseConfig;

/// How long startup waits for the first successful ping.
pub const PING_TIMEOUT: Duration = Duration::from_secs(10);

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Startup-time database failures. All of them are fatal to the process.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("database address does not form a URL: {0}")]
    Address(#[from] url::ParseError),
    #[error("invalid database connection settings: {0}")]
    Config(#[source] sqlx::Error),
    #[error("failed to create connection pool: {0}")]
    Connect(#[source] sqlx::Error),
    #[error("failed to ping database: {0}")]
    Ping(#[source] sqlx::Error),
    #[error("database did not answer a ping within {0:?}")]
    PingTimeout(Duration),
    #[error("failed to run migrations: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Creates the pool and verifies connectivity.
///
/// # Errors
///
/// Returns [`DatabaseError`] when the DSN is malformed, no connection can be
/// opened, or the ping does not succeed within [`PING_TIMEOUT`].
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, DatabaseError> {
    let options = PgConnectOptions::from_str(&config.dsn()?).map_err(DatabaseError::Config)?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_open_conns)
        .min_connections(config.min_idle_conns)
        .max_lifetime(config.conn_max_lifetime())
        .idle_timeout(config.conn_max_idletime())
        .acquire_timeout(PING_TIMEOUT)
        .connect_lazy_with(options);

    match tokio::time::timeout(PING_TIMEOUT, sqlx::query("SELECT 1").execute(&pool)).await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => {
            pool.close().await;
            return Err(match e {
                sqlx::Error::PoolTimedOut => DatabaseError::Connect(e),
                other => DatabaseError::Ping(other),
            });
        }
        Err(_elapsed) => {
            pool.close().await;
            return Err(DatabaseError::PingTimeout(PING_TIMEOUT));
        }
    }

    info!(dsn = %config.redacted_dsn(), "connected to the database");
    Ok(pool)
}

/// Applies pending migrations from `migrations/`.
///
/// # Errors
///
/// Returns [`DatabaseError::Migrate`] when a migration fails or the applied
/// history diverges from the embedded one.
pub async fn run_migrations(pool: &PgPool) -> Result<(), DatabaseError> {
    MIGRATOR.run(pool).await?;
    info!("database migrations applied");
    Ok(())
}
