//! Connection pool setup and database readiness probing.

use anyhow::{Context, Result};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use tracing::{debug, info, warn};

use crate::config::{CONNECT_TIMEOUT, MAX_POOL_SIZE, READY_PROBE_ATTEMPTS, READY_PROBE_DELAY};

/// Connection settings, typically wired from `PG*` environment variables by
/// the CLI layer.
#[derive(Debug, Clone)]
pub struct ConnectSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
}

/// Create a connection pool for the loader.
///
/// The pool is intentionally small: the pipeline is a single sequential
/// writer, and only setup/optimization statements need a second connection.
pub async fn connect(settings: &ConnectSettings) -> Result<PgPool> {
    let options = PgConnectOptions::new()
        .host(&settings.host)
        .port(settings.port)
        .username(&settings.username)
        .password(&settings.password)
        .database(&settings.database);

    let pool = PgPoolOptions::new()
        .max_connections(MAX_POOL_SIZE)
        .acquire_timeout(CONNECT_TIMEOUT)
        .connect_with(options)
        .await
        .with_context(|| {
            format!(
                "Failed to connect to postgres://{}@{}:{}/{}",
                settings.username, settings.host, settings.port, settings.database
            )
        })?;

    Ok(pool)
}

/// Wait until the database answers trivial queries.
///
/// A freshly provisioned container accepts TCP connections before it is
/// ready to serve queries, so the load must not start until this succeeds.
pub async fn wait_until_ready(pool: &PgPool) -> Result<()> {
    for attempt in 1..=READY_PROBE_ATTEMPTS {
        match sqlx::query("SELECT 1").execute(pool).await {
            Ok(_) => {
                debug!(attempt, "database ready");
                return Ok(());
            }
            Err(e) if attempt < READY_PROBE_ATTEMPTS => {
                warn!(attempt, error = %e, "database not ready, retrying");
                tokio::time::sleep(READY_PROBE_DELAY).await;
            }
            Err(e) => {
                return Err(e).context(format!(
                    "Database not ready after {} attempts",
                    READY_PROBE_ATTEMPTS
                ));
            }
        }
    }

    unreachable!("Probe loop always returns");
}

/// Log the server version once per session, useful in operator reports.
pub async fn log_server_version(pool: &PgPool) {
    if let Ok(row) = sqlx::query_scalar::<_, String>("SHOW server_version")
        .fetch_one(pool)
        .await
    {
        info!(server_version = %row, "connected");
    }
}
