//! Post-load optimization: statistics refresh and fuzzy-search provisioning.
//!
//! Both operations run against data that is already committed; their failures
//! are reported to the operator but never undo the load.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::PgPool;
use tracing::{info, warn};

use crate::db::schema::validate_identifier;

/// Recompute planner statistics and reclaim dead space for a freshly loaded
/// table. Idempotent; row data is untouched.
pub async fn refresh_statistics(pool: &PgPool, table: &str) -> Result<()> {
    validate_identifier(table)?;

    // VACUUM cannot run inside a transaction block, so it goes through the
    // simple query protocol rather than a prepared statement.
    let sql = format!("VACUUM ANALYZE \"{}\"", table);
    sqlx::raw_sql(&sql)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to refresh statistics for \"{}\"", table))?;

    info!(table, "statistics refreshed");
    Ok(())
}

/// Trigram-similarity indexing capability of the target environment.
///
/// Modeled as a seam so the optimizer can degrade gracefully (skip index
/// creation with a warning) when the extension is not shipped with the
/// server, and so tests can exercise both paths without a cluster.
#[async_trait]
pub trait TrigramCapability: Send + Sync {
    /// Whether the environment can install trigram indexing at all.
    async fn is_available(&self) -> Result<bool>;

    /// Install the capability. Idempotent.
    async fn install(&self) -> Result<()>;
}

/// `pg_trgm`-backed implementation
pub struct PgTrigramCapability {
    pool: PgPool,
}

impl PgTrigramCapability {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TrigramCapability for PgTrigramCapability {
    async fn is_available(&self) -> Result<bool> {
        let available: Option<String> = sqlx::query_scalar(
            "SELECT name FROM pg_available_extensions WHERE name = 'pg_trgm'",
        )
        .fetch_optional(&self.pool)
        .await
        .context("Failed to query available extensions")?;

        Ok(available.is_some())
    }

    async fn install(&self) -> Result<()> {
        sqlx::query("CREATE EXTENSION IF NOT EXISTS pg_trgm")
            .execute(&self.pool)
            .await
            .context("Failed to install pg_trgm extension")?;
        Ok(())
    }
}

/// Columns that benefit from approximate matching: commune and street names.
const TRIGRAM_COLUMNS: &[&str] = &["nom_commune", "adresse_nom_voie"];

/// Provision fuzzy text search on the loaded table.
///
/// Installs the trigram extension and builds GIN trigram indexes on the
/// textual address columns. Returns `false` (after logging a warning) when
/// the environment lacks the capability; the core data stays fully usable.
pub async fn provision_fuzzy_search(
    pool: &PgPool,
    capability: &dyn TrigramCapability,
    table: &str,
) -> Result<bool> {
    validate_identifier(table)?;

    if !capability.is_available().await? {
        warn!(
            table,
            "trigram extension unavailable, skipping fuzzy-search indexes"
        );
        return Ok(false);
    }

    capability.install().await?;

    for column in TRIGRAM_COLUMNS {
        let sql = format!(
            "CREATE INDEX IF NOT EXISTS \"idx_{table}_{column}_trgm\" \
             ON \"{table}\" USING gin (\"{column}\" gin_trgm_ops)"
        );
        sqlx::query(&sql)
            .execute(pool)
            .await
            .with_context(|| format!("Failed to create trigram index on \"{}\"", column))?;
        info!(table, column, "trigram index ready");
    }

    Ok(true)
}
