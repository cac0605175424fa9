//! High-level runner API for the DVF loader.
//!
//! This module provides a simplified public interface that encapsulates the
//! internal setup of connections, record sources and the COPY driver.
//!
//! This is the primary API for external users and for the CLI.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use derive_builder::Builder;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info};
use uuid::Uuid;

use crate::db;
pub use crate::db::ConnectSettings;
use crate::formats::DelimitedConfig;
use crate::ingest::BulkLoader;
use crate::optimize::{self, PgTrigramCapability};

/// Arguments for running a load operation
#[derive(Debug, Clone, Builder)]
pub struct LoadArgs {
    /// Path to the DVF CSV export
    #[builder(setter(into))]
    pub source: PathBuf,

    /// Destination table name
    #[builder(setter(into))]
    pub table: String,

    pub connect: ConnectSettings,

    /// Create the destination table from the declared schema if missing
    #[builder(default = "true")]
    pub create_table_if_missing: bool,

    /// Suppress the progress bar
    #[builder(default = "false")]
    pub quiet: bool,
}

/// Result of a completed load operation
#[derive(Debug)]
pub struct LoadOutcome {
    pub job_id: String,
    pub rows_loaded: u64,
    pub bytes_sent: u64,
    pub duration: Duration,
    /// False when the post-load statistics refresh failed; the data is
    /// committed either way, merely with stale planner statistics.
    pub statistics_refreshed: bool,
}

/// Run a complete load: bulk COPY followed, unconditionally, by the
/// statistics refresh. The two phases never interleave.
pub async fn run_load(args: LoadArgs) -> Result<LoadOutcome> {
    let job_id = Uuid::new_v4().to_string();
    info!(job_id = %job_id, source = %args.source.display(), table = %args.table, "starting load job");

    let pool = db::connect(&args.connect).await?;
    db::wait_until_ready(&pool).await?;
    db::pool::log_server_version(&pool).await;

    let loader = BulkLoader::new(db::mutations_schema(), DelimitedConfig::default());

    if args.create_table_if_missing {
        loader.ensure_table(&pool, &args.table).await?;
    }

    let progress = if args.quiet {
        None
    } else {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({percent}%) | {bytes_per_sec}")
                .expect("static progress template")
                .progress_chars("=>-"),
        );
        Some(bar)
    };

    let summary = loader
        .load_file(&pool, &args.table, &args.source, progress.as_ref())
        .await?;

    if let Some(bar) = progress {
        bar.finish();
    }
    info!(job_id = %job_id, rows = summary.rows_loaded, "phase complete: data loaded");

    // Optimizer failure leaves the committed data usable with stale
    // statistics; report it instead of failing the job.
    let statistics_refreshed = match optimize::refresh_statistics(&pool, &args.table).await {
        Ok(()) => {
            info!(job_id = %job_id, "phase complete: table ready for queries");
            true
        }
        Err(e) => {
            error!(job_id = %job_id, error = %format!("{:#}", e), "statistics refresh failed; data loaded, stats stale");
            false
        }
    };

    Ok(LoadOutcome {
        job_id,
        rows_loaded: summary.rows_loaded,
        bytes_sent: summary.bytes_sent,
        duration: summary.duration,
        statistics_refreshed,
    })
}

/// Re-run the statistics refresh on an already loaded table.
pub async fn run_optimize(connect: &ConnectSettings, table: &str) -> Result<()> {
    let pool = db::connect(connect).await?;
    db::wait_until_ready(&pool).await?;
    optimize::refresh_statistics(&pool, table).await
}

/// One-time environment setup: install the trigram extension and build
/// fuzzy-search indexes. Returns false when the capability is unavailable.
pub async fn run_provision(connect: &ConnectSettings, table: &str) -> Result<bool> {
    let pool = db::connect(connect).await?;
    db::wait_until_ready(&pool).await?;

    let capability = PgTrigramCapability::new(pool.clone());
    optimize::provision_fuzzy_search(&pool, &capability, table).await
}
