//! Streaming bulk-copy driver.
//!
//! Reads the source file once, front to back, encoding records into bounded
//! COPY buffers and flushing them to the server inside a single transaction.
//! Any ingress error aborts the COPY and rolls the transaction back, so an
//! interrupted or invalid load leaves zero rows behind.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use indicatif::ProgressBar;
use sqlx::postgres::PgPool;
use sqlx::{Postgres, Transaction};
use tracing::{error, info, warn};

use super::encoder::CopyEncoder;
use crate::config::{COPY_BUFFER_SIZE, PROGRESS_UPDATE_ROWS};
use crate::db::schema::{validate_identifier, TableSchema};
use crate::formats::{DelimitedConfig, RecordSource};

/// Outcome of a successful bulk load
#[derive(Debug)]
pub struct LoadSummary {
    pub rows_loaded: u64,
    pub bytes_sent: u64,
    pub duration: Duration,
}

pub struct BulkLoader {
    schema: TableSchema,
    format: DelimitedConfig,
}

impl BulkLoader {
    pub fn new(schema: TableSchema, format: DelimitedConfig) -> Self {
        Self { schema, format }
    }

    /// Create the destination table from the declared schema if it is absent.
    pub async fn ensure_table(&self, pool: &PgPool, table: &str) -> Result<()> {
        validate_identifier(table)?;
        let ddl = self.schema.create_table_ddl(table);
        sqlx::query(&ddl)
            .execute(pool)
            .await
            .with_context(|| format!("Failed to create table \"{}\"", table))?;
        info!(table, "destination table ready");
        Ok(())
    }

    /// Stream the file into the table as one atomic COPY.
    ///
    /// On success the table contains exactly one row per data row of the
    /// file, in file order. On any failure nothing is committed.
    pub async fn load_file(
        &self,
        pool: &PgPool,
        table: &str,
        path: &Path,
        progress: Option<&ProgressBar>,
    ) -> Result<LoadSummary> {
        validate_identifier(table)?;
        let started = Instant::now();

        let file = File::open(path)
            .with_context(|| format!("Failed to open source file {}", path.display()))?;
        let file_size = file.metadata().map(|m| m.len()).unwrap_or(0);
        if let Some(pb) = progress {
            pb.set_length(file_size);
        }

        let mut source = RecordSource::new(BufReader::new(file), &self.format);

        if self.format.has_header {
            let header = source.read_header()?;
            self.schema.validate_header(header.iter())?;
        }

        let statement = self.schema.copy_statement(table);

        let mut tx = pool
            .begin()
            .await
            .context("Failed to open load transaction")?;

        match self.stream_into(&mut tx, &statement, &mut source, progress).await {
            Ok((rows_loaded, bytes_sent)) => {
                tx.commit().await.context("Failed to commit load")?;
                let duration = started.elapsed();
                info!(
                    table,
                    rows_loaded,
                    bytes_sent,
                    secs = duration.as_secs_f64(),
                    "load committed"
                );
                Ok(LoadSummary {
                    rows_loaded,
                    bytes_sent,
                    duration,
                })
            }
            Err(e) => {
                // COPY already aborted; rolling back discards anything staged.
                let _ = tx.rollback().await;
                Err(e)
            }
        }
    }

    async fn stream_into<R: std::io::Read>(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        statement: &str,
        source: &mut RecordSource<R>,
        progress: Option<&ProgressBar>,
    ) -> Result<(u64, u64)> {
        let encoder = CopyEncoder::new(&self.schema, &self.format.null_token);

        let mut copy = tx
            .copy_in_raw(statement)
            .await
            .context("Failed to start COPY stream")?;

        let mut buffer = String::with_capacity(COPY_BUFFER_SIZE + 4096);
        let mut rows = 0u64;
        let mut bytes_sent = 0u64;

        loop {
            let (line, record) = match source.next_record() {
                Ok(Some(next)) => next,
                Ok(None) => break,
                Err(e) => {
                    error!(line = e.line().unwrap_or(0), "aborting load: {}", e);
                    let _ = copy.abort(e.to_string()).await;
                    return Err(e.into());
                }
            };

            if let Err(e) = encoder.encode_record(line, &record, &mut buffer) {
                error!(line = e.line().unwrap_or(0), "aborting load: {}", e);
                let _ = copy.abort(e.to_string()).await;
                return Err(e.into());
            }
            rows += 1;

            if buffer.len() >= COPY_BUFFER_SIZE {
                bytes_sent += buffer.len() as u64;
                copy.send(buffer.as_bytes())
                    .await
                    .context("Failed to send COPY data")?;
                buffer.clear();
            }

            if rows % PROGRESS_UPDATE_ROWS == 0 {
                if let Some(pb) = progress {
                    pb.set_position(source.byte_offset());
                }
            }
        }

        if !buffer.is_empty() {
            bytes_sent += buffer.len() as u64;
            copy.send(buffer.as_bytes())
                .await
                .context("Failed to send COPY data")?;
        }

        let reported = copy
            .finish()
            .await
            .context("Failed to finish COPY stream")?;

        if reported != rows {
            warn!(sent = rows, reported, "server row count differs from rows sent");
        }
        if let Some(pb) = progress {
            pb.set_position(source.byte_offset());
        }

        Ok((rows, bytes_sent))
    }
}
