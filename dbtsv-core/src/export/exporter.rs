//! Streams one table into one file.

use super::row_reader::RowReader;
use crate::Result;
use crate::codec::LineCodec;
use crate::config::ExportConfig;
use crate::error::DbTsvError;
use crate::executor::QueryExecutor;
use crate::models::{ExportJob, ExportSummary, TableOutcome};
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};

/// Writes a table as a header line followed by one encoded line per row.
///
/// The file is created (or truncated) before the table is queried. Rows
/// that cannot be converted are logged and left out; any other failure
/// abandons this table only.
#[derive(Clone)]
pub struct TableExporter {
    executor: Arc<dyn QueryExecutor>,
    codec: Arc<LineCodec>,
    flush_every: usize,
}

impl std::fmt::Debug for TableExporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableExporter")
            .field("dialect", &self.executor.dialect())
            .field("flush_every", &self.flush_every)
            .finish_non_exhaustive()
    }
}

impl TableExporter {
    pub fn new(
        executor: Arc<dyn QueryExecutor>,
        codec: Arc<LineCodec>,
        config: &ExportConfig,
    ) -> Self {
        Self {
            executor,
            codec,
            flush_every: config.flush_every.max(1),
        }
    }

    /// Exports `job.table` into `job.destination`.
    ///
    /// # Errors
    /// `TableIo` when the file cannot be created or written, `Query` when
    /// the table cannot be read.
    pub async fn export(&self, job: &ExportJob) -> Result<ExportSummary> {
        let table = job.table.as_str();
        let io_error = |e| DbTsvError::table_io(table, &job.destination, e);

        let file = File::create(&job.destination).await.map_err(io_error)?;
        let mut writer = BufWriter::new(file);

        let sql = self.executor.dialect().select_all(table);
        let cursor = self
            .executor
            .scan(&sql)
            .await
            .map_err(|e| e.for_table(table))?;
        let mut reader = RowReader::new(table, cursor);
        tracing::debug!("Exporting '{}' ({} columns)", table, reader.columns().len());

        write_line(&mut writer, &self.codec.header(reader.columns()))
            .await
            .map_err(io_error)?;

        let mut rows_written: u64 = 0;
        let mut rows_skipped: u64 = 0;
        let mut since_flush: usize = 0;

        while let Some(item) = reader.next_row().await {
            let values = match item {
                Ok(values) => values,
                Err(e @ DbTsvError::RowDecode { .. }) => {
                    tracing::warn!("{}", e);
                    rows_skipped = rows_skipped.saturating_add(1);
                    continue;
                }
                Err(e) => return Err(e),
            };

            write_line(&mut writer, &self.codec.encode(&values))
                .await
                .map_err(io_error)?;
            rows_written = rows_written.saturating_add(1);
            since_flush = since_flush.saturating_add(1);

            if since_flush >= self.flush_every {
                writer.flush().await.map_err(io_error)?;
                since_flush = 0;
            }
        }

        writer.flush().await.map_err(io_error)?;

        tracing::info!(
            "Exported '{}' to {}: {} rows written, {} skipped",
            table,
            job.destination.display(),
            rows_written,
            rows_skipped
        );

        Ok(ExportSummary {
            table: job.table.clone(),
            path: job.destination.clone(),
            rows_written,
            rows_skipped,
            outcome: TableOutcome::Completed,
        })
    }
}

async fn write_line(writer: &mut BufWriter<File>, line: &str) -> std::io::Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await
}
