//! Sequential restore of a directory of table files.

use super::inserter::{BatchInserter, ValueFormatter};
use crate::Result;
use crate::codec::{TsvReader, header_names};
use crate::config::RestoreConfig;
use crate::error::DbTsvError;
use crate::executor::QueryExecutor;
use crate::models::{RestoreJob, RestoreSummary, TABLE_FILE_EXTENSION};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;

/// Lists the `*.tsv` files of a directory in lexical order.
///
/// # Errors
/// Returns a configuration error when the directory cannot be read
pub async fn discover_table_files(dir: &Path) -> Result<Vec<RestoreJob>> {
    let unreadable = |e: std::io::Error| {
        DbTsvError::configuration(format!(
            "Cannot read restore directory {}: {}",
            dir.display(),
            e
        ))
    };

    let mut entries = tokio::fs::read_dir(dir).await.map_err(unreadable)?;
    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(unreadable)? {
        let path = entry.path();
        let is_table_file = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == TABLE_FILE_EXTENSION);
        let is_file = entry.file_type().await.is_ok_and(|t| t.is_file());
        if is_table_file && is_file {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths.into_iter().filter_map(RestoreJob::from_path).collect())
}

/// Restores table files one after another on a single session.
///
/// Referential integrity is suspended once before the first table and
/// re-enabled exactly once after the last attempted table, whether the
/// loop finished, returned early or panicked.
pub struct RestoreCoordinator {
    executor: Arc<dyn QueryExecutor>,
    formatter: ValueFormatter,
    config: RestoreConfig,
}

impl RestoreCoordinator {
    /// # Errors
    /// Returns error if the configuration is invalid
    pub fn new(executor: Arc<dyn QueryExecutor>, config: RestoreConfig) -> Result<Self> {
        config.validate()?;
        let formatter = ValueFormatter::new(executor.dialect())?;
        Ok(Self {
            executor,
            formatter,
            config,
        })
    }

    /// Restores every table file in `dir`.
    ///
    /// # Errors
    /// Returns error if the directory cannot be read, integrity checks
    /// cannot be toggled or a run-fatal error stops the loop
    pub async fn run(&self, dir: &Path) -> Result<Vec<RestoreSummary>> {
        let jobs = discover_table_files(dir).await?;
        if jobs.is_empty() {
            tracing::warn!("No .{} files found in {}", TABLE_FILE_EXTENSION, dir.display());
        }
        self.restore(&jobs).await
    }

    /// Restores the given jobs in order inside one integrity bracket.
    ///
    /// # Errors
    /// See [`RestoreCoordinator::run`]
    pub async fn restore(&self, jobs: &[RestoreJob]) -> Result<Vec<RestoreSummary>> {
        let dialect = self.executor.dialect();
        self.executor
            .execute(dialect.disable_constraints())
            .await
            .inspect_err(|e| tracing::error!("Suspending integrity checks failed: {}", e))?;
        tracing::info!("Referential integrity checks suspended");

        let outcome = AssertUnwindSafe(self.restore_all(jobs)).catch_unwind().await;

        let enabled = self.executor.execute(dialect.enable_constraints()).await;
        match &enabled {
            Ok(_) => tracing::info!("Referential integrity checks re-enabled"),
            Err(e) => tracing::error!("Re-enabling integrity checks failed: {}", e),
        }

        let summaries = match outcome {
            Ok(result) => result?,
            Err(panic) => std::panic::resume_unwind(panic),
        };
        enabled?;
        Ok(summaries)
    }

    async fn restore_all(&self, jobs: &[RestoreJob]) -> Result<Vec<RestoreSummary>> {
        let mut summaries = Vec::with_capacity(jobs.len());
        for job in jobs {
            tracing::info!("Restoring '{}' from {}", job.table, job.source.display());
            match self.restore_table(job).await {
                Ok(summary) => summaries.push(summary),
                Err(e) if e.is_fatal() => {
                    tracing::error!("Restore stopped at '{}': {}", job.table, e);
                    return Err(e);
                }
                Err(e) => {
                    tracing::error!("Restore of '{}' failed: {}", job.table, e);
                    summaries.push(RestoreSummary::new(job).fail(&e));
                }
            }
        }
        Ok(summaries)
    }

    /// Reads the header, resolves columns, clears the table and inserts.
    ///
    /// The live schema is resolved before the table is cleared, so a file
    /// that matches nothing leaves the table untouched.
    async fn restore_table(&self, job: &RestoreJob) -> Result<RestoreSummary> {
        let table = job.table.as_str();
        let io_error = |e| DbTsvError::table_io(table, &job.source, e);

        let mut reader = TsvReader::open(&job.source).await.map_err(io_error)?;
        let header = reader
            .next_record()
            .await
            .map_err(io_error)?
            .map(header_names);

        let mut inserter = BatchInserter::new(
            self.executor.as_ref(),
            &self.formatter,
            job,
            self.config.batch_size,
        );
        if let Some(header) = &header {
            inserter.begin(header).await?;
        }

        if self.config.clear_tables {
            let sql = self.executor.dialect().delete_all(table);
            self.executor
                .execute(&sql)
                .await
                .map_err(|e| e.for_table(table))?;
        }

        if header.is_none() {
            tracing::warn!("{} is empty; table '{}' left empty", job.source.display(), table);
            return Ok(inserter.finish().await);
        }

        loop {
            match reader.next_record().await {
                Ok(Some(record)) => inserter.push(&record, reader.line_number()).await?,
                Ok(None) => break,
                Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                    inserter.skip(DbTsvError::row_decode(
                        table,
                        reader.line_number(),
                        e.to_string(),
                    ));
                }
                Err(e) => {
                    let error = io_error(e);
                    tracing::error!("{}", error);
                    return Ok(inserter.finish().await.fail(&error));
                }
            }
        }

        Ok(inserter.finish().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_discover_table_files_in_lexical_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.tsv", "a.tsv", "notes.txt", "c.TSV"] {
            tokio::fs::write(dir.path().join(name), "id\n").await.unwrap();
        }
        tokio::fs::create_dir(dir.path().join("nested.tsv")).await.unwrap();

        let jobs = discover_table_files(dir.path()).await.unwrap();
        let tables: Vec<_> = jobs.iter().map(|j| j.table.as_str()).collect();
        assert_eq!(tables, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = discover_table_files(&dir.path().join("missing")).await;
        assert!(result.unwrap_err().is_fatal());
    }
}
