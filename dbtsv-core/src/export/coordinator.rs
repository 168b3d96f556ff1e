//! Fan-out of table exports.

use super::exporter::TableExporter;
use crate::codec::LineCodec;
use crate::config::{ConnectionSettings, ExportConfig};
use crate::executor::QueryExecutor;
use crate::models::{ExportJob, ExportSummary};
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::sync::Arc;

/// Runs one export job per table with bounded concurrency.
///
/// At most `workers` jobs are in flight; the executor's own connection
/// ceiling applies underneath. A failed table is recorded in its summary
/// and never cancels the others.
#[derive(Debug, Clone)]
pub struct ExportCoordinator {
    exporter: TableExporter,
    workers: usize,
}

impl ExportCoordinator {
    pub fn new(
        executor: Arc<dyn QueryExecutor>,
        codec: Arc<LineCodec>,
        config: &ExportConfig,
        settings: &ConnectionSettings,
    ) -> Self {
        Self {
            exporter: TableExporter::new(executor, codec, config),
            workers: usize::try_from(settings.max_connections)
                .unwrap_or(1)
                .max(1),
        }
    }

    /// Builds the job list: one `<dir>/<table>.tsv` per table.
    pub fn plan(tables: &[String], dir: &Path) -> Vec<ExportJob> {
        tables.iter().map(|t| ExportJob::new(t.as_str(), dir)).collect()
    }

    /// Exports every table and waits for all of them.
    ///
    /// Summaries come back in the order of `tables`.
    pub async fn run(&self, tables: &[String], dir: &Path) -> Vec<ExportSummary> {
        let jobs = Self::plan(tables, dir);
        tracing::info!(
            "Exporting {} tables to {} with {} workers",
            jobs.len(),
            dir.display(),
            self.workers
        );

        let exports = jobs.into_iter().enumerate().map(|(index, job)| {
            let exporter = &self.exporter;
            async move {
                let summary = match exporter.export(&job).await {
                    Ok(summary) => summary,
                    Err(e) => {
                        tracing::error!("Export of '{}' failed: {}", job.table, e);
                        ExportSummary::failed(&job, &e)
                    }
                };
                (index, summary)
            }
        });

        let mut results: Vec<(usize, ExportSummary)> = stream::iter(exports)
            .buffer_unordered(self.workers)
            .collect()
            .await;
        results.sort_by_key(|(index, _)| *index);
        results.into_iter().map(|(_, summary)| summary).collect()
    }
}
