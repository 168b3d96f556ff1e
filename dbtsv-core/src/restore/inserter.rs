//! Batched multi-row INSERTs for one table.

use super::resolver::{ColumnTypeResolver, partition_columns};
use crate::Result;
use crate::codec::{is_null_token, unescape};
use crate::dialect::Dialect;
use crate::error::DbTsvError;
use crate::executor::QueryExecutor;
use crate::models::{ColumnClass, RestoreJob, RestoreSummary};
use regex::Regex;

/// Plain decimal or scientific numeric literal, ASCII digits only.
const NUMERIC_LITERAL: &str = r"^[+-]?(?:[0-9]+(?:\.[0-9]*)?|\.[0-9]+)(?:[eE][+-]?[0-9]+)?$";

/// Turns file tokens into SQL value literals.
///
/// The null sentinel becomes the dialect's NULL literal regardless of the
/// column class. Numeric columns are written unquoted when the value is a
/// numeric literal and quoted otherwise, so no file content is ever
/// spliced into a statement raw. Values that are not valid UTF-8 are
/// written as the dialect's binary literal.
#[derive(Debug, Clone)]
pub struct ValueFormatter {
    dialect: Dialect,
    numeric_literal: Regex,
}

impl ValueFormatter {
    /// # Errors
    /// Fails only if the numeric literal pattern does not compile.
    pub fn new(dialect: Dialect) -> Result<Self> {
        let numeric_literal = Regex::new(NUMERIC_LITERAL).map_err(|e| {
            DbTsvError::configuration(format!("Invalid numeric literal pattern: {}", e))
        })?;
        Ok(Self {
            dialect,
            numeric_literal,
        })
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Formats one raw (still escaped) file token.
    pub fn format(&self, token: &str, class: ColumnClass) -> String {
        if is_null_token(token) {
            return self.dialect.null_literal().to_string();
        }
        let value = match String::from_utf8(unescape(token)) {
            Ok(value) => value,
            Err(e) => return self.dialect.binary_literal(e.as_bytes()),
        };
        match class {
            ColumnClass::Numeric if self.numeric_literal.is_match(&value) => value,
            _ => self.dialect.quote_literal(&value),
        }
    }
}

/// Lifecycle of a [`BatchInserter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InserterState {
    /// No tuples pending
    Empty,
    /// Tuples pending, batch not yet full
    Accumulating,
    /// A full batch is being executed
    Flushing,
    /// End of file reached; the last partial batch is flushed
    Draining,
}

#[derive(Debug)]
struct InsertPlan {
    prefix: String,
    columns: Vec<(usize, ColumnClass)>,
    width: usize,
}

/// Accumulates value tuples and executes them as multi-row INSERTs.
///
/// The header record fixes the INSERT prefix and per-column formatting
/// once; every later record becomes one tuple. A full batch is executed
/// as a single statement and cleared. A failing batch is logged and its
/// rows are counted as lost; nothing is retried or rolled back.
pub struct BatchInserter<'a> {
    executor: &'a dyn QueryExecutor,
    formatter: &'a ValueFormatter,
    table: String,
    batch_size: usize,
    plan: Option<InsertPlan>,
    batch: Vec<String>,
    state: InserterState,
    summary: RestoreSummary,
}

impl<'a> BatchInserter<'a> {
    pub fn new(
        executor: &'a dyn QueryExecutor,
        formatter: &'a ValueFormatter,
        job: &RestoreJob,
        batch_size: usize,
    ) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            executor,
            formatter,
            table: job.table.clone(),
            batch_size,
            plan: None,
            batch: Vec::with_capacity(batch_size),
            state: InserterState::Empty,
            summary: RestoreSummary::new(job),
        }
    }

    pub fn state(&self) -> InserterState {
        self.state
    }

    /// Tuples waiting for the next flush.
    pub fn pending(&self) -> usize {
        self.batch.len()
    }

    /// Resolves the INSERT prefix and column formatting from the header.
    ///
    /// # Errors
    /// A `Query` error when the live schema cannot be read or shares no
    /// column with the file.
    pub async fn begin(&mut self, header: &[String]) -> Result<()> {
        let types = ColumnTypeResolver::new(self.executor)
            .classify(&self.table, header)
            .await?;
        let (columns, dropped) = partition_columns(header, &types);

        if columns.is_empty() {
            return Err(DbTsvError::query(
                &self.table,
                "None of the file's columns exist in the live table",
            ));
        }
        if !dropped.is_empty() {
            tracing::warn!(
                "Table '{}': file columns not in the live schema are left out: {}",
                self.table,
                dropped.join(", ")
            );
        }

        let names: Vec<&str> = columns
            .iter()
            .filter_map(|(index, _)| header.get(*index).map(String::as_str))
            .collect();
        let prefix = self.formatter.dialect().insert_prefix(&self.table, &names);

        self.plan = Some(InsertPlan {
            prefix,
            columns,
            width: header.len(),
        });
        self.summary.dropped_columns = dropped;
        Ok(())
    }

    /// Appends one record, executing the batch when it is full.
    ///
    /// A record with the wrong number of fields is logged and skipped.
    ///
    /// # Errors
    /// Only when called before [`BatchInserter::begin`].
    pub async fn push(&mut self, record: &[String], line: u64) -> Result<()> {
        let Some(plan) = &self.plan else {
            return Err(DbTsvError::query(
                &self.table,
                "Record received before the header was resolved",
            ));
        };

        if record.len() != plan.width {
            let reason = format!(
                "expected {} fields, found {}",
                plan.width,
                record.len()
            );
            self.skip(DbTsvError::row_decode(&self.table, line, reason));
            return Ok(());
        }

        let values: Vec<String> = plan
            .columns
            .iter()
            .map(|(index, class)| match record.get(*index) {
                Some(token) => self.formatter.format(token, *class),
                None => self.formatter.dialect().null_literal().to_string(),
            })
            .collect();
        self.batch.push(format!("({})", values.join(", ")));
        self.state = InserterState::Accumulating;

        if self.batch.len() >= self.batch_size {
            self.state = InserterState::Flushing;
            self.flush().await;
            self.state = InserterState::Empty;
        }
        Ok(())
    }

    /// Records a row that could not be read or decoded.
    pub fn skip(&mut self, error: DbTsvError) {
        tracing::warn!("{}", error);
        self.summary.rows_skipped = self.summary.rows_skipped.saturating_add(1);
    }

    /// Flushes the partial batch, if any, and returns the table summary.
    pub async fn finish(mut self) -> RestoreSummary {
        self.state = InserterState::Draining;
        if !self.batch.is_empty() {
            self.flush().await;
        }

        tracing::info!(
            "Restored '{}': {} rows inserted, {} skipped, {} lost in {} failed batches",
            self.table,
            self.summary.rows_inserted,
            self.summary.rows_skipped,
            self.summary.rows_lost,
            self.summary.batches_failed
        );
        self.summary
    }

    async fn flush(&mut self) {
        let Some(plan) = &self.plan else {
            return;
        };
        let rows = self.batch.len();
        let body = self.batch.join(",\n");
        let mut sql = String::with_capacity(plan.prefix.len().saturating_add(body.len()));
        sql.push_str(&plan.prefix);
        sql.push_str(&body);

        let count = u64::try_from(rows).unwrap_or(u64::MAX);
        self.summary.batches_executed = self.summary.batches_executed.saturating_add(1);
        match self.executor.execute(&sql).await {
            Ok(_) => {
                self.summary.rows_inserted = self.summary.rows_inserted.saturating_add(count);
                tracing::debug!("Table '{}': inserted batch of {} rows", self.table, rows);
            }
            Err(e) => {
                let error = DbTsvError::batch_failed(&self.table, rows, e.for_table(&self.table));
                tracing::error!("{}: {}", error, error_chain(&error));
                self.summary.batches_failed = self.summary.batches_failed.saturating_add(1);
                self.summary.rows_lost = self.summary.rows_lost.saturating_add(count);
            }
        }
        self.batch.clear();
    }
}

fn error_chain(error: &dyn std::error::Error) -> String {
    let mut parts = Vec::new();
    let mut source = error.source();
    while let Some(cause) = source {
        parts.push(cause.to_string());
        source = cause.source();
    }
    parts.join(": ")
}
