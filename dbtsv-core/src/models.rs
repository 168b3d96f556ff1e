//! Data model shared by the export and restore pipelines.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Text written for a database NULL and read back as NULL on restore.
pub const NULL_SENTINEL: &str = "-";

/// Extension of every table file.
pub const TABLE_FILE_EXTENSION: &str = "tsv";

/// One cell as read from the store.
///
/// `Unrecognized` carries the driver's type name for values that have no
/// canonical text form; converting such a cell fails for that row only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    /// Native string value
    Text(String),
    /// Signed integer of any width
    Integer(i64),
    /// Database NULL
    Null,
    /// Raw byte sequence
    Binary(Vec<u8>),
    /// Value of a type with no text mapping
    Unrecognized(String),
}

impl Cell {
    /// Converts the cell to the bytes of its canonical form.
    ///
    /// Byte sequences pass through untouched, whether or not they are
    /// valid UTF-8; the codec decides how to write them.
    pub fn into_field(self) -> std::result::Result<Vec<u8>, String> {
        match self {
            Self::Text(s) => Ok(s.into_bytes()),
            Self::Integer(n) => Ok(n.to_string().into_bytes()),
            Self::Null => Ok(NULL_SENTINEL.as_bytes().to_vec()),
            Self::Binary(bytes) => Ok(bytes),
            Self::Unrecognized(type_name) => {
                Err(format!("unsupported cell type {}", type_name))
            }
        }
    }

    /// Returns the cell as a string slice when it is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Binary(bytes) => std::str::from_utf8(bytes).ok(),
            _ => None,
        }
    }
}

/// One row of cells, positionally matching the table's column list.
pub type Row = Vec<Cell>;

/// How a column's values are written in generated SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnClass {
    /// Written unquoted
    Numeric,
    /// Written as a quoted string literal
    String,
}

/// Column name to classification, for one table during one restore.
pub type ColumnTypeMap = HashMap<String, ColumnClass>;

/// Unit of export work: one table into one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportJob {
    pub table: String,
    pub destination: PathBuf,
}

impl ExportJob {
    /// Builds the job for `table` writing `<dir>/<table>.tsv`.
    pub fn new(table: impl Into<String>, dir: &std::path::Path) -> Self {
        let table = table.into();
        let destination = dir.join(format!("{}.{}", table, TABLE_FILE_EXTENSION));
        Self { table, destination }
    }
}

/// Unit of restore work: one file into one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreJob {
    pub table: String,
    pub source: PathBuf,
}

impl RestoreJob {
    /// Builds the job for a table file; the table name is the file stem.
    ///
    /// Returns `None` for paths without a usable stem.
    pub fn from_path(source: PathBuf) -> Option<Self> {
        let table = source.file_stem()?.to_str()?.to_string();
        if table.is_empty() {
            return None;
        }
        Some(Self { table, source })
    }
}

/// How a single table finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TableOutcome {
    /// Every row was processed (individual rows or batches may still have
    /// been skipped, see the counters)
    Completed,
    /// The table was abandoned
    Failed { error: String },
}

/// Result of exporting one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportSummary {
    pub table: String,
    pub path: PathBuf,
    pub rows_written: u64,
    pub rows_skipped: u64,
    pub outcome: TableOutcome,
}

impl ExportSummary {
    /// Summary for a table whose export was abandoned.
    pub fn failed(job: &ExportJob, error: &crate::DbTsvError) -> Self {
        Self {
            table: job.table.clone(),
            path: job.destination.clone(),
            rows_written: 0,
            rows_skipped: 0,
            outcome: TableOutcome::Failed {
                error: error.to_string(),
            },
        }
    }
}

/// Result of restoring one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreSummary {
    pub table: String,
    pub path: PathBuf,
    pub rows_inserted: u64,
    pub rows_skipped: u64,
    pub rows_lost: u64,
    pub batches_executed: u64,
    pub batches_failed: u64,
    /// File columns with no counterpart in the live table
    pub dropped_columns: Vec<String>,
    pub outcome: TableOutcome,
}

impl RestoreSummary {
    /// Empty summary for a job about to start.
    pub fn new(job: &RestoreJob) -> Self {
        Self {
            table: job.table.clone(),
            path: job.source.clone(),
            rows_inserted: 0,
            rows_skipped: 0,
            rows_lost: 0,
            batches_executed: 0,
            batches_failed: 0,
            dropped_columns: Vec::new(),
            outcome: TableOutcome::Completed,
        }
    }

    /// Marks the summary as abandoned with the given error.
    pub fn fail(mut self, error: &crate::DbTsvError) -> Self {
        self.outcome = TableOutcome::Failed {
            error: error.to_string(),
        };
        self
    }
}

/// Direction of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Export,
    Restore,
}

/// Aggregated outcome of a whole export or restore run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub mode: RunMode,
    pub directory: PathBuf,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub duration_ms: u64,
    pub tables_completed: usize,
    pub tables_failed: usize,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub exports: Vec<ExportSummary>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub restores: Vec<RestoreSummary>,
    pub tool_version: String,
}

impl RunReport {
    /// Builds the report for an export run.
    pub fn for_export(
        directory: PathBuf,
        started_at: chrono::DateTime<chrono::Utc>,
        duration: std::time::Duration,
        exports: Vec<ExportSummary>,
    ) -> Self {
        let tables_failed = exports
            .iter()
            .filter(|s| matches!(s.outcome, TableOutcome::Failed { .. }))
            .count();
        Self {
            mode: RunMode::Export,
            directory,
            started_at,
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            tables_completed: exports.len().saturating_sub(tables_failed),
            tables_failed,
            exports,
            restores: Vec::new(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Builds the report for a restore run.
    pub fn for_restore(
        directory: PathBuf,
        started_at: chrono::DateTime<chrono::Utc>,
        duration: std::time::Duration,
        restores: Vec<RestoreSummary>,
    ) -> Self {
        let tables_failed = restores
            .iter()
            .filter(|s| matches!(s.outcome, TableOutcome::Failed { .. }))
            .count();
        Self {
            mode: RunMode::Restore,
            directory,
            started_at,
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            tables_completed: restores.len().saturating_sub(tables_failed),
            tables_failed,
            exports: Vec::new(),
            restores,
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
