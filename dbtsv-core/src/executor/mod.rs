//! Relational query capability used by export and restore.
//!
//! The pipelines never talk to a driver directly. They issue raw SQL
//! through [`QueryExecutor`] and pull table rows through a [`RowCursor`],
//! which keeps one store connection checked out until it is drained or
//! dropped. The executor's pool ceiling is therefore the only thing that
//! bounds how many table scans are open at once.
//!
//! # Object Safety
//! The trait is object-safe and is shared as `Arc<dyn QueryExecutor>`.

use crate::Result;
use crate::config::ConnectionSettings;
use crate::dialect::Dialect;
use crate::models::Row;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

#[cfg(feature = "mysql")]
pub mod mysql;

#[cfg(feature = "mssql")]
pub mod mssql;

#[cfg(feature = "mysql")]
pub use mysql::MySqlExecutor;

#[cfg(feature = "mssql")]
pub use mssql::SqlServerExecutor;

/// Rows buffered between a cursor's producer and its consumer.
pub const CURSOR_BUFFER: usize = 256;

/// Raw SQL access to one store.
///
/// Errors from `execute`, `fetch_all` and `scan` are `Query` errors with
/// no table attached; callers label them with
/// [`DbTsvError::for_table`](crate::DbTsvError::for_table).
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Dialect the store speaks.
    fn dialect(&self) -> Dialect;

    /// Verifies the store is reachable.
    ///
    /// # Errors
    /// Returns a `Connection` error when no connection can be opened.
    async fn ping(&self) -> Result<()>;

    /// Executes a statement that returns no rows.
    ///
    /// Returns the number of affected rows.
    async fn execute(&self, sql: &str) -> Result<u64>;

    /// Runs a (possibly parameterized) query and collects every row.
    ///
    /// Parameters are positional strings; placeholders follow the
    /// dialect's syntax (`?` or `@P1`).
    async fn fetch_all(&self, sql: &str, params: &[String]) -> Result<Vec<Row>>;

    /// Starts streaming the result of a query.
    async fn scan(&self, sql: &str) -> Result<RowCursor>;
}

/// Pull cursor over a query result.
///
/// Column names are known as soon as the cursor exists, even when the
/// result holds no rows.
pub struct RowCursor {
    columns: Vec<String>,
    rows: mpsc::Receiver<Result<Row>>,
    _guard: Option<Box<dyn Send + Sync>>,
}

impl std::fmt::Debug for RowCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowCursor")
            .field("columns", &self.columns)
            .finish_non_exhaustive()
    }
}

impl RowCursor {
    /// Wraps the receiving end of a row producer.
    pub fn new(columns: Vec<String>, rows: mpsc::Receiver<Result<Row>>) -> Self {
        Self {
            columns,
            rows,
            _guard: None,
        }
    }

    /// Builds a cursor over rows that are already in memory.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Result<Row>>) -> Self {
        let (tx, rx) = mpsc::channel(rows.len().max(1));
        for row in rows {
            // capacity covers every row, so this never fails
            let _ = tx.try_send(row);
        }
        Self::new(columns, rx)
    }

    /// Keeps `guard` alive for as long as the cursor exists.
    ///
    /// Used to tie a resource such as a pool permit to the cursor's
    /// lifetime.
    pub fn with_guard<G: Send + Sync + 'static>(mut self, guard: G) -> Self {
        self._guard = Some(Box::new(guard));
        self
    }

    /// Column names of the result, in order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Next row, or `None` once the result is exhausted.
    ///
    /// A driver error is delivered in place of a row and ends the stream.
    pub async fn next_row(&mut self) -> Option<Result<Row>> {
        self.rows.recv().await
    }
}

/// Database engine a connection string points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Driver {
    MySql,
    SqlServer,
}

impl Driver {
    /// The dialect this driver speaks.
    pub fn dialect(self) -> Dialect {
        match self {
            Self::MySql => Dialect::MySql,
            Self::SqlServer => Dialect::SqlServer,
        }
    }
}

/// Detects the driver from a connection string's scheme.
///
/// # Errors
/// Returns a configuration error for unknown schemes.
pub fn detect_driver(connection_string: &str) -> Result<Driver> {
    if connection_string.starts_with("mysql://") {
        Ok(Driver::MySql)
    } else if connection_string.starts_with("mssql://")
        || connection_string.starts_with("sqlserver://")
    {
        Ok(Driver::SqlServer)
    } else {
        Err(crate::DbTsvError::configuration(
            "Unrecognized database connection string format (expected mysql:// or mssql://)",
        ))
    }
}

/// Creates the executor for a connection string.
///
/// The dialect in `settings` is authoritative; a connection string for a
/// different engine is rejected instead of silently switching dialects.
///
/// # Errors
/// Returns a configuration error for unknown schemes, a dialect mismatch
/// or a driver that was not compiled in.
pub fn create_executor(
    connection_string: &str,
    settings: &ConnectionSettings,
) -> Result<Arc<dyn QueryExecutor>> {
    settings.validate()?;
    let driver = detect_driver(connection_string)?;

    if driver.dialect() != settings.dialect {
        return Err(crate::DbTsvError::configuration(format!(
            "Dialect '{}' does not match connection string {}",
            settings.dialect,
            crate::error::redact_database_url(connection_string)
        )));
    }

    match driver {
        #[cfg(feature = "mysql")]
        Driver::MySql => Ok(Arc::new(MySqlExecutor::new(
            connection_string,
            settings.clone(),
        )?)),
        #[cfg(not(feature = "mysql"))]
        Driver::MySql => Err(crate::DbTsvError::configuration(
            "MySQL support not compiled in. Use --features mysql",
        )),
        #[cfg(feature = "mssql")]
        Driver::SqlServer => Ok(Arc::new(SqlServerExecutor::new(
            connection_string,
            settings.clone(),
        )?)),
        #[cfg(not(feature = "mssql"))]
        Driver::SqlServer => Err(crate::DbTsvError::configuration(
            "SQL Server support not compiled in. Use --features mssql",
        )),
    }
}
