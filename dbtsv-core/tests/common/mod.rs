//! Scripted in-memory executor shared by the pipeline tests.

#![allow(dead_code)]

use async_trait::async_trait;
use dbtsv_core::{Cell, DbTsvError, Dialect, QueryExecutor, Result, Row, RowCursor};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Table contents served by `scan`.
#[derive(Debug, Clone, Default)]
pub struct FakeTable {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl FakeTable {
    pub fn new(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn row(mut self, cells: Vec<Cell>) -> Self {
        self.rows.push(cells);
        self
    }
}

/// Executor that records statements and measures concurrent scans.
///
/// Scans hold one of `ceiling` permits for as long as the cursor lives,
/// the way a pooled connection would.
pub struct ScriptedExecutor {
    dialect: Dialect,
    tables: HashMap<String, FakeTable>,
    schemas: HashMap<String, Vec<(String, String)>>,
    failing: Mutex<Vec<String>>,
    fatal: Mutex<Vec<String>>,
    panicking: Mutex<Vec<String>>,
    executed: Mutex<Vec<String>>,
    permits: Arc<Semaphore>,
    open: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    scan_delay: Duration,
}

struct OpenScan {
    _permit: OwnedSemaphorePermit,
    open: Arc<AtomicUsize>,
}

impl Drop for OpenScan {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ScriptedExecutor {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            tables: HashMap::new(),
            schemas: HashMap::new(),
            failing: Mutex::new(Vec::new()),
            fatal: Mutex::new(Vec::new()),
            panicking: Mutex::new(Vec::new()),
            executed: Mutex::new(Vec::new()),
            permits: Arc::new(Semaphore::new(100)),
            open: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
            scan_delay: Duration::ZERO,
        }
    }

    /// Serves `table` to scans.
    pub fn with_table(mut self, name: &str, table: FakeTable) -> Self {
        self.tables.insert(name.to_string(), table);
        self
    }

    /// Declares the live schema of `table` as `(column, type)` pairs.
    pub fn with_schema(mut self, name: &str, columns: &[(&str, &str)]) -> Self {
        self.schemas.insert(
            name.to_string(),
            columns
                .iter()
                .map(|(c, t)| (c.to_string(), t.to_string()))
                .collect(),
        );
        self
    }

    /// Limits concurrently open scans, like a pool ceiling.
    pub fn with_ceiling(mut self, ceiling: usize) -> Self {
        self.permits = Arc::new(Semaphore::new(ceiling));
        self
    }

    /// Keeps every scan busy for `delay` before returning its cursor.
    pub fn with_scan_delay(mut self, delay: Duration) -> Self {
        self.scan_delay = delay;
        self
    }

    /// Makes any statement containing `fragment` fail.
    pub fn fail_on(self, fragment: &str) -> Self {
        self.failing.lock().unwrap().push(fragment.to_string());
        self
    }

    /// Makes any statement containing `fragment` fail as a lost connection.
    pub fn fail_fatally_on(self, fragment: &str) -> Self {
        self.fatal.lock().unwrap().push(fragment.to_string());
        self
    }

    /// Makes any statement containing `fragment` panic after it is recorded.
    pub fn panic_on(self, fragment: &str) -> Self {
        self.panicking.lock().unwrap().push(fragment.to_string());
        self
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    /// Executed statements that start with `prefix`.
    pub fn executed_starting_with(&self, prefix: &str) -> Vec<String> {
        self.executed()
            .into_iter()
            .filter(|sql| sql.starts_with(prefix))
            .collect()
    }

    pub fn peak_open_scans(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn should_fail(&self, sql: &str) -> bool {
        self.failing
            .lock()
            .unwrap()
            .iter()
            .any(|fragment| sql.contains(fragment.as_str()))
    }

    fn table_in(&self, sql: &str) -> Option<String> {
        let (open, close) = match self.dialect {
            Dialect::MySql => ('`', '`'),
            Dialect::SqlServer => ('[', ']'),
        };
        let start = sql.find(open)?.saturating_add(1);
        let end = sql[start..].find(close)?.saturating_add(start);
        Some(sql[start..end].to_string())
    }
}

#[async_trait]
impl QueryExecutor for ScriptedExecutor {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn execute(&self, sql: &str) -> Result<u64> {
        self.executed.lock().unwrap().push(sql.to_string());
        let panics = self
            .panicking
            .lock()
            .unwrap()
            .iter()
            .any(|f| sql.contains(f.as_str()));
        if panics {
            panic!("scripted panic on {}", sql);
        }
        if self.fatal.lock().unwrap().iter().any(|f| sql.contains(f.as_str())) {
            return Err(DbTsvError::connection_failed(
                "scripted disconnect",
                std::io::Error::other("connection reset"),
            ));
        }
        if self.should_fail(sql) {
            return Err(DbTsvError::query("", "scripted failure"));
        }
        Ok(0)
    }

    async fn fetch_all(&self, sql: &str, params: &[String]) -> Result<Vec<Row>> {
        if self.should_fail(sql) {
            return Err(DbTsvError::query("", "scripted failure"));
        }

        if sql.contains("INFORMATION_SCHEMA.TABLES") || sql.contains("information_schema.tables") {
            let mut names: Vec<&String> = self.tables.keys().collect();
            names.sort();
            return Ok(names
                .into_iter()
                .map(|name| vec![Cell::Text(name.clone())])
                .collect());
        }

        let table = match params.first() {
            Some(table) => Some(table.clone()),
            None => self.table_in(sql),
        };
        let columns = table
            .and_then(|t| self.schemas.get(&t))
            .cloned()
            .unwrap_or_default();
        Ok(columns
            .into_iter()
            .map(|(name, data_type)| vec![Cell::Text(name), Cell::Binary(data_type.into_bytes())])
            .collect())
    }

    async fn scan(&self, sql: &str) -> Result<RowCursor> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|e| DbTsvError::connection_failed("pool closed", e))?;
        let now_open = self.open.fetch_add(1, Ordering::SeqCst).saturating_add(1);
        self.peak.fetch_max(now_open, Ordering::SeqCst);
        let guard = OpenScan {
            _permit: permit,
            open: Arc::clone(&self.open),
        };

        if !self.scan_delay.is_zero() {
            tokio::time::sleep(self.scan_delay).await;
        }
        if self.should_fail(sql) {
            return Err(DbTsvError::query("", "scripted failure"));
        }

        let table = self
            .table_in(sql)
            .and_then(|t| self.tables.get(&t))
            .cloned()
            .ok_or_else(|| DbTsvError::query("", "no such table"))?;
        let rows = table.rows.into_iter().map(Ok).collect();
        Ok(RowCursor::from_rows(table.columns, rows).with_guard(guard))
    }
}

/// Number of value tuples in a multi-row INSERT built by the inserter.
pub fn tuple_count(insert: &str) -> usize {
    insert.lines().count().saturating_sub(1)
}
