//! SQL Server executor built on tiberius.
//!
//! # Module Structure
//! - `connection`: URL parsing and the semaphore-bounded client pool
//! - `cells`: SQL Server value to cell conversion

pub mod cells;
pub mod connection;

use super::{CURSOR_BUFFER, QueryExecutor, RowCursor};
use crate::Result;
use crate::config::ConnectionSettings;
use crate::dialect::Dialect;
use crate::error::DbTsvError;
use crate::models::Row;
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use tiberius::ToSql;
use tokio::sync::{mpsc, oneshot};

pub use cells::{decode_cell, decode_row};
pub use connection::{ClientPool, PooledClient, parse_sqlserver_config};

/// SQL Server executor
#[derive(Debug)]
pub struct SqlServerExecutor {
    pool: Arc<ClientPool>,
    settings: ConnectionSettings,
}

impl SqlServerExecutor {
    /// Creates an executor; no connection is opened until first use.
    ///
    /// # Errors
    /// Returns error if the settings or the connection string are invalid
    pub fn new(connection_string: &str, settings: ConnectionSettings) -> Result<Self> {
        settings.validate()?;
        if settings.dialect != Dialect::SqlServer {
            return Err(DbTsvError::configuration(
                "SqlServerExecutor requires the mssql dialect",
            ));
        }
        let config = parse_sqlserver_config(connection_string)?;
        Ok(Self {
            pool: ClientPool::new(config, &settings),
            settings,
        })
    }
}

#[async_trait]
impl QueryExecutor for SqlServerExecutor {
    fn dialect(&self) -> Dialect {
        Dialect::SqlServer
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.pool.checkout().await?;
        let stream = conn
            .client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| DbTsvError::connection_failed("SQL Server connectivity check failed", e))?;
        stream
            .into_first_result()
            .await
            .map_err(|e| DbTsvError::connection_failed("SQL Server connectivity check failed", e))?;
        conn.release();
        tracing::debug!("SQL Server reachable ({})", self.settings);
        Ok(())
    }

    async fn execute(&self, sql: &str) -> Result<u64> {
        let mut conn = self.pool.checkout().await?;
        let result = conn
            .client
            .execute(sql, &[])
            .await
            .map_err(|e| DbTsvError::query_failed("", "Statement failed", e))?;
        let affected = result.total();
        conn.release();
        Ok(affected)
    }

    async fn fetch_all(&self, sql: &str, params: &[String]) -> Result<Vec<Row>> {
        let mut conn = self.pool.checkout().await?;
        let bound: Vec<&dyn ToSql> = params.iter().map(|p| p as &dyn ToSql).collect();
        let stream = conn
            .client
            .query(sql, &bound)
            .await
            .map_err(|e| DbTsvError::query_failed("", "Query failed", e))?;
        let rows = stream
            .into_first_result()
            .await
            .map_err(|e| DbTsvError::query_failed("", "Reading query result failed", e))?;
        conn.release();
        Ok(rows.into_iter().map(decode_row).collect())
    }

    async fn scan(&self, sql: &str) -> Result<RowCursor> {
        let mut conn = self.pool.checkout().await?;
        let sql = sql.to_string();
        let (columns_tx, columns_rx) = oneshot::channel::<Result<Vec<String>>>();
        let (rows_tx, rows_rx) = mpsc::channel::<Result<Row>>(CURSOR_BUFFER);

        tokio::spawn(async move {
            let mut drained = false;
            {
                let mut stream = match conn.client.simple_query(sql.as_str()).await {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = columns_tx.send(Err(DbTsvError::query_failed(
                            "",
                            "Query failed",
                            e,
                        )));
                        return;
                    }
                };

                let columns = match stream.columns().await {
                    Ok(Some(columns)) => columns.iter().map(|c| c.name().to_string()).collect(),
                    Ok(None) => Vec::new(),
                    Err(e) => {
                        let _ = columns_tx.send(Err(DbTsvError::query_failed(
                            "",
                            "Describing the result columns failed",
                            e,
                        )));
                        return;
                    }
                };
                if columns_tx.send(Ok(columns)).is_err() {
                    return;
                }

                let mut rows = stream.into_row_stream();
                loop {
                    let Some(item) = rows.next().await else {
                        drained = true;
                        break;
                    };
                    let failed = item.is_err();
                    let item = item
                        .map(decode_row)
                        .map_err(|e| DbTsvError::query_failed("", "Reading rows failed", e));
                    if rows_tx.send(item).await.is_err() || failed {
                        break;
                    }
                }
            }
            // A half-read result leaves the client unusable
            if drained {
                conn.release();
            }
        });

        let columns = columns_rx
            .await
            .map_err(|_| DbTsvError::query("", "Row producer stopped before reporting columns"))??;
        Ok(RowCursor::new(columns, rows_rx))
    }
}
