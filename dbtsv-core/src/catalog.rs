//! Which tables an export covers.
//!
//! Deciding which tables are "regular" is the catalog's business, not the
//! pipeline's. The export coordinator only consumes the ordered list.

use crate::Result;
use crate::error::DbTsvError;
use crate::executor::QueryExecutor;
use async_trait::async_trait;
use std::sync::Arc;

/// Source of the ordered table list for an export run.
#[async_trait]
pub trait TableCatalog: Send + Sync {
    /// Lists the tables to export, in order.
    ///
    /// # Errors
    /// A catalog error is fatal to the run.
    async fn list_export_tables(&self) -> Result<Vec<String>>;
}

/// Fixed table list, typically from the command line.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    tables: Vec<String>,
}

impl StaticCatalog {
    /// Creates a catalog over an explicit list; blank names are dropped.
    pub fn new<I, S>(tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tables: tables
                .into_iter()
                .map(Into::into)
                .map(|t: String| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }

    /// Parses a comma-separated list such as `patients,addresses`.
    pub fn from_list(list: &str) -> Self {
        Self::new(list.split(','))
    }
}

#[async_trait]
impl TableCatalog for StaticCatalog {
    async fn list_export_tables(&self) -> Result<Vec<String>> {
        Ok(self.tables.clone())
    }
}

/// Every base table of the connected database, ordered by name.
pub struct InformationSchemaCatalog {
    executor: Arc<dyn QueryExecutor>,
}

impl InformationSchemaCatalog {
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl TableCatalog for InformationSchemaCatalog {
    async fn list_export_tables(&self) -> Result<Vec<String>> {
        let sql = self.executor.dialect().list_tables_query();
        let rows = self
            .executor
            .fetch_all(sql, &[])
            .await
            .map_err(|e| DbTsvError::catalog_failed("Listing base tables failed", e))?;

        let mut tables = Vec::with_capacity(rows.len());
        for row in &rows {
            match row.first().and_then(|cell| cell.as_text()) {
                Some(name) => tables.push(name.to_string()),
                None => {
                    return Err(DbTsvError::Catalog {
                        context: format!("Unexpected table name value {:?}", row.first()),
                        source: "table list returned a non-text name".into(),
                    });
                }
            }
        }
        tracing::debug!("Catalog lists {} tables", tables.len());
        Ok(tables)
    }
}
