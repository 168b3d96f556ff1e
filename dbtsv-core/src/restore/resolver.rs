//! Column classification against the live schema.

use crate::Result;
use crate::error::DbTsvError;
use crate::executor::QueryExecutor;
use crate::models::{ColumnClass, ColumnTypeMap};
use std::collections::HashMap;

/// Classifies a file's columns as numeric or string for SQL generation.
///
/// One metadata query per table. File columns the live table does not
/// have are left out of the result; names are matched exactly first and
/// then case-insensitively.
pub struct ColumnTypeResolver<'a> {
    executor: &'a dyn QueryExecutor,
}

impl<'a> ColumnTypeResolver<'a> {
    pub fn new(executor: &'a dyn QueryExecutor) -> Self {
        Self { executor }
    }

    /// Builds the type map for `columns` of `table`.
    ///
    /// # Errors
    /// A `Query` error when the metadata query fails or the table has no
    /// columns (usually: it does not exist).
    pub async fn classify(&self, table: &str, columns: &[String]) -> Result<ColumnTypeMap> {
        let dialect = self.executor.dialect();
        let query = dialect.column_metadata_query(table);
        let rows = self
            .executor
            .fetch_all(&query.sql, &query.params)
            .await
            .map_err(|e| e.for_table(table))?;

        // live column name -> declared type
        let live: HashMap<String, String> = rows
            .iter()
            .filter_map(|row| {
                let name = row.first()?.as_text()?;
                let data_type = row.get(1)?.as_text()?;
                Some((name.to_string(), data_type.to_string()))
            })
            .collect();

        if live.is_empty() {
            return Err(DbTsvError::query(
                table,
                "Table has no columns in the live schema",
            ));
        }

        let mut map = ColumnTypeMap::with_capacity(columns.len());
        for column in columns {
            let data_type = live.get(column).or_else(|| {
                live.iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(column))
                    .map(|(_, data_type)| data_type)
            });
            if let Some(data_type) = data_type {
                map.insert(column.clone(), dialect.classify(data_type));
            }
        }
        Ok(map)
    }
}

/// Splits file columns into those to insert and those to drop.
pub fn partition_columns(
    columns: &[String],
    types: &ColumnTypeMap,
) -> (Vec<(usize, ColumnClass)>, Vec<String>) {
    let mut kept = Vec::with_capacity(columns.len());
    let mut dropped = Vec::new();
    for (index, column) in columns.iter().enumerate() {
        match types.get(column) {
            Some(class) => kept.push((index, *class)),
            None => dropped.push(column.clone()),
        }
    }
    (kept, dropped)
}
