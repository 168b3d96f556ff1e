//! Export and restore tuning.

use serde::{Deserialize, Serialize};

/// Rows written between explicit flushes of a table file's buffer.
pub const DEFAULT_FLUSH_EVERY: usize = 300;

/// Value tuples per multi-row INSERT.
pub const DEFAULT_BATCH_SIZE: usize = 150;

/// Export tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Flush the write buffer after this many rows
    pub flush_every: usize,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            flush_every: DEFAULT_FLUSH_EVERY,
        }
    }
}

impl ExportConfig {
    /// Builder method to set the flush interval.
    pub fn with_flush_every(mut self, rows: usize) -> Self {
        self.flush_every = rows;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> crate::Result<()> {
        if self.flush_every == 0 {
            return Err(crate::error::DbTsvError::configuration(
                "flush_every must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Restore tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreConfig {
    /// Maximum value tuples per INSERT statement
    pub batch_size: usize,
    /// Clear each table before inserting
    pub clear_tables: bool,
}

impl Default for RestoreConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            clear_tables: true,
        }
    }
}

impl RestoreConfig {
    /// Builder method to set the batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Builder method to keep existing rows instead of clearing each table.
    pub fn with_clear_tables(mut self, clear: bool) -> Self {
        self.clear_tables = clear;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> crate::Result<()> {
        if self.batch_size == 0 {
            return Err(crate::error::DbTsvError::configuration(
                "batch_size must be greater than 0",
            ));
        }
        Ok(())
    }
}
