//! Core pipeline for dbtsv.
//!
//! dbtsv exports every table of a relational database into one
//! tab-separated file per table and rebuilds the database from those
//! files. This crate holds everything except argument parsing:
//!
//! - [`codec`]: reversible line encoding of rows and the permissive reader
//! - [`export`]: row conversion, per-table exporter and bounded fan-out
//! - [`restore`]: column classification, batched inserts and the
//!   integrity-suspending coordinator
//! - [`executor`]: the `QueryExecutor` seam with MySQL (sqlx) and SQL
//!   Server (tiberius) implementations
//! - [`catalog`]: which tables an export covers
//!
//! # Security Guarantees
//! - Connection strings are never logged or returned in errors unredacted
//! - Every identifier and string value in generated SQL is quoted by the
//!   dialect; numeric columns only receive numeric literals unquoted

pub mod catalog;
pub mod codec;
pub mod config;
pub mod dialect;
pub mod error;
pub mod executor;
pub mod export;
pub mod logging;
pub mod models;
pub mod restore;

// Re-export commonly used types
pub use catalog::{InformationSchemaCatalog, StaticCatalog, TableCatalog};
pub use codec::{LineCodec, TsvReader};
pub use config::{ConnectionSettings, ExportConfig, RestoreConfig};
pub use dialect::Dialect;
pub use error::{DbTsvError, Result};
pub use executor::{QueryExecutor, RowCursor, create_executor};
pub use export::{ExportCoordinator, TableExporter};
pub use models::{
    Cell, ColumnClass, ColumnTypeMap, ExportJob, ExportSummary, RestoreJob, RestoreSummary, Row,
    RunMode, RunReport, TableOutcome,
};
pub use restore::{BatchInserter, ColumnTypeResolver, RestoreCoordinator, discover_table_files};
