//! Restore pipeline: file discovery, column resolution, batched inserts.

pub mod coordinator;
pub mod inserter;
pub mod resolver;

pub use coordinator::{RestoreCoordinator, discover_table_files};
pub use inserter::{BatchInserter, InserterState, ValueFormatter};
pub use resolver::ColumnTypeResolver;
