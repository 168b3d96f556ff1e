//! Configuration types for export and restore runs.
//!
//! - `ConnectionSettings`: connection ceiling, timeouts and dialect
//! - `ExportConfig`: write-buffer flushing for table files
//! - `RestoreConfig`: batch sizing for multi-row inserts
//!
//! These structs never hold credentials; the connection URL is passed
//! separately and only ever logged in redacted form.

mod connection;
mod transfer;

pub use connection::ConnectionSettings;
pub use transfer::{DEFAULT_BATCH_SIZE, DEFAULT_FLUSH_EVERY, ExportConfig, RestoreConfig};
