//! Export pipeline: cursor, row conversion, file writer, fan-out.

pub mod coordinator;
pub mod exporter;
pub mod row_reader;

pub use coordinator::ExportCoordinator;
pub use exporter::TableExporter;
pub use row_reader::RowReader;
