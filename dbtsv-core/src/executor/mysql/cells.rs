//! MySQL value to [`Cell`] mapping.
//!
//! Table scans use the text protocol, so almost every value arrives as
//! the server's canonical text. Only the column type decides whether the
//! text is kept, parsed as an integer or treated as raw bytes.

use crate::models::{Cell, Row};
use sqlx::mysql::MySqlRow;
use sqlx::{Row as _, TypeInfo, ValueRef};

/// How a MySQL column type is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    Integer,
    Binary,
    Text,
    Unsupported,
}

/// Maps a sqlx MySQL type name to the way its values are read.
pub fn cell_kind(type_name: &str) -> CellKind {
    let base = type_name
        .strip_suffix(" UNSIGNED")
        .unwrap_or(type_name)
        .to_ascii_uppercase();

    match base.as_str() {
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "INTEGER" | "BIGINT" | "BOOLEAN"
        | "YEAR" => CellKind::Integer,
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BIT" => {
            CellKind::Binary
        }
        "GEOMETRY" => CellKind::Unsupported,
        _ => CellKind::Text,
    }
}

/// Converts every column of a row.
pub fn decode_row(row: &MySqlRow) -> Row {
    (0..row.len()).map(|index| decode_cell(row, index)).collect()
}

fn decode_cell(row: &MySqlRow, index: usize) -> Cell {
    let type_name = match row.try_get_raw(index) {
        Ok(value) if value.is_null() => return Cell::Null,
        Ok(value) => value.type_info().name().to_string(),
        Err(e) => return Cell::Unrecognized(e.to_string()),
    };

    match cell_kind(&type_name) {
        CellKind::Integer => match row.try_get_unchecked::<i64, _>(index) {
            Ok(n) => Cell::Integer(n),
            // BIGINT UNSIGNED above i64::MAX keeps its text form
            Err(_) => decode_text(row, index, type_name),
        },
        CellKind::Binary => row
            .try_get_unchecked::<Vec<u8>, _>(index)
            .map(Cell::Binary)
            .unwrap_or(Cell::Unrecognized(type_name)),
        CellKind::Text => decode_text(row, index, type_name),
        CellKind::Unsupported => Cell::Unrecognized(type_name),
    }
}

fn decode_text(row: &MySqlRow, index: usize, type_name: String) -> Cell {
    match row.try_get_unchecked::<String, _>(index) {
        Ok(text) => Cell::Text(text),
        Err(_) => match row.try_get_unchecked::<Vec<u8>, _>(index) {
            Ok(bytes) => Cell::Binary(bytes),
            Err(_) => Cell::Unrecognized(type_name),
        },
    }
}
