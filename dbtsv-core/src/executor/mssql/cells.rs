//! SQL Server value to [`Cell`] mapping.
//!
//! Integer and bit columns become integers, character data stays text and
//! binary columns pass through as bytes. Floats, decimals, GUIDs and
//! temporal types are rendered in a text form SQL Server parses back.

use crate::models::{Cell, Row};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use tiberius::{ColumnData, FromSql};

/// Converts every column of a row.
pub fn decode_row(row: tiberius::Row) -> Row {
    row.into_iter().map(decode_cell).collect()
}

/// Converts one value.
pub fn decode_cell(data: ColumnData<'static>) -> Cell {
    match data {
        ColumnData::U8(v) => v.map_or(Cell::Null, |n| Cell::Integer(i64::from(n))),
        ColumnData::I16(v) => v.map_or(Cell::Null, |n| Cell::Integer(i64::from(n))),
        ColumnData::I32(v) => v.map_or(Cell::Null, |n| Cell::Integer(i64::from(n))),
        ColumnData::I64(v) => v.map_or(Cell::Null, Cell::Integer),
        ColumnData::Bit(v) => v.map_or(Cell::Null, |b| Cell::Integer(i64::from(b))),
        ColumnData::F32(v) => v.map_or(Cell::Null, |f| Cell::Text(f.to_string())),
        ColumnData::F64(v) => v.map_or(Cell::Null, |f| Cell::Text(f.to_string())),
        ColumnData::String(v) => v.map_or(Cell::Null, |s| Cell::Text(s.into_owned())),
        ColumnData::Binary(v) => v.map_or(Cell::Null, |b| Cell::Binary(b.into_owned())),
        ColumnData::Numeric(v) => v.map_or(Cell::Null, |n| Cell::Text(n.to_string())),
        // SQL Server prints uniqueidentifier values in upper case
        ColumnData::Guid(v) => v.map_or(Cell::Null, |g| Cell::Text(g.to_string().to_uppercase())),
        ColumnData::Xml(v) => v.map_or(Cell::Null, |_| Cell::Unrecognized("xml".to_string())),
        ColumnData::DateTime(_)
        | ColumnData::SmallDateTime(_)
        | ColumnData::DateTime2(_)
        | ColumnData::Date(_)
        | ColumnData::Time(_)
        | ColumnData::DateTimeOffset(_) => temporal(&data),
        #[allow(unreachable_patterns)]
        other => Cell::Unrecognized(format!("{:?}", other)),
    }
}

fn temporal(data: &ColumnData<'static>) -> Cell {
    let text = match data {
        // legacy datetime only accepts three fractional digits
        ColumnData::DateTime(_) | ColumnData::SmallDateTime(_) => NaiveDateTime::from_sql(data)
            .map(|v| v.map(|t| t.format("%Y-%m-%d %H:%M:%S%.3f").to_string())),
        ColumnData::DateTime2(_) => NaiveDateTime::from_sql(data).map(|v| v.map(|t| t.to_string())),
        ColumnData::Date(_) => NaiveDate::from_sql(data).map(|v| v.map(|d| d.to_string())),
        ColumnData::Time(_) => NaiveTime::from_sql(data).map(|v| v.map(|t| t.to_string())),
        ColumnData::DateTimeOffset(_) => {
            DateTime::<FixedOffset>::from_sql(data).map(|v| v.map(|t| t.to_string()))
        }
        other => return Cell::Unrecognized(format!("{:?}", other)),
    };

    match text {
        Ok(Some(text)) => Cell::Text(text),
        Ok(None) => Cell::Null,
        Err(e) => Cell::Unrecognized(e.to_string()),
    }
}
