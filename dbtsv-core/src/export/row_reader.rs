//! Cell-to-field conversion over a result cursor.

use crate::Result;
use crate::error::DbTsvError;
use crate::executor::RowCursor;
use crate::models::Row;

/// Pulls rows from a cursor and converts each cell to its field bytes.
///
/// A database NULL becomes the null sentinel, integers are printed in
/// decimal, strings and byte sequences pass through unchanged. A cell
/// with no canonical form makes [`RowReader::next_row`] return a `RowDecode` error for that
/// row only; any other error means the cursor is finished.
#[derive(Debug)]
pub struct RowReader {
    table: String,
    cursor: RowCursor,
    rows_read: u64,
}

impl RowReader {
    pub fn new(table: impl Into<String>, cursor: RowCursor) -> Self {
        Self {
            table: table.into(),
            cursor,
            rows_read: 0,
        }
    }

    /// Column names of the table, in cursor order.
    pub fn columns(&self) -> &[String] {
        self.cursor.columns()
    }

    /// Rows pulled so far, including skipped ones.
    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    /// Next converted row, or `None` when the cursor is exhausted.
    pub async fn next_row(&mut self) -> Option<Result<Vec<Vec<u8>>>> {
        let row = match self.cursor.next_row().await? {
            Ok(row) => row,
            Err(e) => return Some(Err(e.for_table(&self.table))),
        };
        self.rows_read = self.rows_read.saturating_add(1);
        Some(self.convert(row))
    }

    fn convert(&self, row: Row) -> Result<Vec<Vec<u8>>> {
        let mut values = Vec::with_capacity(row.len());
        for (index, cell) in row.into_iter().enumerate() {
            match cell.into_field() {
                Ok(field) => values.push(field),
                Err(reason) => {
                    let column = self.columns().get(index).map_or("?", String::as_str);
                    return Err(DbTsvError::row_decode(
                        &self.table,
                        self.rows_read,
                        format!("column '{}': {}", column, reason),
                    ));
                }
            }
        }
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Cell;

    fn texts(fields: &[Vec<u8>]) -> Vec<String> {
        fields
            .iter()
            .map(|f| String::from_utf8_lossy(f).into_owned())
            .collect()
    }

    #[tokio::test]
    async fn test_cells_are_converted() {
        let cursor = RowCursor::from_rows(
            vec!["id".into(), "naam".into(), "foto".into(), "opmerking".into()],
            vec![Ok(vec![
                Cell::Integer(12),
                Cell::Text("Jansen".into()),
                Cell::Binary(b"abc".to_vec()),
                Cell::Null,
            ])],
        );
        let mut reader = RowReader::new("patient_data", cursor);
        let row = reader.next_row().await.unwrap().unwrap();
        assert_eq!(texts(&row), vec!["12", "Jansen", "abc", "-"]);
        assert!(reader.next_row().await.is_none());
        assert_eq!(reader.rows_read(), 1);
    }

    #[tokio::test]
    async fn test_unrecognized_cell_skips_only_that_row() {
        let cursor = RowCursor::from_rows(
            vec!["id".into(), "locatie".into()],
            vec![
                Ok(vec![Cell::Integer(1), Cell::Unrecognized("GEOMETRY".into())]),
                Ok(vec![Cell::Integer(2), Cell::Text("Utrecht".into())]),
            ],
        );
        let mut reader = RowReader::new("vestiging", cursor);

        let error = reader.next_row().await.unwrap().unwrap_err();
        assert!(matches!(error, DbTsvError::RowDecode { row: 1, .. }));
        assert!(error.to_string().contains("locatie"));

        let row = reader.next_row().await.unwrap().unwrap();
        assert_eq!(texts(&row), vec!["2", "Utrecht"]);
    }

    #[tokio::test]
    async fn test_binary_cell_is_not_rewritten() {
        let cursor = RowCursor::from_rows(
            vec!["foto".into()],
            vec![Ok(vec![Cell::Binary(vec![0x89, b'P', 0xff, 0x00])])],
        );
        let mut reader = RowReader::new("foto_archief", cursor);
        let row = reader.next_row().await.unwrap().unwrap();
        assert_eq!(row, vec![vec![0x89, b'P', 0xff, 0x00]]);
    }

    #[tokio::test]
    async fn test_cursor_error_is_labelled_with_table() {
        let cursor = RowCursor::from_rows(
            vec!["id".into()],
            vec![Err(DbTsvError::query("", "connection reset"))],
        );
        let mut reader = RowReader::new("relaties", cursor);
        let error = reader.next_row().await.unwrap().unwrap_err();
        assert!(matches!(error, DbTsvError::Query { ref table, .. } if table == "relaties"));
    }
}
