//! SQL dialect variants.
//!
//! Every statement whose text differs between the supported engines is
//! built here. The dialect is always chosen explicitly by configuration,
//! never inferred from a driver.

use crate::models::ColumnClass;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write as _};
use std::str::FromStr;

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// MySQL / MariaDB
    #[default]
    MySql,
    /// Microsoft SQL Server
    SqlServer,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MySql => write!(f, "mysql"),
            Self::SqlServer => write!(f, "mssql"),
        }
    }
}

impl FromStr for Dialect {
    type Err = crate::DbTsvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(Self::MySql),
            "mssql" | "sqlserver" => Ok(Self::SqlServer),
            other => Err(crate::DbTsvError::configuration(format!(
                "Unknown dialect '{}': expected mysql or mssql",
                other
            ))),
        }
    }
}

/// A metadata query plus its positional parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataQuery {
    pub sql: String,
    pub params: Vec<String>,
}

impl Dialect {
    /// Statement that suspends foreign-key enforcement.
    pub fn disable_constraints(&self) -> &'static str {
        match self {
            Self::MySql => "SET FOREIGN_KEY_CHECKS=0",
            Self::SqlServer => "EXEC sp_msforeachtable N'ALTER TABLE ? NOCHECK CONSTRAINT all'",
        }
    }

    /// Statement that restores foreign-key enforcement.
    pub fn enable_constraints(&self) -> &'static str {
        match self {
            Self::MySql => "SET FOREIGN_KEY_CHECKS=1",
            Self::SqlServer => {
                "EXEC sp_msforeachtable N'ALTER TABLE ? WITH CHECK CHECK CONSTRAINT all'"
            }
        }
    }

    /// Query listing `(column name, data type)` for one table.
    ///
    /// MySQL uses `DESCRIBE` (the first two result columns are `Field` and
    /// `Type`); SQL Server uses `information_schema.columns` for the
    /// session's default schema with the table name bound as a parameter.
    pub fn column_metadata_query(&self, table: &str) -> MetadataQuery {
        match self {
            Self::MySql => MetadataQuery {
                sql: format!("DESCRIBE {}", self.quote_identifier(table)),
                params: Vec::new(),
            },
            Self::SqlServer => MetadataQuery {
                sql: "SELECT COLUMN_NAME, DATA_TYPE FROM information_schema.columns \
                      WHERE TABLE_SCHEMA = SCHEMA_NAME() AND TABLE_NAME = @P1"
                    .to_string(),
                params: vec![table.to_string()],
            },
        }
    }

    /// Query listing the base tables of the connected database, by name.
    pub fn list_tables_query(&self) -> &'static str {
        match self {
            Self::MySql => {
                "SELECT CAST(TABLE_NAME AS CHAR) AS TABLE_NAME \
                 FROM INFORMATION_SCHEMA.TABLES \
                 WHERE TABLE_SCHEMA = DATABASE() AND TABLE_TYPE = 'BASE TABLE' \
                 ORDER BY TABLE_NAME"
            }
            Self::SqlServer => {
                "SELECT TABLE_NAME FROM information_schema.tables \
                 WHERE TABLE_SCHEMA = SCHEMA_NAME() AND TABLE_TYPE = 'BASE TABLE' \
                 ORDER BY TABLE_NAME"
            }
        }
    }

    /// Quotes an identifier, doubling any embedded quote character.
    pub fn quote_identifier(&self, name: &str) -> String {
        match self {
            Self::MySql => format!("`{}`", name.replace('`', "``")),
            Self::SqlServer => format!("[{}]", name.replace(']', "]]")),
        }
    }

    /// Quotes a string literal.
    pub fn quote_literal(&self, value: &str) -> String {
        match self {
            Self::MySql => {
                let mut out = String::with_capacity(value.len().saturating_add(2));
                out.push('\'');
                for c in value.chars() {
                    match c {
                        '\\' => out.push_str("\\\\"),
                        '\'' => out.push_str("\\'"),
                        '\n' => out.push_str("\\n"),
                        '\r' => out.push_str("\\r"),
                        '\0' => out.push_str("\\0"),
                        '\u{1a}' => out.push_str("\\Z"),
                        other => out.push(other),
                    }
                }
                out.push('\'');
                out
            }
            Self::SqlServer => format!("N'{}'", value.replace('\'', "''")),
        }
    }

    /// The engine's NULL literal.
    pub fn null_literal(&self) -> &'static str {
        "NULL"
    }

    /// Hexadecimal literal for a value that is not valid UTF-8.
    pub fn binary_literal(&self, bytes: &[u8]) -> String {
        let mut hex = String::with_capacity(bytes.len().saturating_mul(2));
        for byte in bytes {
            let _ = write!(hex, "{:02X}", byte);
        }
        match self {
            Self::MySql => format!("X'{}'", hex),
            Self::SqlServer => format!("0x{}", hex),
        }
    }

    /// `SELECT *` over a whole table.
    pub fn select_all(&self, table: &str) -> String {
        format!("SELECT * FROM {}", self.quote_identifier(table))
    }

    /// Statement clearing a table before it is repopulated.
    pub fn delete_all(&self, table: &str) -> String {
        format!("DELETE FROM {}", self.quote_identifier(table))
    }

    /// `INSERT INTO <table> (<columns>) VALUES` prefix for batched inserts.
    pub fn insert_prefix<S: AsRef<str>>(&self, table: &str, columns: &[S]) -> String {
        let columns = columns
            .iter()
            .map(|c| self.quote_identifier(c.as_ref()))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "INSERT INTO {} ({}) VALUES\n",
            self.quote_identifier(table),
            columns
        )
    }

    /// Classifies a column's declared data type.
    ///
    /// Integer, decimal and floating point families are numeric; everything
    /// else (text, dates, binary, json, enums) is written as a string.
    pub fn classify(&self, data_type: &str) -> ColumnClass {
        let lower = data_type.trim().to_ascii_lowercase();
        // DESCRIBE reports e.g. "int(11) unsigned" or "decimal(10,2)"
        let base = lower
            .split(|c: char| c == '(' || c.is_whitespace())
            .next()
            .unwrap_or_default();

        match base {
            "tinyint" | "smallint" | "mediumint" | "int" | "integer" | "bigint" | "decimal"
            | "numeric" | "dec" | "fixed" | "float" | "double" | "real" | "money"
            | "smallmoney" => ColumnClass::Numeric,
            "bit" if matches!(self, Self::SqlServer) => ColumnClass::Numeric,
            _ => ColumnClass::String,
        }
    }
}
