//! MySQL connection pool creation and validation.
//!
//! # Security Features
//! - Validates connection string format before any connection attempt
//! - Enforces the configured connection ceiling
//! - Sanitizes connection strings in all error messages

use crate::Result;
use crate::config::ConnectionSettings;
use crate::error::{DbTsvError, redact_database_url};
use sqlx::MySqlPool;
use std::time::Duration;
use url::Url;

/// How long a task may wait for a pooled connection.
///
/// Waiting for a connection is queuing, not failure, so the bound sits
/// far beyond any realistic run.
pub const ACQUIRE_WAIT: Duration = Duration::from_secs(60 * 60 * 24 * 7);

/// Validates MySQL connection string format
///
/// # Errors
/// Returns error if the string is not a `mysql://` URL with a host
pub fn validate_mysql_connection_string(connection_string: &str) -> Result<()> {
    let url = Url::parse(connection_string).map_err(|e| {
        DbTsvError::configuration(format!("Invalid MySQL connection string format: {}", e))
    })?;

    if url.scheme() != "mysql" {
        return Err(DbTsvError::configuration(
            "Connection string must use mysql:// scheme",
        ));
    }

    if url.host_str().is_none() {
        return Err(DbTsvError::configuration(
            "Connection string must specify a host",
        ));
    }

    Ok(())
}

/// Creates a lazily connecting MySQL pool.
///
/// Every session runs with a UTC time zone so `TIMESTAMP` values export
/// and restore without shifting. Connections are never recycled by age
/// or idleness: a restore's integrity suspension lives in the session.
pub fn create_mysql_connection_pool(
    connection_string: &str,
    settings: &ConnectionSettings,
) -> Result<MySqlPool> {
    use sqlx::Executor;

    validate_mysql_connection_string(connection_string)?;

    sqlx::mysql::MySqlPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(0)
        .acquire_timeout(ACQUIRE_WAIT)
        .idle_timeout(None)
        .max_lifetime(None)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute("SET time_zone = '+00:00'").await?;
                Ok(())
            })
        })
        .connect_lazy(connection_string)
        .map_err(|e| {
            DbTsvError::connection_failed(
                format!(
                    "Failed to create MySQL connection pool to {}",
                    redact_database_url(connection_string)
                ),
                e,
            )
        })
}
