//! Store connection settings.

use crate::dialect::Dialect;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings for the connection pool behind a `QueryExecutor`.
///
/// No query timeout exists: statements run until the driver succeeds or
/// errors.
///
/// # Example
/// ```rust
/// use dbtsv_core::config::ConnectionSettings;
/// use dbtsv_core::dialect::Dialect;
///
/// let settings = ConnectionSettings::new(Dialect::MySql).with_max_connections(5);
/// assert!(settings.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    /// SQL dialect spoken by the store
    pub dialect: Dialect,
    /// Ceiling on simultaneously open store connections
    pub max_connections: u32,
    /// Time allowed for establishing a connection
    pub connect_timeout: Duration,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            dialect: Dialect::default(),
            max_connections: 5,
            connect_timeout: Duration::from_secs(30),
        }
    }
}

impl std::fmt::Display for ConnectionSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ConnectionSettings({}, max_connections={})",
            self.dialect, self.max_connections
        )
    }
}

impl ConnectionSettings {
    /// Creates settings with defaults for the given dialect.
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            ..Default::default()
        }
    }

    /// Builder method to set the connection ceiling.
    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    /// Builder method to set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Settings for a restore run.
    ///
    /// Integrity suspension is per session, so restore pins everything to
    /// a single connection.
    pub fn for_restore(self) -> Self {
        self.with_max_connections(1)
    }

    /// Validates the settings.
    ///
    /// # Errors
    /// Returns error if the ceiling is outside 1..=100 or the timeout is zero
    pub fn validate(&self) -> crate::Result<()> {
        if self.max_connections == 0 {
            return Err(crate::error::DbTsvError::configuration(
                "max_connections must be greater than 0",
            ));
        }

        if self.max_connections > 100 {
            return Err(crate::error::DbTsvError::configuration(
                "max_connections should not exceed 100",
            ));
        }

        if self.connect_timeout.is_zero() {
            return Err(crate::error::DbTsvError::configuration(
                "connect_timeout must be greater than 0",
            ));
        }

        Ok(())
    }
}
