use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    /// No connection could be established. Nothing after this can succeed.
    #[error("Failed to connect to the database ({cause}): {message}")]
    Connection { cause: ConnectionCause, message: String },

    /// A statement failed after the connection was established.
    #[error("Query failed: {0}")]
    Query(#[source] sqlx::Error),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// A column held a value the record type cannot represent.
    #[error("Unexpected value in column '{column}': {message}")]
    Decode { column: String, message: String },

    #[error("Database migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),
}

impl DbError {
    pub fn is_connection(&self) -> bool {
        matches!(self, DbError::Connection { .. })
    }

    pub(crate) fn connection(cause: ConnectionCause, message: impl Into<String>) -> Self {
        DbError::Connection {
            cause,
            message: message.into(),
        }
    }

    pub(crate) fn decode(column: &str, message: impl Into<String>) -> Self {
        DbError::Decode {
            column: column.to_string(),
            message: message.into(),
        }
    }
}

/// Why a connection attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionCause {
    Unreachable,
    AuthenticationRejected,
    DriverMissing,
    InvalidConfiguration,
    Other,
}

impl fmt::Display for ConnectionCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ConnectionCause::Unreachable => "unreachable",
            ConnectionCause::AuthenticationRejected => "authentication rejected",
            ConnectionCause::DriverMissing => "driver missing",
            ConnectionCause::InvalidConfiguration => "invalid configuration",
            ConnectionCause::Other => "other",
        };
        f.write_str(text)
    }
}

/// Caller-supplied data that violates a known constraint.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("required field '{0}' is missing")]
    MissingField(&'static str),

    #[error("field '{field}' is invalid: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("unknown species id {0}")]
    UnknownSpecies(i64),

    /// A foreign-key violation reported by the database, before an accessor
    /// has narrowed it down.
    #[error("foreign key violation: {0}")]
    ForeignKey(String),
}
