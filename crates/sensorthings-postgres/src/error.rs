//! Error types for the PostgreSQL executor.

use sensorthings_query::{ExecutionError, QueryError};
use sqlx_core::error::Error as SqlxError;

/// PostgreSQL error code for undefined table (42P01).
pub const PG_UNDEFINED_TABLE: &str = "42P01";

/// Checks if a sqlx error has a specific PostgreSQL error code.
pub fn has_pg_error_code(err: &SqlxError, code: &str) -> bool {
    if let SqlxError::Database(db_err) = err {
        db_err.code().as_deref() == Some(code)
    } else {
        false
    }
}

/// Checks if a sqlx error is "undefined table" (42P01), which usually
/// means the configured schema is wrong.
pub fn is_undefined_table(err: &SqlxError) -> bool {
    has_pg_error_code(err, PG_UNDEFINED_TABLE)
}

/// Errors specific to the PostgreSQL executor.
#[derive(Debug, thiserror::Error)]
pub enum PostgresError {
    /// Database connection or statement error.
    #[error("Database connection error: {0}")]
    Connection(#[from] sqlx_core::error::Error),

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Pool error.
    #[error("Pool error: {message}")]
    Pool { message: String },

    /// A result column whose type has no JSON mapping.
    #[error("Column '{column}' has unsupported type {type_name}")]
    UnsupportedType { column: String, type_name: String },
}

impl PostgresError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a new pool error.
    #[must_use]
    pub fn pool(message: impl Into<String>) -> Self {
        Self::Pool {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn unsupported_type(column: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::UnsupportedType {
            column: column.into(),
            type_name: type_name.into(),
        }
    }
}

impl From<QueryError> for PostgresError {
    fn from(err: QueryError) -> Self {
        Self::config(err.to_string())
    }
}

impl From<PostgresError> for ExecutionError {
    fn from(err: PostgresError) -> Self {
        match err {
            PostgresError::Connection(e) => ExecutionError::database(e.to_string()),
            PostgresError::Config { message } => {
                ExecutionError::unavailable(format!("Configuration error: {message}"))
            }
            PostgresError::Pool { message } => {
                ExecutionError::unavailable(format!("Pool error: {message}"))
            }
            PostgresError::UnsupportedType { column, type_name } => {
                ExecutionError::UnsupportedColumn { column, type_name }
            }
        }
    }
}

/// Result type alias for PostgreSQL operations.
pub type Result<T> = std::result::Result<T, PostgresError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PostgresError::config("invalid URL");
        assert!(err.to_string().contains("Configuration error"));

        let err = PostgresError::pool("pool exhausted");
        assert!(err.to_string().contains("Pool error"));

        let err = PostgresError::unsupported_type("a_thing_x", "INTERVAL");
        assert_eq!(
            err.to_string(),
            "Column 'a_thing_x' has unsupported type INTERVAL"
        );
    }

    #[test]
    fn test_conversion_to_execution_error() {
        let err: ExecutionError = PostgresError::pool("timed out").into();
        assert!(matches!(err, ExecutionError::Unavailable(_)));

        let err: ExecutionError = PostgresError::unsupported_type("c", "INTERVAL").into();
        assert!(matches!(
            err,
            ExecutionError::UnsupportedColumn { ref type_name, .. } if type_name == "INTERVAL"
        ));

        let err: ExecutionError = PostgresError::Connection(SqlxError::PoolTimedOut).into();
        assert!(matches!(err, ExecutionError::Database(_)));
    }

    #[test]
    fn test_query_error_is_a_config_error() {
        let err: PostgresError = QueryError::invalid_identifier("v1;").into();
        assert!(matches!(err, PostgresError::Config { .. }));
    }

    #[test]
    fn test_pg_error_code_on_non_database_error() {
        assert!(!is_undefined_table(&SqlxError::PoolTimedOut));
    }
}
