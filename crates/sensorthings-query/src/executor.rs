//! Contract between the reader and a database backend.

use async_trait::async_trait;
use indexmap::IndexMap;
use thiserror::Error;

use crate::sql_builder::BuiltQuery;

/// One result row: column alias to value, in select order.
pub type Row = IndexMap<String, serde_json::Value>;

/// A statement failed to run or its result could not be read.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Column '{column}' has unsupported type {type_name}")]
    UnsupportedColumn { column: String, type_name: String },

    #[error("Executor unavailable: {0}")]
    Unavailable(String),
}

impl ExecutionError {
    #[must_use]
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database(message.into())
    }

    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }
}

/// Runs compiled statements.
///
/// Parameters are positional and bind to `$1, $2, ...` in order.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn fetch_rows(&self, query: &BuiltQuery) -> Result<Vec<Row>, ExecutionError>;

    /// Runs a `SELECT COUNT(*)` statement.
    async fn fetch_count(&self, query: &BuiltQuery) -> Result<i64, ExecutionError>;
}
