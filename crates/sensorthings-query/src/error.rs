use sensorthings_core::{CoreError, EntityType};
use thiserror::Error;

/// Errors that make a query impossible to compile.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("No relation to get {get} by {by}")]
    UnresolvableRelation { get: EntityType, by: EntityType },

    #[error("Operator '{0}' is not supported")]
    UnsupportedOperator(String),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Too many expansions: {count} nodes exceed the {max} available prefixes")]
    TooManyExpansions { count: usize, max: usize },

    #[error("{0} has no table of its own to query")]
    NotQueryable(EntityType),
}

impl QueryError {
    #[must_use]
    pub fn unresolvable(get: EntityType, by: EntityType) -> Self {
        Self::UnresolvableRelation { get, by }
    }

    #[must_use]
    pub fn unsupported_operator(op: impl Into<String>) -> Self {
        Self::UnsupportedOperator(op.into())
    }

    #[must_use]
    pub fn invalid_identifier(name: impl Into<String>) -> Self {
        Self::InvalidIdentifier(name.into())
    }
}

/// Errors raised while turning result rows into entities.
#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("Column '{column}' does not hold valid JSON: {message}")]
    InvalidJson { column: String, message: String },

    #[error("Column '{column}' holds {found}, expected {expected}")]
    UnexpectedValue {
        column: String,
        expected: &'static str,
        found: String,
    },

    #[error(transparent)]
    Model(#[from] CoreError),

    #[error(transparent)]
    Query(#[from] QueryError),
}

impl MaterializeError {
    #[must_use]
    pub fn invalid_json(column: impl Into<String>, err: &serde_json::Error) -> Self {
        Self::InvalidJson {
            column: column.into(),
            message: err.to_string(),
        }
    }

    #[must_use]
    pub fn unexpected(
        column: impl Into<String>,
        expected: &'static str,
        found: &serde_json::Value,
    ) -> Self {
        Self::UnexpectedValue {
            column: column.into(),
            expected,
            found: found.to_string(),
        }
    }
}
