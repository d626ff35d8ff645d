//! SQL building blocks shared by the compiler and the filter translator.
//!
//! All caller-supplied values travel as bind parameters. The only text
//! inlined into statements comes from the static catalog, validated JSON
//! path segments and integer paging values.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::QueryError;

// ============================================================================
// JSONB Path Abstraction
// ============================================================================

/// A validated path into a JSON document column.
///
/// Segments are restricted to alphanumerics and underscores, so they can be
/// inlined as quoted keys.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonbPath {
    segments: Vec<String>,
}

impl JsonbPath {
    /// Create a new JSONB path from segments.
    ///
    /// Returns an error if any segment contains invalid characters.
    pub fn new(segments: Vec<String>) -> Result<Self, QueryError> {
        for segment in &segments {
            validate_identifier(segment)?;
        }
        Ok(Self { segments })
    }

    /// Parses a `/`-separated navigation path such as `properties/owner/name`.
    pub fn parse(path: &str) -> Result<Self, QueryError> {
        Self::new(path.split('/').map(str::to_string).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Build the accessor for this path on top of `base`.
    pub fn to_accessor(&self, base: &str, as_text: bool) -> String {
        build_jsonb_accessor(base, &self.segments, as_text)
    }
}

/// Validate an identifier (schema name, JSON key).
///
/// Only allows alphanumeric characters and underscores.
pub fn validate_identifier(name: &str) -> Result<(), QueryError> {
    if name.is_empty() {
        return Err(QueryError::invalid_identifier("Empty identifier"));
    }

    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(QueryError::invalid_identifier(name));
    }

    Ok(())
}

/// Build a JSONB accessor chain from path segments.
///
/// For example: `["owner", "name"]` on `thing.properties` becomes
/// `thing.properties -> 'owner' ->> 'name'`.
pub fn build_jsonb_accessor(base: &str, path: &[String], as_text: bool) -> String {
    let mut result = base.to_string();

    for (i, segment) in path.iter().enumerate() {
        if i == path.len() - 1 && as_text {
            result = format!("{result} ->> '{segment}'");
        } else {
            result = format!("{result} -> '{segment}'");
        }
    }

    result
}

// ============================================================================
// Values and parameters
// ============================================================================

/// SQL value types for parameterized queries.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Json(String),
    Null,
}

/// Accumulates bind parameters for one statement.
///
/// Placeholders are numbered in push order, so fragments must be rendered
/// in the order they appear in the final SQL text.
#[derive(Debug, Default)]
pub struct SqlBuilder {
    params: Vec<SqlValue>,
}

impl SqlBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter and return its placeholder number.
    pub fn add_param(&mut self, value: SqlValue) -> usize {
        self.params.push(value);
        self.params.len()
    }

    /// Add a parameter and return its `$n` placeholder.
    pub fn placeholder(&mut self, value: SqlValue) -> String {
        format!("${}", self.add_param(value))
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    /// Joins conditions with AND.
    ///
    /// Returns `None` if there are no conditions.
    pub fn build_where_clause(conditions: &[String]) -> Option<String> {
        if conditions.is_empty() {
            return None;
        }
        Some(conditions.join(" AND "))
    }

    pub fn finish(self, sql: String) -> BuiltQuery {
        BuiltQuery {
            sql,
            params: self.params,
        }
    }
}

/// A built SQL query with parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl fmt::Display for BuiltQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql)
    }
}

// ============================================================================
// Sort and Pagination
// ============================================================================

/// Sort order for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Pagination settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pagination {
    pub limit: Option<u64>,
    pub offset: u64,
}

impl Pagination {
    pub fn new(limit: Option<u64>, offset: u64) -> Self {
        Self { limit, offset }
    }

    /// Renders `LIMIT n OFFSET m`, or only `OFFSET m` without a limit.
    pub fn to_sql(self) -> String {
        match self.limit {
            Some(limit) => format!("LIMIT {limit} OFFSET {}", self.offset),
            None => format!("OFFSET {}", self.offset),
        }
    }
}
