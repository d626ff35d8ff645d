//! [`QueryExecutor`] on a sqlx PostgreSQL pool.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use sensorthings_query::{BuiltQuery, ExecutionError, QueryExecutor, Row, SqlValue};
use sqlx_core::column::Column;
use sqlx_core::row::Row as _;
use sqlx_core::type_info::TypeInfo;
use sqlx_core::value::ValueRef;
use sqlx_postgres::{PgArguments, PgPool, PgRow, Postgres};
use tracing::{debug, instrument, warn};

use crate::config::PostgresConfig;
use crate::error::{PostgresError, Result, is_undefined_table};
use crate::pool::{create_pool, test_connection};

/// `chrono` pattern matching the canonical timestamp rendering.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Runs compiled statements on a connection pool.
#[derive(Debug, Clone)]
pub struct PgExecutor {
    pool: PgPool,
}

impl PgExecutor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the pool and checks that the database answers.
    pub async fn connect(config: &PostgresConfig) -> Result<Self> {
        let pool = create_pool(config).await?;
        test_connection(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn rows(&self, query: &BuiltQuery) -> Result<Vec<Row>> {
        let rows = sqlx_core::query::query::<Postgres>(&query.sql)
            .bind_all_params(&query.params)
            .fetch_all(&self.pool)
            .await
            .inspect_err(|e| log_failure(e, query))?;

        rows.iter().map(decode_row).collect()
    }

    async fn count(&self, query: &BuiltQuery) -> Result<i64> {
        let count = sqlx_core::query_scalar::query_scalar::<Postgres, i64>(&query.sql)
            .bind_all_params(&query.params)
            .fetch_one(&self.pool)
            .await
            .inspect_err(|e| log_failure(e, query))?;
        Ok(count)
    }
}

#[async_trait]
impl QueryExecutor for PgExecutor {
    #[instrument(skip(self, query), fields(params = query.params.len()))]
    async fn fetch_rows(
        &self,
        query: &BuiltQuery,
    ) -> std::result::Result<Vec<Row>, ExecutionError> {
        let rows = self.rows(query).await?;
        debug!(rows = rows.len(), "fetched rows");
        Ok(rows)
    }

    #[instrument(skip(self, query), fields(params = query.params.len()))]
    async fn fetch_count(&self, query: &BuiltQuery) -> std::result::Result<i64, ExecutionError> {
        Ok(self.count(query).await?)
    }
}

fn log_failure(err: &sqlx_core::error::Error, query: &BuiltQuery) {
    if is_undefined_table(err) {
        warn!(error = %err, "table not found, check the configured query schema");
    } else {
        warn!(error = %err, sql = %query.sql, "statement failed");
    }
}

/// Converts one result row to column-name/JSON pairs.
fn decode_row(row: &PgRow) -> Result<Row> {
    let mut decoded = Row::with_capacity(row.len());
    for (index, column) in row.columns().iter().enumerate() {
        let value = decode_column(row, index, column.name(), column.type_info().name())?;
        decoded.insert(column.name().to_string(), value);
    }
    Ok(decoded)
}

fn decode_column(row: &PgRow, index: usize, name: &str, type_name: &str) -> Result<Value> {
    if row.try_get_raw(index)?.is_null() {
        return Ok(Value::Null);
    }

    let value = match type_name {
        "INT2" => Value::from(row.try_get::<i16, _>(index)?),
        "INT4" => Value::from(row.try_get::<i32, _>(index)?),
        "INT8" => Value::from(row.try_get::<i64, _>(index)?),
        "FLOAT4" => Value::from(row.try_get::<f32, _>(index)?),
        "FLOAT8" => Value::from(row.try_get::<f64, _>(index)?),
        "BOOL" => Value::Bool(row.try_get::<bool, _>(index)?),
        "TEXT" | "VARCHAR" | "NAME" | "BPCHAR" => Value::String(row.try_get::<String, _>(index)?),
        "JSON" | "JSONB" => row.try_get::<Value, _>(index)?,
        "TIMESTAMPTZ" => {
            let ts = row.try_get::<DateTime<Utc>, _>(index)?;
            Value::String(ts.format(TIMESTAMP_FORMAT).to_string())
        }
        "TIMESTAMP" => {
            let ts = row.try_get::<NaiveDateTime, _>(index)?;
            Value::String(ts.format(TIMESTAMP_FORMAT).to_string())
        }
        other => return Err(PostgresError::unsupported_type(name, other)),
    };
    Ok(value)
}

/// Binds compiler parameters in placeholder order.
trait BindAllParams<'q> {
    fn bind_all_params(self, params: &'q [SqlValue]) -> Self;
}

impl<'q> BindAllParams<'q> for sqlx_core::query::Query<'q, Postgres, PgArguments> {
    fn bind_all_params(mut self, params: &'q [SqlValue]) -> Self {
        for param in params {
            self = match param {
                SqlValue::Text(s) => self.bind(s.as_str()),
                SqlValue::Integer(i) => self.bind(*i),
                SqlValue::Float(f) => self.bind(*f),
                SqlValue::Boolean(b) => self.bind(*b),
                SqlValue::Json(s) => self.bind(s.as_str()),
                SqlValue::Null => self.bind(None::<String>),
            };
        }
        self
    }
}

impl<'q> BindAllParams<'q>
    for sqlx_core::query_scalar::QueryScalar<'q, Postgres, i64, PgArguments>
{
    fn bind_all_params(mut self, params: &'q [SqlValue]) -> Self {
        for param in params {
            self = match param {
                SqlValue::Text(s) => self.bind(s.as_str()),
                SqlValue::Integer(i) => self.bind(*i),
                SqlValue::Float(f) => self.bind(*f),
                SqlValue::Boolean(b) => self.bind(*b),
                SqlValue::Json(s) => self.bind(s.as_str()),
                SqlValue::Null => self.bind(None::<String>),
            };
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_format() {
        let ts = Utc.with_ymd_and_hms(2020, 1, 1, 12, 30, 5).unwrap();
        assert_eq!(
            ts.format(TIMESTAMP_FORMAT).to_string(),
            "2020-01-01T12:30:05.000Z"
        );
    }
}
