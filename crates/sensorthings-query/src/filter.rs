//! `$filter` to SQL translation.
//!
//! The predicate tree is flattened into leaves and the connectors between
//! them and emitted left to right. No grouping is added, so the result
//! should be parenthesized before it is ANDed with other conditions.
//!
//! # Examples
//!
//! ```text
//! name eq 'Room 1'                    thing.name = $1
//! properties/owner eq 'me'            thing.properties ->> 'owner' = $1
//! encodingType eq 'application/pdf'   sensor.encodingtype = $1        ($1 = 2)
//! result gt 20                        observation.data -> 'result' > $1::jsonb
//! ```

use serde_json::Value;
use sensorthings_core::{EncodingType, EntityType, ObservationType, normalize_timestamp};
use tracing::debug;

use crate::catalog::{Catalog, EntitySchema, FieldDef};
use crate::error::QueryError;
use crate::odata::{Comparison, FilterOperator, FilterToken, FilterValue, Predicate};
use crate::sql_builder::{JsonbPath, SqlBuilder, SqlValue};

/// Translates `predicate` against the fields of `entity_type`.
///
/// Returns `None` when every leaf was dropped for naming an unknown field.
pub fn translate(
    catalog: &Catalog,
    entity_type: EntityType,
    predicate: &Predicate,
    builder: &mut SqlBuilder,
) -> Result<Option<String>, QueryError> {
    let schema = catalog.entity(entity_type)?;

    let mut parts: Vec<String> = Vec::new();
    let mut connector: Option<FilterOperator> = None;
    let mut negate = false;

    for token in predicate.split() {
        match token {
            FilterToken::Connector(op) => {
                if !op.is_connector() {
                    return Err(QueryError::unsupported_operator(op.as_str()));
                }
                connector = Some(op);
            }
            FilterToken::Not => negate = !negate,
            FilterToken::Leaf(comparison) => {
                if let Some(condition) = translate_leaf(schema, comparison, builder)? {
                    if !parts.is_empty() {
                        let op = connector.unwrap_or(FilterOperator::And);
                        parts.push(op.as_sql()?.to_string());
                    }
                    if negate {
                        parts.push(format!("NOT {condition}"));
                    } else {
                        parts.push(condition);
                    }
                }
                connector = None;
                negate = false;
            }
        }
    }

    if parts.is_empty() {
        return Ok(None);
    }
    Ok(Some(parts.join(" ")))
}

fn translate_leaf(
    schema: &EntitySchema,
    comparison: &Comparison,
    builder: &mut SqlBuilder,
) -> Result<Option<String>, QueryError> {
    let operator = comparison.operator;
    if operator.is_connector() || operator == FilterOperator::Not {
        return Err(QueryError::unsupported_operator(operator.as_str()));
    }
    let sql_operator = operator.as_sql()?;

    let (name, path) = match comparison.left.split_once('/') {
        Some((name, path)) => (name, Some(path)),
        None => (comparison.left.as_str(), None),
    };
    let Some(field) = schema.public_field(name) else {
        debug!(
            entity_type = %schema.entity_type,
            field = %comparison.left,
            "dropping filter on unknown field"
        );
        return Ok(None);
    };

    let left = match path {
        Some(path) => {
            let Some(base) = schema.json_base(field) else {
                debug!(field = %comparison.left, "dropping path filter on a non-JSON field");
                return Ok(None);
            };
            JsonbPath::parse(path)?.to_accessor(&base, true)
        }
        None => schema.expression(field),
    };

    if operator == FilterOperator::IsNull {
        return Ok(Some(format!("{left} {sql_operator}")));
    }

    let right = if path.is_none() && field.is_json() {
        let placeholder = builder.placeholder(SqlValue::Json(json_operand(&comparison.right)));
        format!("{placeholder}::jsonb")
    } else if path.is_some() {
        builder.placeholder(text_operand(&comparison.right))
    } else {
        builder.placeholder(coerce(field, &comparison.right))
    };

    Ok(Some(format!("{left} {sql_operator} {right}")))
}

fn strip_quotes(value: &str) -> String {
    value.replace('\'', "")
}

/// Maps a literal onto the storage representation of `field`.
///
/// Values that cannot be converted are passed through unchanged.
fn coerce(field: &FieldDef, value: &FilterValue) -> SqlValue {
    let text = match value {
        FilterValue::Text(text) => strip_quotes(text),
        FilterValue::Integer(i) => return SqlValue::Integer(*i),
        FilterValue::Float(f) => return SqlValue::Float(*f),
        FilterValue::Boolean(b) => return SqlValue::Boolean(*b),
        FilterValue::Null => return SqlValue::Null,
    };

    match field.column {
        "encodingtype" => match EncodingType::from_value(&text) {
            Ok(encoding) => SqlValue::Integer(encoding.code),
            Err(_) => SqlValue::Text(text),
        },
        "observationtype" => match ObservationType::from_value(&text) {
            Ok(observation_type) => SqlValue::Integer(observation_type.code),
            Err(_) => SqlValue::Text(text),
        },
        "phenomenontime" | "resulttime" | "time" => {
            SqlValue::Text(normalize_timestamp(&text).unwrap_or(text))
        }
        _ => SqlValue::Text(text),
    }
}

/// `->>` extractions are text, so every operand is compared as text.
fn text_operand(value: &FilterValue) -> SqlValue {
    match value {
        FilterValue::Text(text) => SqlValue::Text(strip_quotes(text)),
        FilterValue::Integer(i) => SqlValue::Text(i.to_string()),
        FilterValue::Float(f) => SqlValue::Text(f.to_string()),
        FilterValue::Boolean(b) => SqlValue::Text(b.to_string()),
        FilterValue::Null => SqlValue::Null,
    }
}

fn json_operand(value: &FilterValue) -> String {
    let value = match value {
        FilterValue::Text(text) => Value::String(strip_quotes(text)),
        FilterValue::Integer(i) => Value::from(*i),
        FilterValue::Float(f) => Value::from(*f),
        FilterValue::Boolean(b) => Value::Bool(*b),
        FilterValue::Null => Value::Null,
    };
    value.to_string()
}
