//! Parsed OData query options.
//!
//! These types are produced by the request parser and consumed by the
//! compiler. Field names are kept exactly as the client wrote them; the
//! catalog matches them case-insensitively.

use serde::{Deserialize, Serialize};
use sensorthings_core::EntityType;
use std::fmt;

use crate::error::QueryError;
use crate::sql_builder::SortOrder;

/// The `$`-options of one collection request or one `$expand` level.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryOptions {
    /// `$select`; `None` selects every public field.
    #[serde(default)]
    pub select: Option<Vec<String>>,
    #[serde(default)]
    pub filter: Option<Predicate>,
    #[serde(default)]
    pub order_by: Vec<OrderByItem>,
    #[serde(default)]
    pub top: Option<u64>,
    #[serde(default)]
    pub skip: Option<u64>,
    #[serde(default)]
    pub expand: Vec<ExpandOperation>,
    #[serde(default)]
    pub count: Option<bool>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn with_filter(mut self, predicate: Predicate) -> Self {
        self.filter = Some(predicate);
        self
    }

    #[must_use]
    pub fn with_order_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.order_by.push(OrderByItem {
            field: field.into(),
            order,
        });
        self
    }

    #[must_use]
    pub fn with_top(mut self, top: u64) -> Self {
        self.top = Some(top);
        self
    }

    #[must_use]
    pub fn with_skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    #[must_use]
    pub fn with_expand(mut self, entity_type: EntityType, options: QueryOptions) -> Self {
        self.expand.push(ExpandOperation {
            entity_type,
            options,
        });
        self
    }

    #[must_use]
    pub fn with_count(mut self, count: bool) -> Self {
        self.count = Some(count);
        self
    }

    /// `$count=false` suppresses the count statement.
    pub fn count_suppressed(&self) -> bool {
        self.count == Some(false)
    }
}

/// One `$orderby` term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderByItem {
    pub field: String,
    #[serde(default)]
    pub order: SortOrder,
}

/// One `$expand` entry; nested expansions live in `options.expand`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpandOperation {
    pub entity_type: EntityType,
    #[serde(default)]
    pub options: QueryOptions,
}

/// Operators that can appear in a parsed `$filter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperator {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    And,
    Or,
    Not,
    IsNull,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Has,
}

impl FilterOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Gt => "gt",
            Self::Ge => "ge",
            Self::Lt => "lt",
            Self::Le => "le",
            Self::And => "and",
            Self::Or => "or",
            Self::Not => "not",
            Self::IsNull => "isnull",
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::Div => "div",
            Self::Mod => "mod",
            Self::Has => "has",
        }
    }

    /// SQL spelling of the operator. Arithmetic and `has` have none.
    pub fn as_sql(self) -> Result<&'static str, QueryError> {
        match self {
            Self::Eq => Ok("="),
            Self::Ne => Ok("!="),
            Self::Gt => Ok(">"),
            Self::Ge => Ok(">="),
            Self::Lt => Ok("<"),
            Self::Le => Ok("<="),
            Self::And => Ok("AND"),
            Self::Or => Ok("OR"),
            Self::Not => Ok("NOT"),
            Self::IsNull => Ok("IS NULL"),
            Self::Add | Self::Sub | Self::Mul | Self::Div | Self::Mod | Self::Has => {
                Err(QueryError::unsupported_operator(self.as_str()))
            }
        }
    }

    pub fn is_connector(self) -> bool {
        matches!(self, Self::And | Self::Or)
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Right-hand literal of a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

/// `left operator right`, where `left` is a field name or a
/// `field/key/...` path into a JSON field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub left: String,
    pub operator: FilterOperator,
    pub right: FilterValue,
}

/// A parsed `$filter` expression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Predicate {
    Comparison(Comparison),
    Binary {
        left: Box<Predicate>,
        operator: FilterOperator,
        right: Box<Predicate>,
    },
    Not(Box<Predicate>),
}

/// One element of a flattened predicate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterToken<'a> {
    Leaf(&'a Comparison),
    Connector(FilterOperator),
    Not,
}

impl Predicate {
    pub fn comparison(
        left: impl Into<String>,
        operator: FilterOperator,
        right: FilterValue,
    ) -> Self {
        Self::Comparison(Comparison {
            left: left.into(),
            operator,
            right,
        })
    }

    #[must_use]
    pub fn and(self, other: Predicate) -> Self {
        self.join(FilterOperator::And, other)
    }

    #[must_use]
    pub fn or(self, other: Predicate) -> Self {
        self.join(FilterOperator::Or, other)
    }

    #[must_use]
    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    fn join(self, operator: FilterOperator, other: Predicate) -> Self {
        Self::Binary {
            left: Box::new(self),
            operator,
            right: Box::new(other),
        }
    }

    /// Flattens the tree in order into leaves and the operators between
    /// them. Grouping is not preserved.
    pub fn split(&self) -> Vec<FilterToken<'_>> {
        let mut tokens = Vec::new();
        self.collect_tokens(&mut tokens);
        tokens
    }

    fn collect_tokens<'a>(&'a self, tokens: &mut Vec<FilterToken<'a>>) {
        match self {
            Self::Comparison(c) => tokens.push(FilterToken::Leaf(c)),
            Self::Binary {
                left,
                operator,
                right,
            } => {
                left.collect_tokens(tokens);
                tokens.push(FilterToken::Connector(*operator));
                right.collect_tokens(tokens);
            }
            Self::Not(inner) => {
                tokens.push(FilterToken::Not);
                inner.collect_tokens(tokens);
            }
        }
    }
}
