//! Compiles query options into one SQL statement per request.
//!
//! The data statement has two levels. An inner key query picks the root ids
//! (scope, filter, order and paging applied to the root table alone). The
//! outer query selects the fields of those roots and attaches every
//! expansion level through a `LEFT JOIN LATERAL` subquery with its own
//! filter, order and limit, so child rows never inflate the root page.

use sensorthings_core::EntityType;
use tracing::debug;

use crate::catalog::{Catalog, EntitySchema, FieldDef, table_name};
use crate::error::QueryError;
use crate::expansion::QueryNode;
use crate::filter;
use crate::odata::{OrderByItem, QueryOptions};
use crate::sql_builder::{BuiltQuery, Pagination, SortOrder, SqlBuilder, SqlValue};

/// Which rows of the requested entity type a statement reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// The whole collection, e.g. `/Things`.
    Collection,
    /// One entity by id, e.g. `/Things(1)`.
    Entity(i64),
    /// Entities related to another one, e.g. `/Things(1)/Datastreams`.
    Related { from: EntityType, id: i64 },
}

/// SQL, its parameters and the expansion tree the rows are decoded with.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub query: BuiltQuery,
    pub tree: QueryNode,
}

#[derive(Debug, Clone, Copy)]
pub struct QueryCompiler<'a> {
    catalog: &'a Catalog,
    max_top: u64,
}

impl<'a> QueryCompiler<'a> {
    /// `max_top` limits expansion levels that do not set `$top`.
    pub fn new(catalog: &'a Catalog, max_top: u64) -> Self {
        Self { catalog, max_top }
    }

    pub fn compile_select(
        &self,
        entity_type: EntityType,
        scope: Scope,
        options: &QueryOptions,
    ) -> Result<CompiledQuery, QueryError> {
        let tree = QueryNode::build(entity_type, options)?;
        let schema = self.catalog.entity(entity_type)?;
        let mut builder = SqlBuilder::new();

        let mut columns = Vec::new();
        for node in tree.pre_order() {
            self.push_columns(node, &mut columns)?;
        }

        // Placeholders follow text order: lateral joins, then the key query.
        let mut from = vec![self.catalog.table_for(entity_type)];
        self.push_expand_joins(&tree, &mut from, &mut builder)?;

        let keys = self.key_query(schema, scope, &tree.options, &mut builder)?;
        let order = self.outer_order(schema, &tree)?;

        let sql = format!(
            "SELECT {} FROM {} WHERE {}.id IN ({keys}) ORDER BY {order}",
            columns.join(", "),
            from.join(" "),
            schema.table,
        );
        debug!(
            entity_type = %entity_type,
            nodes = tree.node_count(),
            params = builder.param_count(),
            sql = %sql,
            "compiled select"
        );

        Ok(CompiledQuery {
            query: builder.finish(sql),
            tree,
        })
    }

    /// Count of the rows the unpaged root level would return.
    ///
    /// Returns `None` when `$count=false`.
    pub fn compile_count(
        &self,
        entity_type: EntityType,
        scope: Scope,
        options: &QueryOptions,
    ) -> Result<Option<BuiltQuery>, QueryError> {
        if options.count_suppressed() {
            return Ok(None);
        }

        let schema = self.catalog.entity(entity_type)?;
        let mut builder = SqlBuilder::new();
        let mut sql = format!("SELECT COUNT(*) FROM {}", self.catalog.table_for(entity_type));
        let (join, scope) = self.scope(schema, scope, &mut builder)?;
        if let Some(join) = join {
            sql = format!("{sql} {join}");
        }
        let conditions = self.conditions(schema, scope, options, &mut builder)?;
        if let Some(clause) = SqlBuilder::build_where_clause(&conditions) {
            sql = format!("{sql} WHERE {clause}");
        }

        debug!(
            entity_type = %entity_type,
            params = builder.param_count(),
            sql = %sql,
            "compiled count"
        );
        Ok(Some(builder.finish(sql)))
    }

    /// Root order, then the ordinal of every expansion level in pre-order,
    /// so each collection keeps its own `$orderby`.
    fn outer_order(&self, schema: &EntitySchema, tree: &QueryNode) -> Result<String, QueryError> {
        let mut terms = vec![order_by(schema, &tree.options.order_by)];
        for node in tree.pre_order().into_iter().skip(1) {
            let child = self.catalog.entity(node.entity_type)?;
            terms.push(format!("{}_{}.{}", node.prefix, child.table, ordinal_alias(child)));
        }
        Ok(terms.join(", "))
    }

    /// `SELECT root.id FROM root <navigate join> WHERE ... ORDER BY ... OFFSET ...`
    fn key_query(
        &self,
        schema: &EntitySchema,
        scope: Scope,
        options: &QueryOptions,
        builder: &mut SqlBuilder,
    ) -> Result<String, QueryError> {
        let mut parts = vec![format!(
            "SELECT {}.id FROM {}",
            schema.table,
            self.catalog.table_for(schema.entity_type)
        )];
        let (join, scope) = self.scope(schema, scope, builder)?;
        parts.extend(join);

        let conditions = self.conditions(schema, scope, options, builder)?;
        if let Some(clause) = SqlBuilder::build_where_clause(&conditions) {
            parts.push(format!("WHERE {clause}"));
        }
        parts.push(format!("ORDER BY {}", order_by(schema, &options.order_by)));
        parts.push(Pagination::new(options.top, options.skip.unwrap_or(0)).to_sql());
        Ok(parts.join(" "))
    }

    /// Navigation join, if any, and the condition pinning the scope id.
    fn scope(
        &self,
        schema: &EntitySchema,
        scope: Scope,
        builder: &mut SqlBuilder,
    ) -> Result<(Option<String>, Option<String>), QueryError> {
        match scope {
            Scope::Collection => Ok((None, None)),
            Scope::Entity(id) => {
                let placeholder = builder.placeholder(SqlValue::Integer(id));
                Ok((None, Some(format!("{}.id = {placeholder}", schema.table))))
            }
            Scope::Related { from, id } => {
                let join = self.navigate_join(schema.entity_type, from)?;
                let from_table = table_name(from);
                let placeholder = builder.placeholder(SqlValue::Integer(id));
                Ok((
                    Some(join),
                    Some(format!("{from_table}.{from_table}_id = {placeholder}")),
                ))
            }
        }
    }

    /// Scope condition plus the parenthesized root filter.
    fn conditions(
        &self,
        schema: &EntitySchema,
        scope: Option<String>,
        options: &QueryOptions,
        builder: &mut SqlBuilder,
    ) -> Result<Vec<String>, QueryError> {
        let mut conditions: Vec<String> = scope.into_iter().collect();
        if let Some(filter) = self.filter(schema.entity_type, options, builder)? {
            if conditions.is_empty() {
                conditions.push(filter);
            } else {
                conditions.push(format!("({filter})"));
            }
        }
        Ok(conditions)
    }

    fn filter(
        &self,
        entity_type: EntityType,
        options: &QueryOptions,
        builder: &mut SqlBuilder,
    ) -> Result<Option<String>, QueryError> {
        match &options.filter {
            Some(predicate) => filter::translate(self.catalog, entity_type, predicate, builder),
            None => Ok(None),
        }
    }

    /// `INNER JOIN LATERAL (SELECT from.id AS from_id FROM from <join>) AS from ON true`
    fn navigate_join(&self, root: EntityType, from: EntityType) -> Result<String, QueryError> {
        let from_schema = self.catalog.entity(from)?;
        let join = self.catalog.resolve(from, root, None)?;
        let id = from_schema.id_field();
        Ok(format!(
            "INNER JOIN LATERAL (SELECT {} AS {} FROM {} {}) AS {} ON true",
            from_schema.expression(id),
            from_schema.alias(id),
            self.catalog.table_for(from),
            join.to_sql(None),
            from_schema.table,
        ))
    }

    fn push_expand_joins(
        &self,
        parent: &QueryNode,
        joins: &mut Vec<String>,
        builder: &mut SqlBuilder,
    ) -> Result<(), QueryError> {
        for child in &parent.children {
            joins.push(self.expand_join(parent, child, builder)?);
            self.push_expand_joins(child, joins, builder)?;
        }
        Ok(())
    }

    fn expand_join(
        &self,
        parent: &QueryNode,
        child: &QueryNode,
        builder: &mut SqlBuilder,
    ) -> Result<String, QueryError> {
        let schema = self.catalog.entity(child.entity_type)?;
        let parent_prefix = (!parent.is_root()).then_some(parent.prefix);
        let join = self
            .catalog
            .resolve(child.entity_type, parent.entity_type, parent_prefix)?;

        let mut fields = selected_fields(schema, &child.options);
        for key in schema.expand_keys {
            if let Some(field) = schema.any_field(key) {
                if !fields.contains(&field) {
                    fields.push(field);
                }
            }
        }
        let order = order_by(schema, &child.options.order_by);
        let mut select: Vec<String> = fields
            .iter()
            .map(|field| format!("{} AS {}", schema.expression(field), schema.alias(field)))
            .collect();
        select.push(format!(
            "row_number() OVER (ORDER BY {order}) AS {}",
            ordinal_alias(schema)
        ));

        let filter = self
            .filter(child.entity_type, &child.options, builder)?
            .map(|filter| format!("({filter})"));
        let paging = Pagination::new(
            Some(child.options.top.unwrap_or(self.max_top)),
            child.options.skip.unwrap_or(0),
        );

        Ok(format!(
            "LEFT JOIN LATERAL (SELECT {} FROM {} {} ORDER BY {order} {}) AS {}_{} ON true",
            select.join(", "),
            self.catalog.table_for(child.entity_type),
            join.to_sql(filter.as_deref()),
            paging.to_sql(),
            child.prefix,
            schema.table,
        ))
    }

    /// Outer select list entries of one node, aliased `{prefix}_{table}_{column}`.
    fn push_columns(&self, node: &QueryNode, columns: &mut Vec<String>) -> Result<(), QueryError> {
        let schema = self.catalog.entity(node.entity_type)?;
        for field in selected_fields(schema, &node.options) {
            let alias = schema.alias(field);
            let source = if node.is_root() {
                schema.expression(field)
            } else {
                format!("{}_{}.{alias}", node.prefix, schema.table)
            };
            columns.push(format!("{source} AS {}_{alias}", node.prefix));
        }
        Ok(())
    }
}

/// `$select` fields in request order with `id` first; every public field
/// without `$select`. Unknown names are skipped.
fn selected_fields(schema: &EntitySchema, options: &QueryOptions) -> Vec<&'static FieldDef> {
    let names = match &options.select {
        Some(names) if !names.is_empty() => names,
        _ => return schema.fields.iter().collect(),
    };

    let mut fields = vec![schema.id_field()];
    for name in names {
        if let Some(field) = schema.public_field(name) {
            if !fields.contains(&field) {
                fields.push(field);
            }
        }
    }
    fields
}

/// Position of a row within its expansion level, e.g. `datastream_rn`.
fn ordinal_alias(schema: &EntitySchema) -> String {
    format!("{}_rn", schema.table)
}

fn order_by(schema: &EntitySchema, items: &[OrderByItem]) -> String {
    let terms: Vec<String> = items
        .iter()
        .filter_map(|item| {
            let field = schema.public_field(&item.field)?;
            Some(format!("{} {}", schema.expression(field), item.order.as_sql()))
        })
        .collect();

    if terms.is_empty() {
        return format!(
            "{} {}",
            schema.expression(schema.id_field()),
            SortOrder::Desc.as_sql()
        );
    }
    terms.join(", ")
}
