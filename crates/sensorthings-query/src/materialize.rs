//! Rebuilds the entity graph from flat result rows.
//!
//! Every row carries one slice of columns per query node, told apart by the
//! node prefix. Entities are keyed by their id path from the root, which
//! merges the copies a one-to-many join produces and keeps the first-seen
//! order of every level.

use std::collections::HashMap;

use indexmap::IndexMap;
use indexmap::map::Entry;
use serde_json::Value;
use sensorthings_core::Entity;

use crate::catalog::{Catalog, EntitySchema};
use crate::decode::NodeColumns;
use crate::error::MaterializeError;
use crate::executor::Row;
use crate::expansion::QueryNode;

/// Ids from the root down to an entity.
type IdPath = Vec<i64>;

struct NodeState<'t> {
    node: &'t QueryNode,
    schema: &'static EntitySchema,
    /// Position of the parent in pre-order.
    parent: Option<usize>,
    entities: IndexMap<IdPath, Entity>,
}

/// Decodes `rows` into root entities with their expansions attached.
pub fn materialize(
    catalog: &Catalog,
    tree: &QueryNode,
    rows: &[Row],
) -> Result<Vec<Entity>, MaterializeError> {
    let nodes = tree.pre_order();
    let relations = tree.relation_map();
    let mut positions: HashMap<usize, usize> = HashMap::new();
    let mut by_prefix: HashMap<String, usize> = HashMap::new();
    let mut states = Vec::with_capacity(nodes.len());

    for (position, node) in nodes.into_iter().enumerate() {
        positions.insert(node.index, position);
        by_prefix.insert(node.prefix.to_ascii_lowercase(), position);
        states.push(NodeState {
            node,
            schema: catalog.entity(node.entity_type)?,
            parent: relations
                .get(&node.index)
                .and_then(|index| positions.get(index).copied()),
            entities: IndexMap::new(),
        });
    }

    for row in rows {
        let columns = split_row(row, &states, &by_prefix);
        let mut paths: Vec<Option<IdPath>> = vec![None; states.len()];

        for (position, state) in states.iter_mut().enumerate() {
            let parent_path = match state.parent {
                Some(parent) => match &paths[parent] {
                    Some(path) => path.clone(),
                    None => continue,
                },
                None => Vec::new(),
            };
            let node_columns = &columns[position];
            if node_columns.is_null() {
                continue;
            }

            let Some(id) = node_columns.integer("id")? else {
                return Err(MaterializeError::unexpected(
                    format!("{}_id", state.schema.table),
                    "a non-null id",
                    &Value::Null,
                ));
            };
            let mut path = parent_path;
            path.push(id);

            if let Entry::Vacant(slot) = state.entities.entry(path.clone()) {
                let mut entity = (state.schema.decode)(node_columns)?;
                for child in &state.node.children {
                    entity.mark_expanded(child.entity_type)?;
                }
                slot.insert(entity);
            }
            paths[position] = Some(path);
        }
    }

    // Deepest levels first, so a child is complete when it is attached.
    for position in (1..states.len()).rev() {
        let Some(parent) = states[position].parent else {
            continue;
        };
        let children = std::mem::take(&mut states[position].entities);
        for (path, child) in children {
            let parent_path = &path[..path.len() - 1];
            if let Some(parent_entity) = states[parent].entities.get_mut(parent_path) {
                parent_entity.attach(child)?;
            }
        }
    }

    let roots = states
        .into_iter()
        .next()
        .map(|root| root.entities.into_values().collect())
        .unwrap_or_default();
    Ok(roots)
}

/// Splits a row into per-node columns, keyed by lowercase prefix.
fn split_row<'r>(
    row: &'r Row,
    states: &[NodeState<'_>],
    by_prefix: &HashMap<String, usize>,
) -> Vec<NodeColumns<'r>> {
    let mut columns: Vec<NodeColumns<'r>> = states
        .iter()
        .map(|state| NodeColumns::new(state.schema.table))
        .collect();

    for (name, value) in row {
        let Some((prefix, alias)) = name.split_once('_') else {
            continue;
        };
        if let Some(&position) = by_prefix.get(&prefix.to_ascii_lowercase()) {
            columns[position].insert(alias, value);
        }
    }
    columns
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::odata::QueryOptions;
    use sensorthings_core::EntityType;
    use serde_json::json;

    fn row(values: &[(&str, Value)]) -> Row {
        values
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn thing_with_datastreams() -> QueryNode {
        let options = QueryOptions::new().with_expand(EntityType::Datastream, QueryOptions::new());
        QueryNode::build(EntityType::Thing, &options).unwrap()
    }

    #[test]
    fn test_rows_sharing_a_root_are_merged() {
        let catalog = Catalog::new("v1").unwrap();
        let tree = thing_with_datastreams();
        let rows = vec![
            row(&[
                ("a_thing_id", json!(1)),
                ("a_thing_name", json!("Kitchen")),
                ("b_datastream_id", json!(10)),
                ("b_datastream_name", json!("Temperature")),
            ]),
            row(&[
                ("a_thing_id", json!(1)),
                ("a_thing_name", json!("Kitchen")),
                ("b_datastream_id", json!(11)),
                ("b_datastream_name", json!("Humidity")),
            ]),
        ];

        let entities = materialize(&catalog, &tree, &rows).unwrap();
        assert_eq!(entities.len(), 1);
        let Entity::Thing(thing) = &entities[0] else {
            panic!("expected thing");
        };
        let datastreams = thing.datastreams.as_ref().unwrap();
        let ids: Vec<_> = datastreams.iter().map(|d| d.id.unwrap()).collect();
        assert_eq!(ids, vec![10, 11]);
    }

    #[test]
    fn test_missing_children_give_empty_collection() {
        let catalog = Catalog::new("v1").unwrap();
        let tree = thing_with_datastreams();
        let rows = vec![row(&[
            ("A_THING_ID", json!(2)),
            ("B_DATASTREAM_ID", Value::Null),
            ("B_DATASTREAM_NAME", Value::Null),
        ])];

        let entities = materialize(&catalog, &tree, &rows).unwrap();
        let Entity::Thing(thing) = &entities[0] else {
            panic!("expected thing");
        };
        assert_eq!(thing.datastreams, Some(Vec::new()));
    }

    #[test]
    fn test_nested_singular_child() {
        let catalog = Catalog::new("v1").unwrap();
        let options = QueryOptions::new().with_expand(
            EntityType::Datastream,
            QueryOptions::new().with_expand(EntityType::Thing, QueryOptions::new()),
        );
        let tree = QueryNode::build(EntityType::Observation, &options).unwrap();
        let rows = vec![
            row(&[
                ("a_observation_id", json!(100)),
                ("a_observation_result", json!(21.5)),
                ("b_datastream_id", json!(10)),
                ("c_thing_id", json!(1)),
                ("c_thing_name", json!("Kitchen")),
            ]),
            row(&[
                ("a_observation_id", json!(99)),
                ("a_observation_result", json!(21.0)),
                ("b_datastream_id", json!(10)),
                ("c_thing_id", json!(1)),
                ("c_thing_name", json!("Kitchen")),
            ]),
        ];

        let entities = materialize(&catalog, &tree, &rows).unwrap();
        let ids: Vec<_> = entities.iter().map(|e| e.id().unwrap()).collect();
        assert_eq!(ids, vec![100, 99]);
        for entity in &entities {
            let Entity::Observation(o) = entity else {
                panic!("expected observation");
            };
            let datastream = o.datastream.as_ref().unwrap();
            assert_eq!(datastream.id, Some(10));
            assert_eq!(
                datastream.thing.as_ref().unwrap().name.as_deref(),
                Some("Kitchen")
            );
        }
    }

    #[test]
    fn test_sibling_expansions_attach_to_their_own_parent() {
        let catalog = Catalog::new("v1").unwrap();
        let options = QueryOptions::new()
            .with_expand(
                EntityType::Datastream,
                QueryOptions::new().with_expand(EntityType::Sensor, QueryOptions::new()),
            )
            .with_expand(EntityType::Location, QueryOptions::new());
        let tree = QueryNode::build(EntityType::Thing, &options).unwrap();
        let rows = vec![
            row(&[
                ("a_thing_id", json!(1)),
                ("b_datastream_id", json!(10)),
                ("c_sensor_id", json!(5)),
                ("d_location_id", json!(7)),
            ]),
            row(&[
                ("a_thing_id", json!(1)),
                ("b_datastream_id", json!(10)),
                ("c_sensor_id", json!(5)),
                ("d_location_id", json!(8)),
            ]),
        ];

        let entities = materialize(&catalog, &tree, &rows).unwrap();
        let Entity::Thing(thing) = &entities[0] else {
            panic!("expected thing");
        };
        let datastreams = thing.datastreams.as_ref().unwrap();
        assert_eq!(datastreams.len(), 1);
        assert_eq!(datastreams[0].sensor.as_ref().unwrap().id, Some(5));
        let locations: Vec<_> = thing
            .locations
            .as_ref()
            .unwrap()
            .iter()
            .map(|l| l.id.unwrap())
            .collect();
        assert_eq!(locations, vec![7, 8]);
    }

    #[test]
    fn test_prefix_is_not_confused_with_longer_prefix() {
        let catalog = Catalog::new("v1").unwrap();
        let tree = thing_with_datastreams();
        let rows = vec![row(&[
            ("a_thing_id", json!(1)),
            ("aa_thing_id", json!(2)),
            ("b_datastream_id", Value::Null),
        ])];
        let entities = materialize(&catalog, &tree, &rows).unwrap();
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].id(), Some(1));
    }

    #[test]
    fn test_empty_result() {
        let catalog = Catalog::new("v1").unwrap();
        let tree = thing_with_datastreams();
        assert!(materialize(&catalog, &tree, &[]).unwrap().is_empty());
    }

    #[test]
    fn test_missing_root_id_is_an_error() {
        let catalog = Catalog::new("v1").unwrap();
        let tree = QueryNode::build(EntityType::Thing, &QueryOptions::new()).unwrap();
        let rows = vec![row(&[("a_thing_name", json!("x"))])];
        let err = materialize(&catalog, &tree, &rows).unwrap_err();
        assert!(matches!(err, MaterializeError::UnexpectedValue { .. }));
    }
}
