//! Expansion tree: one node per requested entity level.
//!
//! Nodes are numbered in pre-order starting at the root (0). Each index owns
//! one alias prefix from [`PREFIXES`], which keeps the columns of every level
//! apart in the single flat result set.

use indexmap::IndexMap;
use sensorthings_core::EntityType;

use crate::error::QueryError;
use crate::odata::{ExpandOperation, QueryOptions};

/// Alias prefixes in index order: `A`..`Z`, `AA`..`AZ`, `BA`..`BZ`.
pub const PREFIXES: [&str; 78] = [
    "A", "B", "C", "D", "E", "F", "G", "H", "I", "J", "K", "L", "M", "N", "O", "P", "Q", "R", "S",
    "T", "U", "V", "W", "X", "Y", "Z", "AA", "AB", "AC", "AD", "AE", "AF", "AG", "AH", "AI", "AJ",
    "AK", "AL", "AM", "AN", "AO", "AP", "AQ", "AR", "AS", "AT", "AU", "AV", "AW", "AX", "AY", "AZ",
    "BA", "BB", "BC", "BD", "BE", "BF", "BG", "BH", "BI", "BJ", "BK", "BL", "BM", "BN", "BO", "BP",
    "BQ", "BR", "BS", "BT", "BU", "BV", "BW", "BX", "BY", "BZ",
];

fn prefix_for(index: usize) -> Result<&'static str, QueryError> {
    PREFIXES
        .get(index)
        .copied()
        .ok_or(QueryError::TooManyExpansions {
            count: index + 1,
            max: PREFIXES.len(),
        })
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryNode {
    pub index: usize,
    pub prefix: &'static str,
    pub entity_type: EntityType,
    /// Index of the parent node; `None` for the root.
    pub parent: Option<usize>,
    pub children: Vec<QueryNode>,
    /// Options of this level. Nested expansions are represented by
    /// `children`, so `options.expand` is always empty.
    pub options: QueryOptions,
}

impl QueryNode {
    /// Root node for `entity_type`, without expansions.
    pub fn build_root(entity_type: EntityType, options: &QueryOptions) -> Self {
        Self::new(0, PREFIXES[0], entity_type, None, options)
    }

    /// Root node with every `$expand` level of `options` attached.
    pub fn build(entity_type: EntityType, options: &QueryOptions) -> Result<Self, QueryError> {
        let mut root = Self::build_root(entity_type, options);
        root.add_expansions(&options.expand)?;
        Ok(root)
    }

    fn new(
        index: usize,
        prefix: &'static str,
        entity_type: EntityType,
        parent: Option<usize>,
        options: &QueryOptions,
    ) -> Self {
        Self {
            index,
            prefix,
            entity_type,
            parent,
            children: Vec::new(),
            options: QueryOptions {
                expand: Vec::new(),
                ..options.clone()
            },
        }
    }

    /// Adds `expansions` as children, recursing into their own expansions
    /// before moving on to the next sibling.
    ///
    /// Must be called on the most recently added subtree, which holds for
    /// depth-first construction.
    pub fn add_expansions(&mut self, expansions: &[ExpandOperation]) -> Result<(), QueryError> {
        for expansion in expansions {
            let child_type = expansion.entity_type;
            if self.entity_type.relation(child_type).is_none() {
                return Err(QueryError::unresolvable(child_type, self.entity_type));
            }

            let index = self.next_index();
            let mut child = Self::new(
                index,
                prefix_for(index)?,
                child_type,
                Some(self.index),
                &expansion.options,
            );
            child.add_expansions(&expansion.options.expand)?;
            self.children.push(child);
        }
        Ok(())
    }

    /// Index the next node added under this subtree receives.
    pub fn next_index(&self) -> usize {
        match self.children.last() {
            Some(last) => last.next_index(),
            None => self.index + 1,
        }
    }

    pub fn find_by_index(&self, index: usize) -> Option<&QueryNode> {
        if self.index == index {
            return Some(self);
        }
        self.children
            .iter()
            .find_map(|child| child.find_by_index(index))
    }

    /// Child index to parent index, for every non-root node.
    pub fn relation_map(&self) -> IndexMap<usize, usize> {
        let mut map = IndexMap::new();
        for node in self.pre_order() {
            if let Some(parent) = node.parent {
                map.insert(node.index, parent);
            }
        }
        map
    }

    /// Every node of the subtree, in index order.
    pub fn pre_order(&self) -> Vec<&QueryNode> {
        let mut nodes = vec![self];
        for child in &self.children {
            nodes.extend(child.pre_order());
        }
        nodes
    }

    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(QueryNode::node_count).sum::<usize>()
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> QueryNode {
        // Things?$expand=Datastreams($expand=Observations,Sensor),Locations
        let options = QueryOptions::new()
            .with_expand(
                EntityType::Datastream,
                QueryOptions::new()
                    .with_top(5)
                    .with_expand(EntityType::Observation, QueryOptions::new())
                    .with_expand(EntityType::Sensor, QueryOptions::new()),
            )
            .with_expand(EntityType::Location, QueryOptions::new());
        QueryNode::build(EntityType::Thing, &options).unwrap()
    }

    #[test]
    fn test_prefix_sequence() {
        assert_eq!(PREFIXES[0], "A");
        assert_eq!(PREFIXES[25], "Z");
        assert_eq!(PREFIXES[26], "AA");
        assert_eq!(PREFIXES[52], "BA");
        assert_eq!(PREFIXES[77], "BZ");

        let mut seen = std::collections::HashSet::new();
        assert!(PREFIXES.iter().all(|p| seen.insert(*p)));
    }

    #[test]
    fn test_pre_order_indices() {
        let root = tree();
        let nodes = root.pre_order();
        let summary: Vec<_> = nodes
            .iter()
            .map(|n| (n.index, n.prefix, n.entity_type))
            .collect();
        assert_eq!(
            summary,
            vec![
                (0, "A", EntityType::Thing),
                (1, "B", EntityType::Datastream),
                (2, "C", EntityType::Observation),
                (3, "D", EntityType::Sensor),
                (4, "E", EntityType::Location),
            ]
        );
        assert_eq!(root.next_index(), 5);
        assert_eq!(root.node_count(), 5);
    }

    #[test]
    fn test_options_are_per_level() {
        let root = tree();
        assert!(root.options.expand.is_empty());
        let datastream = root.find_by_index(1).unwrap();
        assert_eq!(datastream.options.top, Some(5));
        assert!(datastream.options.expand.is_empty());
        assert_eq!(datastream.children.len(), 2);
    }

    #[test]
    fn test_find_and_relation_map() {
        let root = tree();
        assert_eq!(
            root.find_by_index(3).unwrap().entity_type,
            EntityType::Sensor
        );
        assert!(root.find_by_index(9).is_none());

        let map = root.relation_map();
        assert_eq!(map.get(&1), Some(&0));
        assert_eq!(map.get(&2), Some(&1));
        assert_eq!(map.get(&3), Some(&1));
        assert_eq!(map.get(&4), Some(&0));
        assert!(!map.contains_key(&0));
    }

    #[test]
    fn test_unrelated_expansion_is_rejected() {
        let options = QueryOptions::new().with_expand(EntityType::Sensor, QueryOptions::new());
        let err = QueryNode::build(EntityType::Thing, &options).unwrap_err();
        assert!(matches!(
            err,
            QueryError::UnresolvableRelation {
                get: EntityType::Sensor,
                by: EntityType::Thing
            }
        ));
    }

    #[test]
    fn test_too_many_expansions() {
        let mut options = QueryOptions::new();
        for _ in 0..PREFIXES.len() {
            options = options.with_expand(EntityType::Datastream, QueryOptions::new());
        }
        let err = QueryNode::build(EntityType::Thing, &options).unwrap_err();
        assert!(matches!(
            err,
            QueryError::TooManyExpansions { count: 79, max: 78 }
        ));
    }
}
