//! Static mapping from entity types to storage.
//!
//! The catalog knows, for every entity type, its table, how each field is
//! selected (including the spatial and JSON document transforms), the
//! column alias it is returned under, and how any two related types join.

use sensorthings_core::EntityType;

use crate::decode::{self, Decoder};
use crate::error::QueryError;
use crate::sql_builder::validate_identifier;

/// Document column holding the observation payload.
const DOCUMENT_COLUMN: &str = "data";

/// `to_char` pattern producing `YYYY-MM-DDTHH:MM:SS.mmmZ`.
pub const SQL_TIME_FORMAT: &str = r#"YYYY-MM-DD"T"HH24:MI:SS.MS"Z""#;

/// How a field is read from its table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Plain column.
    Column,
    /// `jsonb` column; compared as JSON and navigable with paths.
    JsonColumn,
    /// PostGIS geometry, selected as GeoJSON text.
    Geometry,
    /// Key inside the `data` document; `column` only names the alias.
    /// `as_text` selects with `->>`.
    Document { key: &'static str, as_text: bool },
    /// `timestamptz` rendered as canonical UTC text.
    UtcTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    /// Public property name, or the column name for join-support fields.
    pub name: &'static str,
    /// Lowercase storage name; also the alias suffix.
    pub column: &'static str,
    pub kind: FieldKind,
}

impl FieldDef {
    const fn new(name: &'static str, column: &'static str, kind: FieldKind) -> Self {
        Self { name, column, kind }
    }

    const fn column(name: &'static str, column: &'static str) -> Self {
        Self::new(name, column, FieldKind::Column)
    }

    const fn document(
        name: &'static str,
        column: &'static str,
        key: &'static str,
        as_text: bool,
    ) -> Self {
        Self::new(name, column, FieldKind::Document { key, as_text })
    }

    /// Whether comparisons on this field take a JSON operand.
    pub fn is_json(&self) -> bool {
        matches!(
            self.kind,
            FieldKind::JsonColumn | FieldKind::Document { as_text: false, .. }
        )
    }
}

/// Everything the compiler and materializer need to know about one
/// primary entity type.
#[derive(Debug)]
pub struct EntitySchema {
    pub entity_type: EntityType,
    pub table: &'static str,
    /// Public fields in response order. `id` is always first.
    pub fields: &'static [FieldDef],
    /// Foreign keys that are never returned to clients.
    pub join_fields: &'static [FieldDef],
    /// Join fields an expanded node must carry so deeper levels can join
    /// on them.
    pub expand_keys: &'static [&'static str],
    pub decode: Decoder,
}

impl EntitySchema {
    fn find(&self, name: &str, include_join_fields: bool) -> Option<&'static FieldDef> {
        let joins: &'static [FieldDef] = if include_join_fields {
            self.join_fields
        } else {
            &[]
        };
        self.fields
            .iter()
            .chain(joins.iter())
            .find(|f| f.name.eq_ignore_ascii_case(name))
    }

    /// Public field by case-insensitive name.
    pub fn public_field(&self, name: &str) -> Option<&'static FieldDef> {
        self.find(name, false)
    }

    /// Public or join-support field by case-insensitive name.
    pub fn any_field(&self, name: &str) -> Option<&'static FieldDef> {
        self.find(name, true)
    }

    pub fn id_field(&self) -> &'static FieldDef {
        &self.fields[0]
    }

    /// SQL expression selecting `field` from this schema's table.
    pub fn expression(&self, field: &FieldDef) -> String {
        let table = self.table;
        let column = field.column;
        match field.kind {
            FieldKind::Column | FieldKind::JsonColumn => format!("{table}.{column}"),
            FieldKind::Geometry => format!("public.ST_AsGeoJSON({table}.{column})"),
            FieldKind::Document { key, as_text } => {
                let arrow = if as_text { "->>" } else { "->" };
                format!("{table}.{DOCUMENT_COLUMN} {arrow} '{key}'")
            }
            FieldKind::UtcTime => {
                format!("to_char({table}.{column} at time zone 'UTC', '{SQL_TIME_FORMAT}')")
            }
        }
    }

    /// JSON value a `field/key/...` path can navigate into, if any.
    pub fn json_base(&self, field: &FieldDef) -> Option<String> {
        match field.kind {
            FieldKind::JsonColumn => Some(format!("{}.{}", self.table, field.column)),
            FieldKind::Document { key, .. } => {
                Some(format!("{}.{DOCUMENT_COLUMN} -> '{key}'", self.table))
            }
            _ => None,
        }
    }

    /// Column alias `{table}_{column}` the field is returned under.
    pub fn alias(&self, field: &FieldDef) -> String {
        format!("{}_{}", self.table, field.column)
    }

    /// Reverse of [`EntitySchema::alias`].
    pub fn field_for_alias(&self, alias: &str) -> Option<&'static FieldDef> {
        let column = alias.strip_prefix(self.table)?.strip_prefix('_')?;
        self.fields
            .iter()
            .chain(self.join_fields.iter())
            .find(|f| f.column == column)
    }
}

const ID: FieldDef = FieldDef::column("id", "id");
const NAME: FieldDef = FieldDef::column("name", "name");
const DESCRIPTION: FieldDef = FieldDef::column("description", "description");
const ENCODING_TYPE: FieldDef = FieldDef::column("encodingType", "encodingtype");

static THING: EntitySchema = EntitySchema {
    entity_type: EntityType::Thing,
    table: "thing",
    fields: &[
        ID,
        NAME,
        DESCRIPTION,
        FieldDef::new("properties", "properties", FieldKind::JsonColumn),
    ],
    join_fields: &[],
    expand_keys: &[],
    decode: decode::thing,
};

static LOCATION: EntitySchema = EntitySchema {
    entity_type: EntityType::Location,
    table: "location",
    fields: &[
        ID,
        NAME,
        DESCRIPTION,
        ENCODING_TYPE,
        FieldDef::new("location", "location", FieldKind::Geometry),
    ],
    join_fields: &[],
    expand_keys: &[],
    decode: decode::location,
};

static HISTORICAL_LOCATION: EntitySchema = EntitySchema {
    entity_type: EntityType::HistoricalLocation,
    table: "historicallocation",
    fields: &[ID, FieldDef::new("time", "time", FieldKind::UtcTime)],
    join_fields: &[
        FieldDef::column("thing_id", "thing_id"),
        FieldDef::column("location_id", "location_id"),
    ],
    expand_keys: &["thing_id"],
    decode: decode::historical_location,
};

static SENSOR: EntitySchema = EntitySchema {
    entity_type: EntityType::Sensor,
    table: "sensor",
    fields: &[
        ID,
        NAME,
        DESCRIPTION,
        ENCODING_TYPE,
        FieldDef::column("metadata", "metadata"),
    ],
    join_fields: &[],
    expand_keys: &[],
    decode: decode::sensor,
};

static OBSERVED_PROPERTY: EntitySchema = EntitySchema {
    entity_type: EntityType::ObservedProperty,
    table: "observedproperty",
    fields: &[
        ID,
        NAME,
        FieldDef::column("definition", "definition"),
        DESCRIPTION,
    ],
    join_fields: &[],
    expand_keys: &[],
    decode: decode::observed_property,
};

static DATASTREAM: EntitySchema = EntitySchema {
    entity_type: EntityType::Datastream,
    table: "datastream",
    fields: &[
        ID,
        NAME,
        DESCRIPTION,
        FieldDef::new(
            "unitOfMeasurement",
            "unitofmeasurement",
            FieldKind::JsonColumn,
        ),
        FieldDef::column("observationType", "observationtype"),
        FieldDef::new("observedArea", "observedarea", FieldKind::Geometry),
        FieldDef::column("phenomenonTime", "phenomenontime"),
        FieldDef::column("resultTime", "resulttime"),
    ],
    join_fields: &[
        FieldDef::column("thing_id", "thing_id"),
        FieldDef::column("sensor_id", "sensor_id"),
        FieldDef::column("observedproperty_id", "observedproperty_id"),
    ],
    expand_keys: &["thing_id", "observedproperty_id", "sensor_id"],
    decode: decode::datastream,
};

static OBSERVATION: EntitySchema = EntitySchema {
    entity_type: EntityType::Observation,
    table: "observation",
    fields: &[
        ID,
        FieldDef::document("phenomenonTime", "phenomenontime", "phenomenonTime", true),
        FieldDef::document("result", "result", "result", false),
        FieldDef::document("resultTime", "resulttime", "resultTime", true),
        FieldDef::document("resultQuality", "resultquality", "resultQuality", true),
        FieldDef::document("validTime", "validtime", "validTime", true),
        FieldDef::document("parameters", "parameters", "parameters", true),
    ],
    join_fields: &[
        FieldDef::column("stream_id", "stream_id"),
        FieldDef::column("featureofinterest_id", "featureofinterest_id"),
    ],
    expand_keys: &["stream_id", "featureofinterest_id"],
    decode: decode::observation,
};

static FEATURE_OF_INTEREST: EntitySchema = EntitySchema {
    entity_type: EntityType::FeatureOfInterest,
    table: "featureofinterest",
    fields: &[
        ID,
        NAME,
        DESCRIPTION,
        ENCODING_TYPE,
        FieldDef::new("feature", "feature", FieldKind::Geometry),
    ],
    join_fields: &[FieldDef::column("original_location_id", "original_location_id")],
    expand_keys: &[],
    decode: decode::feature_of_interest,
};

/// Storage table of any entity type, junctions included.
pub fn table_name(entity_type: EntityType) -> &'static str {
    match entity_type {
        EntityType::Thing => THING.table,
        EntityType::Location => LOCATION.table,
        EntityType::HistoricalLocation => HISTORICAL_LOCATION.table,
        EntityType::Sensor => SENSOR.table,
        EntityType::ObservedProperty => OBSERVED_PROPERTY.table,
        EntityType::Datastream => DATASTREAM.table,
        EntityType::Observation => OBSERVATION.table,
        EntityType::FeatureOfInterest => FEATURE_OF_INTEREST.table,
        EntityType::ThingToLocation => "thing_to_location",
        EntityType::LocationToHistoricalLocation => "location_to_historicallocation",
    }
}

/// How a child level is restricted to the rows related to its parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinCondition {
    /// `WHERE left = right`
    Where { left: String, right: String },
    /// `INNER JOIN table ON a = b AND c = d`
    Junction {
        table: String,
        on: [(String, String); 2],
    },
}

impl JoinCondition {
    /// Renders the join, ANDing `extra` into the restriction when given.
    pub fn to_sql(&self, extra: Option<&str>) -> String {
        match self {
            Self::Where { left, right } => match extra {
                Some(extra) => format!("WHERE {left} = {right} AND {extra}"),
                None => format!("WHERE {left} = {right}"),
            },
            Self::Junction { table, on } => {
                let [(a, b), (c, d)] = on;
                let join = format!("INNER JOIN {table} ON {a} = {b} AND {c} = {d}");
                match extra {
                    Some(extra) => format!("{join} WHERE {extra}"),
                    None => join,
                }
            }
        }
    }
}

/// Immutable schema catalog, bound to one database schema.
#[derive(Debug, Clone)]
pub struct Catalog {
    schema: Option<String>,
}

impl Catalog {
    /// Creates a catalog whose FROM clauses are qualified with `schema`.
    /// An empty schema leaves tables unqualified.
    pub fn new(schema: impl Into<String>) -> Result<Self, QueryError> {
        let schema = schema.into();
        if schema.is_empty() {
            return Ok(Self { schema: None });
        }
        validate_identifier(&schema)?;
        Ok(Self {
            schema: Some(schema),
        })
    }

    pub fn schema_name(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    /// Schema record of a primary entity type.
    pub fn entity(&self, entity_type: EntityType) -> Result<&'static EntitySchema, QueryError> {
        match entity_type {
            EntityType::Thing => Ok(&THING),
            EntityType::Location => Ok(&LOCATION),
            EntityType::HistoricalLocation => Ok(&HISTORICAL_LOCATION),
            EntityType::Sensor => Ok(&SENSOR),
            EntityType::ObservedProperty => Ok(&OBSERVED_PROPERTY),
            EntityType::Datastream => Ok(&DATASTREAM),
            EntityType::Observation => Ok(&OBSERVATION),
            EntityType::FeatureOfInterest => Ok(&FEATURE_OF_INTEREST),
            EntityType::ThingToLocation | EntityType::LocationToHistoricalLocation => {
                Err(QueryError::NotQueryable(entity_type))
            }
        }
    }

    /// Schema-qualified table for FROM clauses.
    pub fn table_for(&self, entity_type: EntityType) -> String {
        let table = table_name(entity_type);
        match &self.schema {
            Some(schema) => format!("{schema}.{table}"),
            None => table.to_string(),
        }
    }

    /// Select expression of a field, matched case-insensitively.
    pub fn field_expression(&self, entity_type: EntityType, field: &str) -> Option<String> {
        let schema = self.entity(entity_type).ok()?;
        let def = schema.any_field(field)?;
        Some(schema.expression(def))
    }

    /// Column alias a field is returned under, e.g. `datastream_unitofmeasurement`.
    pub fn aliased_column_name(&self, entity_type: EntityType, field: &str) -> Option<String> {
        let schema = self.entity(entity_type).ok()?;
        let def = schema.any_field(field)?;
        Some(schema.alias(def))
    }

    /// Builds the condition that restricts `get` rows to those related to a
    /// `by` row.
    ///
    /// `by_prefix` is the lateral prefix of the `by` level; `None` means
    /// `by` is the outer table itself.
    pub fn resolve(
        &self,
        get: EntityType,
        by: EntityType,
        by_prefix: Option<&str>,
    ) -> Result<JoinCondition, QueryError> {
        use EntityType::*;

        let by_ref = |column: &str| -> String {
            let table = table_name(by);
            match by_prefix {
                Some(prefix) => format!("{prefix}_{table}.{table}_{column}"),
                None => format!("{table}.{column}"),
            }
        };
        let where_eq = |left: &str, by_column: &str| JoinCondition::Where {
            left: format!("{}.{left}", table_name(get)),
            right: by_ref(by_column),
        };
        let junction = |table: EntityType, a: (String, String), b: (String, String)| {
            JoinCondition::Junction {
                table: self.table_for(table),
                on: [a, b],
            }
        };
        let ttl = table_name(ThingToLocation);
        let l2hl = table_name(LocationToHistoricalLocation);

        let condition = match (get, by) {
            (Thing, Datastream) => where_eq("id", "thing_id"),
            (Thing, HistoricalLocation) => where_eq("id", "thing_id"),
            (Thing, Location) => junction(
                ThingToLocation,
                ("thing.id".into(), format!("{ttl}.thing_id")),
                (by_ref("id"), format!("{ttl}.location_id")),
            ),
            (Location, HistoricalLocation) => junction(
                LocationToHistoricalLocation,
                (format!("{l2hl}.location_id"), "location.id".into()),
                (format!("{l2hl}.historicallocation_id"), by_ref("id")),
            ),
            (Location, Thing) => junction(
                ThingToLocation,
                (format!("{ttl}.location_id"), "location.id".into()),
                (format!("{ttl}.thing_id"), by_ref("id")),
            ),
            (Location, Datastream) => junction(
                ThingToLocation,
                (format!("{ttl}.location_id"), "location.id".into()),
                (format!("{ttl}.thing_id"), by_ref("thing_id")),
            ),
            (HistoricalLocation, Location) => junction(
                LocationToHistoricalLocation,
                (
                    format!("{l2hl}.historicallocation_id"),
                    "historicallocation.id".into(),
                ),
                (format!("{l2hl}.location_id"), by_ref("id")),
            ),
            (HistoricalLocation, Thing) => where_eq("thing_id", "id"),
            (Sensor, Datastream) => where_eq("id", "sensor_id"),
            (ObservedProperty, Datastream) => where_eq("id", "observedproperty_id"),
            (Observation, Datastream) => where_eq("stream_id", "id"),
            (Observation, FeatureOfInterest) => where_eq("featureofinterest_id", "id"),
            (FeatureOfInterest, Observation) => where_eq("id", "featureofinterest_id"),
            (Datastream, Thing) => where_eq("thing_id", "id"),
            (Datastream, Sensor) => where_eq("sensor_id", "id"),
            (Datastream, ObservedProperty) => where_eq("observedproperty_id", "id"),
            (Datastream, Observation) => where_eq("id", "stream_id"),
            (Datastream, Location) => junction(
                ThingToLocation,
                (by_ref("id"), format!("{ttl}.location_id")),
                (format!("{ttl}.thing_id"), "datastream.thing_id".into()),
            ),
            _ => return Err(QueryError::unresolvable(get, by)),
        };

        Ok(condition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Catalog {
        Catalog::new("v1").unwrap()
    }

    #[test]
    fn test_schema_name_is_validated() {
        assert!(Catalog::new("v1").is_ok());
        assert!(Catalog::new("").unwrap().schema_name().is_none());
        assert!(matches!(
            Catalog::new("v1; DROP"),
            Err(QueryError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn test_table_for() {
        let catalog = catalog();
        assert_eq!(catalog.table_for(EntityType::Datastream), "v1.datastream");
        assert_eq!(
            catalog.table_for(EntityType::ThingToLocation),
            "v1.thing_to_location"
        );
        assert_eq!(
            Catalog::new("").unwrap().table_for(EntityType::Thing),
            "thing"
        );
    }

    #[test]
    fn test_field_expressions() {
        let c = catalog();
        assert_eq!(
            c.field_expression(EntityType::Thing, "name").unwrap(),
            "thing.name"
        );
        assert_eq!(
            c.field_expression(EntityType::Location, "location").unwrap(),
            "public.ST_AsGeoJSON(location.location)"
        );
        assert_eq!(
            c.field_expression(EntityType::Datastream, "observedarea")
                .unwrap(),
            "public.ST_AsGeoJSON(datastream.observedarea)"
        );
        assert_eq!(
            c.field_expression(EntityType::Observation, "phenomenonTime")
                .unwrap(),
            "observation.data ->> 'phenomenonTime'"
        );
        assert_eq!(
            c.field_expression(EntityType::Observation, "result").unwrap(),
            "observation.data -> 'result'"
        );
        assert_eq!(
            c.field_expression(EntityType::HistoricalLocation, "time")
                .unwrap(),
            r#"to_char(historicallocation.time at time zone 'UTC', 'YYYY-MM-DD"T"HH24:MI:SS.MS"Z"')"#
        );
        assert_eq!(
            c.field_expression(EntityType::Datastream, "THING_ID").unwrap(),
            "datastream.thing_id"
        );
        assert!(c.field_expression(EntityType::Thing, "unknown").is_none());
        assert!(
            c.field_expression(EntityType::ThingToLocation, "thing_id")
                .is_none()
        );
    }

    #[test]
    fn test_every_field_has_expression_and_round_tripping_alias() {
        let c = catalog();
        for entity_type in EntityType::PRIMARY {
            let schema = c.entity(entity_type).unwrap();
            assert_eq!(schema.id_field().name, "id");
            for field in schema.fields.iter().chain(schema.join_fields) {
                let expr = c.field_expression(entity_type, field.name).unwrap();
                assert!(!expr.is_empty());

                let alias = c.aliased_column_name(entity_type, field.name).unwrap();
                assert!(alias.starts_with(schema.table));
                assert_eq!(schema.field_for_alias(&alias), Some(field));
            }
            for key in schema.expand_keys {
                assert!(schema.any_field(key).is_some(), "{key} missing");
            }
        }
    }

    #[test]
    fn test_alias_names() {
        let c = catalog();
        assert_eq!(
            c.aliased_column_name(EntityType::Datastream, "unitOfMeasurement")
                .unwrap(),
            "datastream_unitofmeasurement"
        );
        assert_eq!(
            c.aliased_column_name(EntityType::Observation, "resultTime")
                .unwrap(),
            "observation_resulttime"
        );
    }

    #[test]
    fn test_resolve_where_join() {
        let c = catalog();
        let join = c
            .resolve(EntityType::Thing, EntityType::Datastream, None)
            .unwrap();
        assert_eq!(join.to_sql(None), "WHERE thing.id = datastream.thing_id");

        let join = c
            .resolve(EntityType::Thing, EntityType::Datastream, Some("B"))
            .unwrap();
        assert_eq!(
            join.to_sql(Some("thing.name = $1")),
            "WHERE thing.id = B_datastream.datastream_thing_id AND thing.name = $1"
        );
    }

    #[test]
    fn test_resolve_junction_join() {
        let c = catalog();
        let join = c
            .resolve(EntityType::Location, EntityType::Thing, Some("C"))
            .unwrap();
        assert_eq!(
            join.to_sql(None),
            "INNER JOIN v1.thing_to_location ON thing_to_location.location_id = location.id \
             AND thing_to_location.thing_id = C_thing.thing_id"
        );
        assert_eq!(
            join.to_sql(Some("location.name = $2")),
            "INNER JOIN v1.thing_to_location ON thing_to_location.location_id = location.id \
             AND thing_to_location.thing_id = C_thing.thing_id WHERE location.name = $2"
        );
    }

    #[test]
    fn test_every_navigation_resolves_both_ways() {
        let c = catalog();
        for parent in EntityType::PRIMARY {
            for child in EntityType::PRIMARY {
                if parent.relation(child).is_some() {
                    assert!(c.resolve(child, parent, None).is_ok());
                    assert!(c.resolve(parent, child, Some("B")).is_ok());
                }
            }
        }
        assert!(c.resolve(EntityType::Location, EntityType::Datastream, None).is_ok());
        assert!(c.resolve(EntityType::Datastream, EntityType::Location, None).is_ok());
    }

    #[test]
    fn test_unresolvable_pair() {
        let err = catalog()
            .resolve(EntityType::Sensor, EntityType::Thing, None)
            .unwrap_err();
        assert!(matches!(
            err,
            QueryError::UnresolvableRelation {
                get: EntityType::Sensor,
                by: EntityType::Thing
            }
        ));
    }
}
