//! SensorThings entity model.
//!
//! Scalar properties are optional so that `$select` projections can leave
//! them out. Navigation properties are only populated when the entity was
//! read with the matching `$expand`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entity_type::{Cardinality, EntityType};
use crate::error::{CoreError, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thing {
    #[serde(rename = "@iot.id", skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<Value>,
    #[serde(rename = "Locations", skip_serializing_if = "Option::is_none")]
    pub locations: Option<Vec<Location>>,
    #[serde(rename = "HistoricalLocations", skip_serializing_if = "Option::is_none")]
    pub historical_locations: Option<Vec<HistoricalLocation>>,
    #[serde(rename = "Datastreams", skip_serializing_if = "Option::is_none")]
    pub datastreams: Option<Vec<Datastream>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    #[serde(rename = "@iot.id", skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding_type: Option<String>,
    /// GeoJSON geometry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Value>,
    #[serde(rename = "Things", skip_serializing_if = "Option::is_none")]
    pub things: Option<Vec<Thing>>,
    #[serde(rename = "HistoricalLocations", skip_serializing_if = "Option::is_none")]
    pub historical_locations: Option<Vec<HistoricalLocation>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalLocation {
    #[serde(rename = "@iot.id", skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(rename = "Thing", skip_serializing_if = "Option::is_none")]
    pub thing: Option<Box<Thing>>,
    #[serde(rename = "Locations", skip_serializing_if = "Option::is_none")]
    pub locations: Option<Vec<Location>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sensor {
    #[serde(rename = "@iot.id", skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
    #[serde(rename = "Datastreams", skip_serializing_if = "Option::is_none")]
    pub datastreams: Option<Vec<Datastream>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservedProperty {
    #[serde(rename = "@iot.id", skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "Datastreams", skip_serializing_if = "Option::is_none")]
    pub datastreams: Option<Vec<Datastream>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Datastream {
    #[serde(rename = "@iot.id", skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_of_measurement: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observation_type: Option<String>,
    /// GeoJSON geometry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_area: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phenomenon_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_time: Option<String>,
    #[serde(rename = "Thing", skip_serializing_if = "Option::is_none")]
    pub thing: Option<Box<Thing>>,
    #[serde(rename = "Sensor", skip_serializing_if = "Option::is_none")]
    pub sensor: Option<Box<Sensor>>,
    #[serde(rename = "ObservedProperty", skip_serializing_if = "Option::is_none")]
    pub observed_property: Option<Box<ObservedProperty>>,
    #[serde(rename = "Observations", skip_serializing_if = "Option::is_none")]
    pub observations: Option<Vec<Observation>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    #[serde(rename = "@iot.id", skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phenomenon_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_quality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
    #[serde(rename = "Datastream", skip_serializing_if = "Option::is_none")]
    pub datastream: Option<Box<Datastream>>,
    #[serde(rename = "FeatureOfInterest", skip_serializing_if = "Option::is_none")]
    pub feature_of_interest: Option<Box<FeatureOfInterest>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureOfInterest {
    #[serde(rename = "@iot.id", skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding_type: Option<String>,
    /// GeoJSON geometry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature: Option<Value>,
    #[serde(rename = "Observations", skip_serializing_if = "Option::is_none")]
    pub observations: Option<Vec<Observation>>,
}

/// Any primary entity, as produced by a read.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Entity {
    Thing(Thing),
    Location(Location),
    HistoricalLocation(HistoricalLocation),
    Sensor(Sensor),
    ObservedProperty(ObservedProperty),
    Datastream(Datastream),
    Observation(Observation),
    FeatureOfInterest(FeatureOfInterest),
}

macro_rules! take_as {
    ($entity:expr, $variant:ident) => {
        match $entity {
            Entity::$variant(inner) => Some(inner),
            _ => None,
        }
    };
}

fn push<T>(collection: &mut Option<Vec<T>>, item: T) {
    collection.get_or_insert_with(Vec::new).push(item);
}

impl Entity {
    pub fn entity_type(&self) -> EntityType {
        match self {
            Self::Thing(_) => EntityType::Thing,
            Self::Location(_) => EntityType::Location,
            Self::HistoricalLocation(_) => EntityType::HistoricalLocation,
            Self::Sensor(_) => EntityType::Sensor,
            Self::ObservedProperty(_) => EntityType::ObservedProperty,
            Self::Datastream(_) => EntityType::Datastream,
            Self::Observation(_) => EntityType::Observation,
            Self::FeatureOfInterest(_) => EntityType::FeatureOfInterest,
        }
    }

    pub fn id(&self) -> Option<i64> {
        match self {
            Self::Thing(e) => e.id,
            Self::Location(e) => e.id,
            Self::HistoricalLocation(e) => e.id,
            Self::Sensor(e) => e.id,
            Self::ObservedProperty(e) => e.id,
            Self::Datastream(e) => e.id,
            Self::Observation(e) => e.id,
            Self::FeatureOfInterest(e) => e.id,
        }
    }

    /// Marks the navigation property towards `child` as expanded, so an
    /// expansion without matches serializes as an empty collection.
    pub fn mark_expanded(&mut self, child: EntityType) -> Result<()> {
        match self.entity_type().relation(child) {
            Some(Cardinality::Many) => {}
            Some(Cardinality::One) => return Ok(()),
            None => return Err(self.invalid_relation(child)),
        }

        macro_rules! init {
            ($field:expr) => {{
                $field.get_or_insert_with(Vec::new);
            }};
        }

        match (self, child) {
            (Self::Thing(t), EntityType::Location) => init!(t.locations),
            (Self::Thing(t), EntityType::HistoricalLocation) => init!(t.historical_locations),
            (Self::Thing(t), EntityType::Datastream) => init!(t.datastreams),
            (Self::Location(l), EntityType::Thing) => init!(l.things),
            (Self::Location(l), EntityType::HistoricalLocation) => init!(l.historical_locations),
            (Self::HistoricalLocation(h), EntityType::Location) => init!(h.locations),
            (Self::Sensor(s), EntityType::Datastream) => init!(s.datastreams),
            (Self::ObservedProperty(o), EntityType::Datastream) => init!(o.datastreams),
            (Self::Datastream(d), EntityType::Observation) => init!(d.observations),
            (Self::FeatureOfInterest(f), EntityType::Observation) => init!(f.observations),
            _ => {}
        }
        Ok(())
    }

    /// Places `child` in the matching navigation property of `self`.
    ///
    /// Singular properties are overwritten, collections are appended to.
    pub fn attach(&mut self, child: Entity) -> Result<()> {
        let child_type = child.entity_type();
        let parent_type = self.entity_type();
        let mismatch = || CoreError::InvalidRelation {
            parent: parent_type,
            child: child_type,
        };

        match self {
            Self::Thing(t) => match child {
                Entity::Location(c) => push(&mut t.locations, c),
                Entity::HistoricalLocation(c) => push(&mut t.historical_locations, c),
                Entity::Datastream(c) => push(&mut t.datastreams, c),
                _ => return Err(mismatch()),
            },
            Self::Location(l) => match child {
                Entity::Thing(c) => push(&mut l.things, c),
                Entity::HistoricalLocation(c) => push(&mut l.historical_locations, c),
                _ => return Err(mismatch()),
            },
            Self::HistoricalLocation(h) => match child {
                Entity::Thing(c) => h.thing = Some(Box::new(c)),
                Entity::Location(c) => push(&mut h.locations, c),
                _ => return Err(mismatch()),
            },
            Self::Sensor(s) => {
                let c = take_as!(child, Datastream).ok_or_else(mismatch)?;
                push(&mut s.datastreams, c);
            }
            Self::ObservedProperty(o) => {
                let c = take_as!(child, Datastream).ok_or_else(mismatch)?;
                push(&mut o.datastreams, c);
            }
            Self::Datastream(d) => match child {
                Entity::Thing(c) => d.thing = Some(Box::new(c)),
                Entity::Sensor(c) => d.sensor = Some(Box::new(c)),
                Entity::ObservedProperty(c) => d.observed_property = Some(Box::new(c)),
                Entity::Observation(c) => push(&mut d.observations, c),
                _ => return Err(mismatch()),
            },
            Self::Observation(o) => match child {
                Entity::Datastream(c) => o.datastream = Some(Box::new(c)),
                Entity::FeatureOfInterest(c) => o.feature_of_interest = Some(Box::new(c)),
                _ => return Err(mismatch()),
            },
            Self::FeatureOfInterest(f) => {
                let c = take_as!(child, Observation).ok_or_else(mismatch)?;
                push(&mut f.observations, c);
            }
        }
        Ok(())
    }

    fn invalid_relation(&self, child: EntityType) -> CoreError {
        CoreError::InvalidRelation {
            parent: self.entity_type(),
            child,
        }
    }
}

macro_rules! impl_from_entity {
    ($($variant:ident),*) => {
        $(
            impl From<$variant> for Entity {
                fn from(value: $variant) -> Self {
                    Entity::$variant(value)
                }
            }
        )*
    };
}

impl_from_entity!(
    Thing,
    Location,
    HistoricalLocation,
    Sensor,
    ObservedProperty,
    Datastream,
    Observation,
    FeatureOfInterest
);
