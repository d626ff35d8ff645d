use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// The closed set of entity kinds stored by a SensorThings service.
///
/// The two junction kinds only exist in storage; they never appear in
/// responses and carry no public fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    Thing,
    Location,
    HistoricalLocation,
    Sensor,
    ObservedProperty,
    Datastream,
    Observation,
    FeatureOfInterest,
    ThingToLocation,
    LocationToHistoricalLocation,
}

/// How many children a navigation property holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    One,
    Many,
}

impl EntityType {
    /// Every entity kind that can be requested or expanded.
    pub const PRIMARY: [EntityType; 8] = [
        EntityType::Thing,
        EntityType::Location,
        EntityType::HistoricalLocation,
        EntityType::Sensor,
        EntityType::ObservedProperty,
        EntityType::Datastream,
        EntityType::Observation,
        EntityType::FeatureOfInterest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Thing => "Thing",
            Self::Location => "Location",
            Self::HistoricalLocation => "HistoricalLocation",
            Self::Sensor => "Sensor",
            Self::ObservedProperty => "ObservedProperty",
            Self::Datastream => "Datastream",
            Self::Observation => "Observation",
            Self::FeatureOfInterest => "FeatureOfInterest",
            Self::ThingToLocation => "ThingToLocation",
            Self::LocationToHistoricalLocation => "LocationToHistoricalLocation",
        }
    }

    /// Collection name as used in URLs and `$expand` paths.
    pub fn plural(&self) -> &'static str {
        match self {
            Self::Thing => "Things",
            Self::Location => "Locations",
            Self::HistoricalLocation => "HistoricalLocations",
            Self::Sensor => "Sensors",
            Self::ObservedProperty => "ObservedProperties",
            Self::Datastream => "Datastreams",
            Self::Observation => "Observations",
            Self::FeatureOfInterest => "FeaturesOfInterest",
            Self::ThingToLocation => "ThingToLocations",
            Self::LocationToHistoricalLocation => "LocationToHistoricalLocations",
        }
    }

    /// Cardinality of the navigation property from `self` to `child`, or
    /// `None` when `self` has no such property.
    pub fn relation(&self, child: EntityType) -> Option<Cardinality> {
        use Cardinality::{Many, One};
        use EntityType::*;

        match (self, child) {
            (Thing, Location | HistoricalLocation | Datastream) => Some(Many),
            (Location, Thing | HistoricalLocation) => Some(Many),
            (HistoricalLocation, Thing) => Some(One),
            (HistoricalLocation, Location) => Some(Many),
            (Sensor | ObservedProperty, Datastream) => Some(Many),
            (Datastream, Thing | Sensor | ObservedProperty) => Some(One),
            (Datastream, Observation) => Some(Many),
            (Observation, Datastream | FeatureOfInterest) => Some(One),
            (FeatureOfInterest, Observation) => Some(Many),
            _ => None,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = CoreError;

    /// Accepts singular or plural names, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::PRIMARY
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s) || t.plural().eq_ignore_ascii_case(s))
            .ok_or_else(|| CoreError::invalid_entity_type(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str_singular_and_plural() {
        assert_eq!(
            "Datastream".parse::<EntityType>().unwrap(),
            EntityType::Datastream
        );
        assert_eq!(
            "featuresofinterest".parse::<EntityType>().unwrap(),
            EntityType::FeatureOfInterest
        );
        assert_eq!(
            "ObservedProperties".parse::<EntityType>().unwrap(),
            EntityType::ObservedProperty
        );
        assert!("ThingToLocation".parse::<EntityType>().is_err());
        assert!("Widget".parse::<EntityType>().is_err());
    }

    #[test]
    fn test_relations_are_navigable_both_ways() {
        for parent in EntityType::PRIMARY {
            for child in EntityType::PRIMARY {
                if parent.relation(child).is_some() {
                    assert!(
                        child.relation(parent).is_some(),
                        "{child} has no way back to {parent}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_cardinality() {
        assert_eq!(
            EntityType::Datastream.relation(EntityType::Thing),
            Some(Cardinality::One)
        );
        assert_eq!(
            EntityType::Thing.relation(EntityType::Datastream),
            Some(Cardinality::Many)
        );
        assert_eq!(EntityType::Sensor.relation(EntityType::Thing), None);
        assert_eq!(EntityType::Thing.relation(EntityType::Thing), None);
    }
}
