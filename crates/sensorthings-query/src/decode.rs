//! Per-type row decoders.
//!
//! A decoder receives the columns one query node contributed to a row,
//! already stripped of the node prefix, and builds the typed entity.

use indexmap::IndexMap;
use serde_json::Value;
use sensorthings_core::{
    Datastream, EncodingType, Entity, FeatureOfInterest, HistoricalLocation, Location,
    Observation, ObservationType, ObservedProperty, Sensor, Thing,
};

use crate::error::MaterializeError;

/// Builds an entity from one node's share of a row.
pub type Decoder = fn(&NodeColumns<'_>) -> Result<Entity, MaterializeError>;

/// Columns belonging to one query node, keyed by lowercase `{table}_{column}`.
#[derive(Debug, Clone)]
pub struct NodeColumns<'r> {
    table: &'static str,
    values: IndexMap<String, &'r Value>,
}

impl<'r> NodeColumns<'r> {
    pub fn new(table: &'static str) -> Self {
        Self {
            table,
            values: IndexMap::new(),
        }
    }

    pub fn insert(&mut self, alias: &str, value: &'r Value) {
        self.values.insert(alias.to_ascii_lowercase(), value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// True when the node had no match for this row (LEFT JOIN miss).
    pub fn is_null(&self) -> bool {
        self.values.values().all(|v| v.is_null())
    }

    fn key(&self, column: &str) -> String {
        format!("{}_{column}", self.table)
    }

    /// Non-null value of `column`.
    pub fn value(&self, column: &str) -> Option<&'r Value> {
        self.values
            .get(&self.key(column))
            .copied()
            .filter(|v| !v.is_null())
    }

    pub fn integer(&self, column: &str) -> Result<Option<i64>, MaterializeError> {
        let Some(value) = self.value(column) else {
            return Ok(None);
        };
        let parsed = match value {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        parsed
            .map(Some)
            .ok_or_else(|| MaterializeError::unexpected(self.key(column), "an integer", value))
    }

    pub fn text(&self, column: &str) -> Option<String> {
        self.value(column).map(|value| match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    /// JSON stored as text, such as GeoJSON from `ST_AsGeoJSON` or a `->>`
    /// extraction. Values that are already structured pass through.
    pub fn json_text(&self, column: &str) -> Result<Option<Value>, MaterializeError> {
        match self.value(column) {
            None => Ok(None),
            Some(Value::String(s)) => serde_json::from_str(s)
                .map(Some)
                .map_err(|e| MaterializeError::invalid_json(self.key(column), &e)),
            Some(other) => Ok(Some(other.clone())),
        }
    }

    /// `jsonb` columns and `->` extractions, already structured by the
    /// executor. Strings are JSON strings, not documents.
    pub fn json(&self, column: &str) -> Option<Value> {
        self.value(column).cloned()
    }

    /// Encoding code rendered as its value. Code 0 means "not set".
    pub fn encoding(&self, column: &str) -> Result<Option<String>, MaterializeError> {
        match self.integer(column)? {
            None | Some(0) => Ok(None),
            Some(code) => Ok(Some(EncodingType::from_code(code)?.value.to_string())),
        }
    }

    pub fn observation_type(&self, column: &str) -> Result<Option<String>, MaterializeError> {
        match self.integer(column)? {
            None | Some(0) => Ok(None),
            Some(code) => Ok(Some(ObservationType::from_code(code)?.value())),
        }
    }
}

pub fn thing(row: &NodeColumns<'_>) -> Result<Entity, MaterializeError> {
    Ok(Thing {
        id: row.integer("id")?,
        name: row.text("name"),
        description: row.text("description"),
        properties: row.json("properties"),
        ..Default::default()
    }
    .into())
}

pub fn location(row: &NodeColumns<'_>) -> Result<Entity, MaterializeError> {
    Ok(Location {
        id: row.integer("id")?,
        name: row.text("name"),
        description: row.text("description"),
        encoding_type: row.encoding("encodingtype")?,
        location: row.json_text("location")?,
        ..Default::default()
    }
    .into())
}

pub fn historical_location(row: &NodeColumns<'_>) -> Result<Entity, MaterializeError> {
    Ok(HistoricalLocation {
        id: row.integer("id")?,
        time: row.text("time"),
        ..Default::default()
    }
    .into())
}

pub fn sensor(row: &NodeColumns<'_>) -> Result<Entity, MaterializeError> {
    Ok(Sensor {
        id: row.integer("id")?,
        name: row.text("name"),
        description: row.text("description"),
        encoding_type: row.encoding("encodingtype")?,
        metadata: row.text("metadata"),
        ..Default::default()
    }
    .into())
}

pub fn observed_property(row: &NodeColumns<'_>) -> Result<Entity, MaterializeError> {
    Ok(ObservedProperty {
        id: row.integer("id")?,
        name: row.text("name"),
        definition: row.text("definition"),
        description: row.text("description"),
        ..Default::default()
    }
    .into())
}

pub fn datastream(row: &NodeColumns<'_>) -> Result<Entity, MaterializeError> {
    Ok(Datastream {
        id: row.integer("id")?,
        name: row.text("name"),
        description: row.text("description"),
        unit_of_measurement: row.json("unitofmeasurement"),
        observation_type: row.observation_type("observationtype")?,
        observed_area: row.json_text("observedarea")?,
        phenomenon_time: row.text("phenomenontime"),
        result_time: row.text("resulttime"),
        ..Default::default()
    }
    .into())
}

pub fn observation(row: &NodeColumns<'_>) -> Result<Entity, MaterializeError> {
    Ok(Observation {
        id: row.integer("id")?,
        phenomenon_time: row.text("phenomenontime"),
        result: row.json("result"),
        result_time: row.text("resulttime"),
        result_quality: row.text("resultquality"),
        valid_time: row.text("validtime"),
        parameters: row.json_text("parameters")?,
        ..Default::default()
    }
    .into())
}

pub fn feature_of_interest(row: &NodeColumns<'_>) -> Result<Entity, MaterializeError> {
    Ok(FeatureOfInterest {
        id: row.integer("id")?,
        name: row.text("name"),
        description: row.text("description"),
        encoding_type: row.encoding("encodingtype")?,
        feature: row.json_text("feature")?,
        ..Default::default()
    }
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn columns<'a>(table: &'static str, values: &'a [(&str, Value)]) -> NodeColumns<'a> {
        let mut node = NodeColumns::new(table);
        for (alias, value) in values {
            node.insert(alias, value);
        }
        node
    }

    #[test]
    fn test_decode_location() {
        let values = [
            ("location_id", json!(7)),
            ("location_name", json!("Home")),
            ("location_encodingtype", json!(1)),
            (
                "location_location",
                json!(r#"{"type":"Point","coordinates":[5.0,52.0]}"#),
            ),
        ];
        let entity = location(&columns("location", &values)).unwrap();
        let Entity::Location(l) = entity else {
            panic!("expected location");
        };
        assert_eq!(l.id, Some(7));
        assert_eq!(l.name.as_deref(), Some("Home"));
        assert_eq!(l.encoding_type.as_deref(), Some("application/vnd.geo+json"));
        assert_eq!(
            l.location,
            Some(json!({"type": "Point", "coordinates": [5.0, 52.0]}))
        );
        assert_eq!(l.description, None);
    }

    #[test]
    fn test_decode_datastream_codes() {
        let values = [
            ("DATASTREAM_ID", json!("12")),
            ("datastream_observationtype", json!(3)),
            ("datastream_unitofmeasurement", json!({"symbol": "degC"})),
        ];
        let Entity::Datastream(d) = datastream(&columns("datastream", &values)).unwrap() else {
            panic!("expected datastream");
        };
        assert_eq!(d.id, Some(12));
        assert_eq!(
            d.observation_type.as_deref(),
            Some("http://www.opengis.net/def/observationType/OGC-OM/2.0/OM_Measurement")
        );
        assert_eq!(d.unit_of_measurement, Some(json!({"symbol": "degC"})));
    }

    #[test]
    fn test_jsonb_string_scalars_are_kept() {
        for properties in [json!("42"), json!("hello"), json!({"floor": 2})] {
            let values = [
                ("thing_id", json!(1)),
                ("thing_properties", properties.clone()),
            ];
            let Entity::Thing(t) = thing(&columns("thing", &values)).unwrap() else {
                panic!("expected thing");
            };
            assert_eq!(t.properties, Some(properties));
        }

        let values = [
            ("datastream_id", json!(1)),
            ("datastream_unitofmeasurement", json!("degC")),
        ];
        let Entity::Datastream(d) = datastream(&columns("datastream", &values)).unwrap() else {
            panic!("expected datastream");
        };
        assert_eq!(d.unit_of_measurement, Some(json!("degC")));
    }

    #[test]
    fn test_zero_code_means_unset() {
        let values = [("sensor_id", json!(1)), ("sensor_encodingtype", json!(0))];
        let Entity::Sensor(s) = sensor(&columns("sensor", &values)).unwrap() else {
            panic!("expected sensor");
        };
        assert_eq!(s.encoding_type, None);
    }

    #[test]
    fn test_observation_result_keeps_json_strings() {
        let values = [
            ("observation_id", json!(1)),
            ("observation_result", json!("on")),
            ("observation_parameters", json!(r#"{"battery": 80}"#)),
        ];
        let Entity::Observation(o) = observation(&columns("observation", &values)).unwrap() else {
            panic!("expected observation");
        };
        assert_eq!(o.result, Some(json!("on")));
        assert_eq!(o.parameters, Some(json!({"battery": 80})));
    }

    #[test]
    fn test_decode_errors() {
        let values = [("location_id", json!(1)), ("location_location", json!("{oops"))];
        let err = location(&columns("location", &values)).unwrap_err();
        assert!(matches!(err, MaterializeError::InvalidJson { ref column, .. } if column == "location_location"));

        let values = [("thing_id", json!(true))];
        assert!(matches!(
            thing(&columns("thing", &values)),
            Err(MaterializeError::UnexpectedValue { .. })
        ));

        let values = [("sensor_id", json!(1)), ("sensor_encodingtype", json!(99))];
        assert!(matches!(
            sensor(&columns("sensor", &values)),
            Err(MaterializeError::Model(_))
        ));
    }

    #[test]
    fn test_null_detection() {
        let values = [("thing_id", Value::Null), ("thing_name", Value::Null)];
        assert!(columns("thing", &values).is_null());
        let values = [("thing_id", json!(1)), ("thing_name", Value::Null)];
        assert!(!columns("thing", &values).is_null());
    }
}
