//! Code tables for values stored as small integers.
//!
//! `encodingType` and `observationType` are persisted as codes and
//! rendered back to their URI/media-type values on read. The codes are
//! part of the storage format and must not be renumbered.

use crate::error::{CoreError, Result};

/// A supported `encodingType` value and its storage code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodingType {
    pub code: i64,
    pub value: &'static str,
}

impl EncodingType {
    pub const UNKNOWN: EncodingType = EncodingType::new(0, "unknown");
    pub const GEO_JSON: EncodingType = EncodingType::new(1, "application/vnd.geo+json");
    pub const PDF: EncodingType = EncodingType::new(2, "application/pdf");
    pub const SENSOR_ML: EncodingType =
        EncodingType::new(3, "http://www.opengis.net/doc/IS/SensorML/2.0");
    pub const TEXT_HTML: EncodingType = EncodingType::new(4, "text/html");
    pub const LOCATION_TYPE: EncodingType =
        EncodingType::new(5, "http://example.org/location_types#GeoJSON");
    pub const DESCRIPTION: EncodingType = EncodingType::new(6, "http://schema.org/description");

    pub const ALL: [EncodingType; 7] = [
        Self::UNKNOWN,
        Self::GEO_JSON,
        Self::PDF,
        Self::SENSOR_ML,
        Self::TEXT_HTML,
        Self::LOCATION_TYPE,
        Self::DESCRIPTION,
    ];

    const fn new(code: i64, value: &'static str) -> Self {
        Self { code, value }
    }

    /// Looks up an encoding by its exact value.
    pub fn from_value(value: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|e| e.value == value)
            .ok_or_else(|| CoreError::unsupported_encoding(value))
    }

    pub fn from_code(code: i64) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|e| e.code == code)
            .ok_or(CoreError::UnknownCode {
                kind: "encoding",
                code,
            })
    }
}

const OM_PREFIX: &str = "http://www.opengis.net/def/observationType/OGC-OM/2.0/";

/// A supported Datastream `observationType` and its storage code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObservationType {
    pub code: i64,
    suffix: &'static str,
}

impl ObservationType {
    pub const CATEGORY: ObservationType = ObservationType::new(1, "OM_CategoryObservation");
    pub const COUNT: ObservationType = ObservationType::new(2, "OM_CountObservation");
    pub const MEASUREMENT: ObservationType = ObservationType::new(3, "OM_Measurement");
    pub const OBSERVATION: ObservationType = ObservationType::new(4, "OM_Observation");
    pub const TRUTH: ObservationType = ObservationType::new(5, "OM_TruthObservation");

    pub const ALL: [ObservationType; 5] = [
        Self::CATEGORY,
        Self::COUNT,
        Self::MEASUREMENT,
        Self::OBSERVATION,
        Self::TRUTH,
    ];

    const fn new(code: i64, suffix: &'static str) -> Self {
        Self { code, suffix }
    }

    /// Full observation type URI.
    pub fn value(&self) -> String {
        format!("{OM_PREFIX}{}", self.suffix)
    }

    pub fn from_value(value: &str) -> Result<Self> {
        value
            .strip_prefix(OM_PREFIX)
            .and_then(|suffix| Self::ALL.into_iter().find(|o| o.suffix == suffix))
            .ok_or_else(|| CoreError::unsupported_observation_type(value))
    }

    pub fn from_code(code: i64) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|o| o.code == code)
            .ok_or(CoreError::UnknownCode {
                kind: "observation type",
                code,
            })
    }
}
