use thiserror::Error;

use crate::entity_type::EntityType;

/// Core error types for SensorThings entity handling
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid entity type: {0}")]
    InvalidEntityType(String),

    #[error("Encoding not supported: {0}")]
    UnsupportedEncoding(String),

    #[error("Observation type not supported: {0}")]
    UnsupportedObservationType(String),

    #[error("Unknown {kind} code: {code}")]
    UnknownCode { kind: &'static str, code: i64 },

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("{child} cannot be attached to {parent}")]
    InvalidRelation {
        parent: EntityType,
        child: EntityType,
    },
}

impl CoreError {
    /// Create a new InvalidEntityType error
    pub fn invalid_entity_type(name: impl Into<String>) -> Self {
        Self::InvalidEntityType(name.into())
    }

    /// Create a new UnsupportedEncoding error
    pub fn unsupported_encoding(value: impl Into<String>) -> Self {
        Self::UnsupportedEncoding(value.into())
    }

    /// Create a new UnsupportedObservationType error
    pub fn unsupported_observation_type(value: impl Into<String>) -> Self {
        Self::UnsupportedObservationType(value.into())
    }

    /// Create a new InvalidTimestamp error
    pub fn invalid_timestamp(value: impl Into<String>) -> Self {
        Self::InvalidTimestamp(value.into())
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::unsupported_encoding("text/plain");
        assert_eq!(err.to_string(), "Encoding not supported: text/plain");

        let err = CoreError::UnknownCode {
            kind: "encoding",
            code: 42,
        };
        assert_eq!(err.to_string(), "Unknown encoding code: 42");

        let err = CoreError::InvalidRelation {
            parent: EntityType::Sensor,
            child: EntityType::Thing,
        };
        assert_eq!(err.to_string(), "Thing cannot be attached to Sensor");
    }
}
