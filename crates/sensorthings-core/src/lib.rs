pub mod codes;
pub mod entities;
pub mod entity_type;
pub mod error;
pub mod time;

pub use codes::{EncodingType, ObservationType};
pub use entities::{
    Datastream, Entity, FeatureOfInterest, HistoricalLocation, Location, Observation,
    ObservedProperty, Sensor, Thing,
};
pub use entity_type::{Cardinality, EntityType};
pub use error::{CoreError, Result};
pub use self::time::{IsoTimestamp, normalize_timestamp};
