use crate::error::{CoreError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use time::format_description::BorrowedFormatItem;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

/// Storage representation of instants: UTC with millisecond precision.
const CANONICAL_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z");

/// An RFC 3339 instant that renders in the canonical
/// `YYYY-MM-DDTHH:MM:SS.mmmZ` form used by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IsoTimestamp(OffsetDateTime);

impl IsoTimestamp {
    pub fn new(datetime: OffsetDateTime) -> Self {
        Self(datetime.to_offset(UtcOffset::UTC))
    }

    pub fn inner(&self) -> &OffsetDateTime {
        &self.0
    }

    pub fn into_inner(self) -> OffsetDateTime {
        self.0
    }
}

impl fmt::Display for IsoTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let formatted = self.0.format(CANONICAL_FORMAT).map_err(|_| fmt::Error)?;
        f.write_str(&formatted)
    }
}

impl FromStr for IsoTimestamp {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let datetime = OffsetDateTime::parse(s.trim(), &Rfc3339).map_err(|e| {
            CoreError::invalid_timestamp(format!("Failed to parse timestamp '{s}': {e}"))
        })?;
        Ok(IsoTimestamp::new(datetime))
    }
}

impl Serialize for IsoTimestamp {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for IsoTimestamp {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        IsoTimestamp::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Re-renders an RFC 3339 string in canonical storage form.
pub fn normalize_timestamp(value: &str) -> Result<String> {
    Ok(IsoTimestamp::from_str(value)?.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_display_is_canonical() {
        let ts = IsoTimestamp::new(datetime!(2023-05-15 14:30:00 UTC));
        assert_eq!(ts.to_string(), "2023-05-15T14:30:00.000Z");
    }

    #[test]
    fn test_from_str_converts_to_utc() {
        let ts = IsoTimestamp::from_str("2023-05-15T14:30:00+02:00").unwrap();
        assert_eq!(ts.to_string(), "2023-05-15T12:30:00.000Z");
        assert_eq!(ts.inner().offset(), UtcOffset::UTC);
    }

    #[test]
    fn test_from_str_truncates_to_millis() {
        let ts = IsoTimestamp::from_str("2020-01-01T00:00:00.123456789Z").unwrap();
        assert_eq!(ts.to_string(), "2020-01-01T00:00:00.123Z");
    }

    #[test]
    fn test_from_str_invalid() {
        assert!(IsoTimestamp::from_str("invalid-date").is_err());
        assert!(IsoTimestamp::from_str("2023-13-01T00:00:00Z").is_err());
        assert!(IsoTimestamp::from_str("2023-01-01").is_err());
        assert!(IsoTimestamp::from_str("").is_err());
    }

    #[test]
    fn test_normalize_timestamp() {
        assert_eq!(
            normalize_timestamp("2020-01-01T00:00:00Z").unwrap(),
            "2020-01-01T00:00:00.000Z"
        );
        assert!(normalize_timestamp("not a time").is_err());
    }

    #[test]
    fn test_serde() {
        let ts = IsoTimestamp::new(datetime!(2023-05-15 14:30:00 UTC));
        let json = serde_json::to_string(&ts).unwrap();
        assert_eq!(json, "\"2023-05-15T14:30:00.000Z\"");

        let back: IsoTimestamp = serde_json::from_str("\"2023-05-15T14:30:00Z\"").unwrap();
        assert_eq!(back, ts);
        assert!(serde_json::from_str::<IsoTimestamp>("\"soon\"").is_err());
    }
}
