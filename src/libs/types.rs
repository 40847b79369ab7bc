use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, SubsecRound, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// Textual format of a `date` column.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Textual format of a `datetime` column, always UTC.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Calendar date stored in a `date` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Date(pub NaiveDate);

impl Date {
    /// Current UTC date.
    pub fn today() -> Self {
        Date(Utc::now().date_naive())
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DATE_FORMAT))
    }
}

impl FromStr for Date {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
            .map(Date)
            .map_err(|e| Error::decode("date", format!("{s:?}: {e}")))
    }
}

impl From<NaiveDate> for Date {
    fn from(v: NaiveDate) -> Self {
        Date(v)
    }
}

/// UTC date and time with second precision, stored in a `datetime` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct DateTime(pub NaiveDateTime);

impl DateTime {
    /// Current UTC time truncated to whole seconds, the precision of a
    /// `datetime` column.
    pub fn now() -> Self {
        DateTime(Utc::now().naive_utc().trunc_subsecs(0))
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DATETIME_FORMAT))
    }
}

impl FromStr for DateTime {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        NaiveDateTime::parse_from_str(s.trim(), DATETIME_FORMAT)
            .map(DateTime)
            .map_err(|e| Error::decode("datetime", format!("{s:?}: {e}")))
    }
}

impl From<NaiveDateTime> for DateTime {
    fn from(v: NaiveDateTime) -> Self {
        DateTime(v)
    }
}

impl Serialize for Date {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Date {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl Serialize for DateTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DateTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_uses_fixed_formats() {
        let dt: DateTime = "2024-03-01 13:45:00".parse().unwrap();
        assert_eq!(
            serde_json::to_string(&dt).unwrap(),
            "\"2024-03-01 13:45:00\""
        );
        let back: DateTime = serde_json::from_str("\"2024-03-01 13:45:00\"").unwrap();
        assert_eq!(back, dt);

        let date: Date = serde_json::from_str("\"2024-03-01\"").unwrap();
        assert_eq!(date.to_string(), "2024-03-01");
    }

    #[test]
    fn now_has_no_fraction() {
        use chrono::Timelike;
        assert_eq!(DateTime::now().0.nanosecond(), 0);
    }
}
