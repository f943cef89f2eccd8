//! Leaf value types and their canonical text encoding.

use crate::error::{EngineError, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValueType {
    #[default]
    String,
    Int,
    Decimal,
    Boolean,
    Date,
    Time,
    DateTime,
    Geopoint,
    Binary,
    /// Space separated choices.
    Select,
    /// Space separated choices in order of preference.
    Rank,
}

impl ValueType {
    pub fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Int => "int",
            Self::Decimal => "decimal",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Time => "time",
            Self::DateTime => "dateTime",
            Self::Geopoint => "geopoint",
            Self::Binary => "binary",
            Self::Select => "select",
            Self::Rank => "rank",
        }
    }

    /// Validate `raw` and return its canonical form. Blank is valid for every
    /// type.
    pub fn canonicalize(self, raw: &str) -> Result<String> {
        match ModelValue::decode(self, raw)? {
            ModelValue::Blank => Ok(String::new()),
            value => Ok(value.encode()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Geopoint {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<f64>,
    pub accuracy: Option<f64>,
}

/// A leaf value decoded according to its [`ValueType`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum ModelValue {
    Blank,
    String(String),
    Int(i64),
    Decimal(f64),
    Boolean(bool),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(DateTime<FixedOffset>),
    Geopoint(Geopoint),
    Binary(String),
    Select(Vec<String>),
    Rank(Vec<String>),
}

impl ModelValue {
    pub fn decode(value_type: ValueType, raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(Self::Blank);
        }
        let invalid = |reason: String| EngineError::InvalidValue {
            value_type: value_type.name(),
            value: raw.to_owned(),
            reason,
        };
        let value = match value_type {
            ValueType::String => Self::String(raw.to_owned()),
            ValueType::Binary => Self::Binary(trimmed.to_owned()),
            ValueType::Int => Self::Int(trimmed.parse().map_err(|error| invalid(format!("{error}")))?),
            ValueType::Decimal => {
                let number: f64 = trimmed.parse().map_err(|error| invalid(format!("{error}")))?;
                if !number.is_finite() {
                    return Err(invalid("not a finite number".to_owned()));
                }
                Self::Decimal(number)
            }
            ValueType::Boolean => match trimmed {
                "true" | "1" => Self::Boolean(true),
                "false" | "0" => Self::Boolean(false),
                _ => return Err(invalid("expected true, false, 1 or 0".to_owned())),
            },
            ValueType::Date => Self::Date(
                NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                    .map_err(|error| invalid(error.to_string()))?,
            ),
            ValueType::Time => Self::Time(
                NaiveTime::parse_from_str(trimmed, "%H:%M:%S%.f")
                    .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M"))
                    .map_err(|error| invalid(error.to_string()))?,
            ),
            ValueType::DateTime => Self::DateTime(parse_date_time(trimmed).map_err(invalid)?),
            ValueType::Geopoint => Self::Geopoint(parse_geopoint(trimmed).map_err(invalid)?),
            ValueType::Select => {
                let mut choices: Vec<String> = Vec::new();
                for choice in trimmed.split_whitespace() {
                    if !choices.iter().any(|existing| existing == choice) {
                        choices.push(choice.to_owned());
                    }
                }
                Self::Select(choices)
            }
            ValueType::Rank => {
                let mut choices: Vec<String> = Vec::new();
                for choice in trimmed.split_whitespace() {
                    if choices.iter().any(|existing| existing == choice) {
                        return Err(invalid(format!("'{choice}' is ranked twice")));
                    }
                    choices.push(choice.to_owned());
                }
                Self::Rank(choices)
            }
        };
        Ok(value)
    }

    /// Canonical text form, as stored in the instance.
    pub fn encode(&self) -> String {
        match self {
            Self::Blank => String::new(),
            Self::String(text) | Self::Binary(text) => text.clone(),
            Self::Int(number) => number.to_string(),
            Self::Decimal(number) => number.to_string(),
            Self::Boolean(value) => value.to_string(),
            Self::Date(date) => date.format("%Y-%m-%d").to_string(),
            Self::Time(time) => time.format("%H:%M:%S%.f").to_string(),
            Self::DateTime(date_time) => date_time.to_rfc3339(),
            Self::Geopoint(point) => {
                let mut parts = vec![point.latitude.to_string(), point.longitude.to_string()];
                parts.extend(point.altitude.map(|altitude| altitude.to_string()));
                parts.extend(point.accuracy.map(|accuracy| accuracy.to_string()));
                parts.join(" ")
            }
            Self::Select(choices) | Self::Rank(choices) => choices.join(" "),
        }
    }
}

/// RFC 3339, or a local date-time taken as UTC.
fn parse_date_time(text: &str) -> std::result::Result<DateTime<FixedOffset>, String> {
    if let Ok(date_time) = DateTime::parse_from_rfc3339(text) {
        return Ok(date_time);
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M"))
        .map(|naive| naive.and_utc().fixed_offset())
        .map_err(|error| error.to_string())
}

fn parse_geopoint(text: &str) -> std::result::Result<Geopoint, String> {
    let numbers = text
        .split_whitespace()
        .map(|part| part.parse::<f64>().map_err(|error| format!("'{part}': {error}")))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let [latitude, longitude, rest @ ..] = numbers.as_slice() else {
        return Err("expected latitude and longitude".to_owned());
    };
    if rest.len() > 2 {
        return Err("expected at most four numbers".to_owned());
    }
    if !(-90.0..=90.0).contains(latitude) {
        return Err(format!("latitude {latitude} out of range"));
    }
    if !(-180.0..=180.0).contains(longitude) {
        return Err(format!("longitude {longitude} out of range"));
    }
    Ok(Geopoint {
        latitude: *latitude,
        longitude: *longitude,
        altitude: rest.first().copied(),
        accuracy: rest.get(1).copied(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_is_valid_for_every_type() {
        for value_type in [ValueType::Int, ValueType::Date, ValueType::Geopoint, ValueType::Rank] {
            assert_eq!(value_type.canonicalize("  ").unwrap(), "");
        }
    }

    #[test]
    fn numbers_are_normalized() {
        assert_eq!(ValueType::Int.canonicalize(" 042 ").unwrap(), "42");
        assert_eq!(ValueType::Decimal.canonicalize("2.50").unwrap(), "2.5");
        assert!(ValueType::Int.canonicalize("4.2").is_err());
        assert!(ValueType::Decimal.canonicalize("NaN").is_err());
    }

    #[test]
    fn temporal_values_use_chrono_formats() {
        assert_eq!(ValueType::Date.canonicalize("2024-02-29").unwrap(), "2024-02-29");
        assert!(ValueType::Date.canonicalize("2023-02-29").is_err());
        assert_eq!(ValueType::Time.canonicalize("07:30").unwrap(), "07:30:00");
        assert_eq!(
            ValueType::DateTime.canonicalize("2024-05-01T10:00:00").unwrap(),
            "2024-05-01T10:00:00+00:00"
        );
    }

    #[test]
    fn geopoint_bounds_are_checked() {
        assert_eq!(ValueType::Geopoint.canonicalize("12.5  -7 100").unwrap(), "12.5 -7 100");
        assert!(ValueType::Geopoint.canonicalize("95 0").is_err());
        assert!(ValueType::Geopoint.canonicalize("1").is_err());
    }

    #[test]
    fn select_and_rank_choices() {
        assert_eq!(ValueType::Select.canonicalize("a b a").unwrap(), "a b");
        assert!(ValueType::Rank.canonicalize("a b a").is_err());
        assert_eq!(
            ModelValue::decode(ValueType::Rank, "c a").unwrap(),
            ModelValue::Rank(vec!["c".to_owned(), "a".to_owned()])
        );
    }

    #[test]
    fn boolean_accepts_numeric_form() {
        assert_eq!(ValueType::Boolean.canonicalize("1").unwrap(), "true");
        assert!(ValueType::Boolean.canonicalize("yes").is_err());
    }
}
