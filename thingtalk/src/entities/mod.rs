//! Entities: typed literals that the machine-oriented syntaxes replace with
//! numbered placeholders (`NUMBER_0`, `QUOTED_STRING_1`, ...)
//!
//! An [`EntityMap`] maps placeholder names to their values. Retrievers map
//! values back to placeholder tokens: [`EntityRetriever`] against a known
//! sentence and map, [`SequentialEntityAllocator`] by allocating new
//! placeholders as values are seen.

pub mod allocator;
pub mod error;
pub mod retriever;

pub use allocator::SequentialEntityAllocator;
pub use error::{EntityError, EntityResult};
pub use retriever::{AbstractEntityRetriever, EntityRetriever, FindEntityOptions};

use crate::ast::values::{LocationValue, TimeValue, Value};
use crate::config::compile_time::entities::LOCATION_EPSILON;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// JSON-compatible entity value, as found in entity maps exchanged with parsers.
///
/// Variants are tried in order, so objects with optional fields come last.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnyEntity {
    Number(f64),
    /// Strings, string-like entities and dates in RFC 3339 form
    String(String),
    Time {
        hour: u32,
        minute: u32,
        #[serde(default)]
        second: u32,
    },
    Measure { value: f64, unit: String },
    Currency { value: f64, code: String },
    Location {
        latitude: f64,
        longitude: f64,
        #[serde(default)]
        display: Option<String>,
    },
    Generic {
        #[serde(default)]
        value: Option<String>,
        #[serde(default)]
        display: Option<String>,
    },
}

/// Placeholder name to value, ordered by name
pub type EntityMap = BTreeMap<String, AnyEntity>;

/// Entity type of a placeholder name: `NUMBER_0` -> `NUMBER`
pub fn entity_type_of(placeholder: &str) -> &str {
    placeholder
        .rsplit_once('_')
        .map(|(entity_type, _)| entity_type)
        .unwrap_or(placeholder)
}

/// Types whose entities are bare strings in the entity map
pub(crate) fn string_entity_type(entity_type: &str) -> Option<&'static str> {
    match entity_type {
        "QUOTED_STRING" => Some(""),
        "HASHTAG" => Some("tt:hashtag"),
        "USERNAME" => Some("tt:username"),
        "URL" => Some("tt:url"),
        "PHONE_NUMBER" => Some("tt:phone_number"),
        "EMAIL_ADDRESS" => Some("tt:email_address"),
        "PATH_NAME" => Some("tt:path_name"),
        "PICTURE" => Some("tt:picture"),
        _ => None,
    }
}

/// The string carried by string values and string-like entities
pub(crate) fn string_of(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => Some(s),
        Value::Entity(entity) => entity.value.as_deref(),
        _ => None,
    }
}

impl AnyEntity {
    /// Entity-map form of a constant value
    pub fn from_value(
        entity_type: &str,
        value: &Value,
        now: DateTime<FixedOffset>,
    ) -> EntityResult<Self> {
        let invalid = || EntityError::invalid_value(entity_type, &value.to_source().to_string());
        Ok(match value {
            Value::Number(n) => AnyEntity::Number(*n),
            Value::String(s) => AnyEntity::String(s.clone()),
            Value::Measure(measure) => AnyEntity::Measure {
                value: measure.value,
                unit: measure.unit.clone(),
            },
            Value::Currency(currency) => AnyEntity::Currency {
                value: currency.value,
                code: currency.code.clone(),
            },
            Value::Entity(entity) if string_entity_type(entity_type).is_some() => {
                AnyEntity::String(entity.value.clone().ok_or_else(invalid)?)
            }
            Value::Entity(entity) => AnyEntity::Generic {
                value: entity.value.clone(),
                display: entity.display.clone(),
            },
            Value::Location(LocationValue::Absolute {
                latitude,
                longitude,
                display,
            }) => AnyEntity::Location {
                latitude: *latitude,
                longitude: *longitude,
                display: display.clone(),
            },
            Value::Date(date) => AnyEntity::String(date.resolve(now).ok_or_else(invalid)?.to_rfc3339()),
            Value::Time(TimeValue::Absolute {
                hour,
                minute,
                second,
            }) => AnyEntity::Time {
                hour: *hour,
                minute: *minute,
                second: *second,
            },
            _ => return Err(invalid()),
        })
    }
}

/// Whether `value` denotes the same entity as `entity`, compared the way
/// `entity_type` requires
pub fn entities_equal(
    entity_type: &str,
    value: &Value,
    entity: &AnyEntity,
    now: DateTime<FixedOffset>,
) -> bool {
    match (value, entity) {
        (Value::Number(a), AnyEntity::Number(b)) => a == b,
        (Value::Measure(a), AnyEntity::Measure { value, unit }) => {
            a.value == *value && a.unit == *unit
        }
        (Value::Currency(a), AnyEntity::Currency { value, code }) => {
            a.value == *value && a.code.eq_ignore_ascii_case(code)
        }
        (Value::Entity(a), AnyEntity::Generic { value, display }) => match (&a.value, value) {
            (Some(a), Some(b)) => a == b,
            _ => match (&a.display, display) {
                (Some(a), Some(b)) => a.to_lowercase() == b.to_lowercase(),
                _ => false,
            },
        },
        (Value::Date(date), AnyEntity::String(s)) => {
            match (date.resolve(now), DateTime::parse_from_rfc3339(s)) {
                (Some(a), Ok(b)) => a == b,
                _ => false,
            }
        }
        (
            Value::Time(TimeValue::Absolute {
                hour,
                minute,
                second,
            }),
            AnyEntity::Time {
                hour: h,
                minute: m,
                second: s,
            },
        ) => hour == h && minute == m && second == s,
        (Value::Location(location), AnyEntity::Location {
            latitude,
            longitude,
            display,
        }) => match location {
            LocationValue::Absolute {
                latitude: lat,
                longitude: lon,
                ..
            } => (lat - latitude).abs() < LOCATION_EPSILON && (lon - longitude).abs() < LOCATION_EPSILON,
            LocationValue::Unresolved { name } => display.as_deref() == Some(name.as_str()),
            LocationValue::Relative(_) => false,
        },
        (value, AnyEntity::String(s)) if string_entity_type(entity_type).is_some() => {
            string_of(value) == Some(s.as_str())
        }
        _ => false,
    }
}

/// Render an entity map for diagnostics
pub(crate) fn describe(entities: &EntityMap) -> String {
    serde_json::to_string(entities).unwrap_or_else(|_| format!("{} entities", entities.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::values::{DateValue, EntityValue, MeasureValue};

    fn now() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2024-05-15T10:30:45+02:00").unwrap()
    }

    #[test]
    fn test_entity_map_json() {
        let json = r#"{
            "NUMBER_0": 42,
            "QUOTED_STRING_0": "hello",
            "TIME_0": { "hour": 7, "minute": 30 },
            "MEASURE_C_0": { "value": 20, "unit": "C" },
            "LOCATION_0": { "latitude": 37.4, "longitude": -122.1, "display": "Palo Alto" },
            "GENERIC_ENTITY_tt:device_0": { "value": "com.twitter", "display": "Twitter" }
        }"#;
        let map: EntityMap = serde_json::from_str(json).unwrap();
        assert_eq!(map["NUMBER_0"], AnyEntity::Number(42.0));
        assert_eq!(
            map["TIME_0"],
            AnyEntity::Time {
                hour: 7,
                minute: 30,
                second: 0
            }
        );
        assert!(matches!(map["MEASURE_C_0"], AnyEntity::Measure { .. }));
        assert!(matches!(map["LOCATION_0"], AnyEntity::Location { .. }));
        assert!(matches!(map["GENERIC_ENTITY_tt:device_0"], AnyEntity::Generic { .. }));
        assert_eq!(entity_type_of("GENERIC_ENTITY_tt:device_0"), "GENERIC_ENTITY_tt:device");
    }

    #[test]
    fn test_entities_equal() {
        let measure = Value::Measure(MeasureValue::new(20.0, "C"));
        let entity = AnyEntity::Measure {
            value: 20.0,
            unit: "C".into(),
        };
        assert!(entities_equal("MEASURE_C", &measure, &entity, now()));

        let device = Value::Entity(EntityValue::new(None, "tt:device", Some("twitter")));
        let generic = AnyEntity::Generic {
            value: Some("com.twitter".into()),
            display: Some("Twitter".into()),
        };
        assert!(entities_equal("GENERIC_ENTITY_tt:device", &device, &generic, now()));

        let near = Value::Location(LocationValue::Absolute {
            latitude: 37.4,
            longitude: -122.1 + LOCATION_EPSILON / 2.0,
            display: None,
        });
        let location = AnyEntity::Location {
            latitude: 37.4,
            longitude: -122.1,
            display: None,
        };
        assert!(entities_equal("LOCATION", &near, &location, now()));

        let date = Value::Date(DateValue::Now);
        let instant = AnyEntity::String(now().to_rfc3339());
        assert!(entities_equal("DATE", &date, &instant, now()));

        let hashtag = Value::Entity(EntityValue::new(Some("rust"), "tt:hashtag", None));
        assert!(entities_equal("HASHTAG", &hashtag, &AnyEntity::String("rust".into()), now()));
        assert!(!entities_equal("NUMBER", &Value::Number(1.0), &AnyEntity::Number(2.0), now()));
    }
}
