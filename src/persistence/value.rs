//! Dynamic payload values with date revival
//!
//! `StateValue` is the untyped payload used when the caller has no concrete
//! struct to deserialize into (configuration export/import, the CLI).
//! Deserializing one revives dates: any string shaped like an ISO-8601
//! datetime becomes [`StateValue::Date`], recursively through arrays and
//! objects. Serializing writes dates back as RFC 3339 strings.
//!
//! The heuristic can misfire on plain strings that merely look like
//! timestamps; such a string comes back as a `Date`. Dates are written
//! with millisecond precision, so a revived value with finer digits loses
//! them on the next save or export.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use regex::Regex;
use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{Serialize, Serializer};
use serde_json::{Number, Value};

/// Datetime strings eligible for revival: `YYYY-MM-DDTHH:MM:SS`, optional
/// fraction, optional `Z` or `±HH:MM` offset
static ISO_DATETIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:\.\d{1,9})?(?:Z|[+-]\d{2}:\d{2})?$")
        .expect("ISO-8601 pattern compiles")
});

/// Parse an ISO-8601 datetime string, treating offset-less values as UTC.
///
/// Returns `None` for strings that do not match the pattern or name an
/// impossible date (e.g. month 13).
pub fn parse_iso_datetime(s: &str) -> Option<DateTime<Utc>> {
    if !ISO_DATETIME.is_match(s) {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Render a datetime the way browsers do (`2024-03-01T09:30:00.000Z`);
/// anything below a millisecond is truncated
pub fn format_iso_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// A JSON-like value whose datetime strings have been revived
#[derive(Debug, Clone, PartialEq, Default)]
pub enum StateValue {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Date(DateTime<Utc>),
    Array(Vec<StateValue>),
    /// Keys are kept sorted so exports diff cleanly
    Object(BTreeMap<String, StateValue>),
}

impl StateValue {
    /// Revive a string: dates become `Date`, everything else stays text
    pub fn from_text(s: impl Into<String>) -> Self {
        let s = s.into();
        match parse_iso_datetime(&s) {
            Some(dt) => StateValue::Date(dt),
            None => StateValue::String(s),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, StateValue::Null)
    }

    pub fn as_date(&self) -> Option<&DateTime<Utc>> {
        match self {
            StateValue::Date(dt) => Some(dt),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            StateValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            StateValue::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    /// Look up a field of an object value
    pub fn get(&self, key: &str) -> Option<&StateValue> {
        match self {
            StateValue::Object(map) => map.get(key),
            _ => None,
        }
    }
}

impl From<Value> for StateValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => StateValue::Null,
            Value::Bool(b) => StateValue::Bool(b),
            Value::Number(n) => StateValue::Number(n),
            Value::String(s) => StateValue::from_text(s),
            Value::Array(items) => StateValue::Array(items.into_iter().map(Into::into).collect()),
            Value::Object(map) => {
                StateValue::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl From<StateValue> for Value {
    fn from(value: StateValue) -> Self {
        match value {
            StateValue::Null => Value::Null,
            StateValue::Bool(b) => Value::Bool(b),
            StateValue::Number(n) => Value::Number(n),
            StateValue::String(s) => Value::String(s),
            StateValue::Date(dt) => Value::String(format_iso_datetime(&dt)),
            StateValue::Array(items) => Value::Array(items.into_iter().map(Into::into).collect()),
            StateValue::Object(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl From<&str> for StateValue {
    fn from(s: &str) -> Self {
        StateValue::String(s.to_string())
    }
}

impl From<bool> for StateValue {
    fn from(b: bool) -> Self {
        StateValue::Bool(b)
    }
}

impl From<i64> for StateValue {
    fn from(n: i64) -> Self {
        StateValue::Number(n.into())
    }
}

impl From<f64> for StateValue {
    /// Non-finite numbers have no JSON form and become `Null`
    fn from(n: f64) -> Self {
        Number::from_f64(n).map_or(StateValue::Null, StateValue::Number)
    }
}

impl From<DateTime<Utc>> for StateValue {
    fn from(dt: DateTime<Utc>) -> Self {
        StateValue::Date(dt)
    }
}

impl Serialize for StateValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            StateValue::Null => serializer.serialize_unit(),
            StateValue::Bool(b) => serializer.serialize_bool(*b),
            StateValue::Number(n) => n.serialize(serializer),
            StateValue::String(s) => serializer.serialize_str(s),
            StateValue::Date(dt) => serializer.serialize_str(&format_iso_datetime(dt)),
            StateValue::Array(items) => serializer.collect_seq(items),
            StateValue::Object(map) => serializer.collect_map(map),
        }
    }
}

struct StateValueVisitor;

impl<'de> Visitor<'de> for StateValueVisitor {
    type Value = StateValue;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("any JSON value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<StateValue, E> {
        Ok(StateValue::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<StateValue, E> {
        Ok(StateValue::Number(v.into()))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<StateValue, E> {
        Ok(StateValue::Number(v.into()))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<StateValue, E> {
        Ok(StateValue::from(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<StateValue, E> {
        Ok(StateValue::from_text(v))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<StateValue, E> {
        Ok(StateValue::from_text(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<StateValue, E> {
        Ok(StateValue::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<StateValue, E> {
        Ok(StateValue::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<StateValue, D::Error> {
        StateValue::deserialize(deserializer)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<StateValue, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(StateValue::Array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<StateValue, A::Error> {
        let mut map = BTreeMap::new();
        while let Some((key, value)) = access.next_entry::<String, StateValue>()? {
            map.insert(key, value);
        }
        Ok(StateValue::Object(map))
    }
}

impl<'de> Deserialize<'de> for StateValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(StateValueVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_sub_millisecond_digits_are_dropped_on_write() {
        let value: StateValue = serde_json::from_str(r#""2024-03-01T09:30:00.123456Z""#).unwrap();
        assert!(value.as_date().is_some());
        assert_eq!(serde_json::to_string(&value).unwrap(), r#""2024-03-01T09:30:00.123Z""#);
    }

    #[test]
    fn test_parse_iso_variants() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
        assert_eq!(parse_iso_datetime("2024-03-01T09:30:00.000Z"), Some(expected));
        assert_eq!(parse_iso_datetime("2024-03-01T09:30:00Z"), Some(expected));
        assert_eq!(parse_iso_datetime("2024-03-01T09:30:00"), Some(expected));
        assert_eq!(parse_iso_datetime("2024-03-01T11:30:00+02:00"), Some(expected));
    }

    #[test]
    fn test_non_dates_are_left_alone() {
        assert_eq!(parse_iso_datetime("2024-03-01"), None);
        assert_eq!(parse_iso_datetime("March 1st"), None);
        assert_eq!(parse_iso_datetime("2024-13-45T09:30:00Z"), None);
        assert_eq!(parse_iso_datetime(" 2024-03-01T09:30:00Z"), None);
    }

    #[test]
    fn test_revival_is_recursive() {
        let json = r#"{"hired":"2023-06-15T08:00:00.000Z","notes":["2024-01-02T03:04:05Z","plain"],"n":3}"#;
        let value: StateValue = serde_json::from_str(json).unwrap();

        assert!(value.get("hired").and_then(StateValue::as_date).is_some());
        match value.get("notes") {
            Some(StateValue::Array(items)) => {
                assert!(items[0].as_date().is_some());
                assert_eq!(items[1].as_str(), Some("plain"));
            }
            other => panic!("expected array, got {:?}", other),
        }
        assert_eq!(value.get("n").and_then(StateValue::as_f64), Some(3.0));
    }

    #[test]
    fn test_dates_serialize_as_browser_iso_strings() {
        let dt = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
        let json = serde_json::to_string(&StateValue::Date(dt)).unwrap();
        assert_eq!(json, "\"2024-03-01T09:30:00.000Z\"");
    }

    #[test]
    fn test_object_keys_serialize_sorted() {
        let value: StateValue = serde_json::from_str(r#"{"b":1,"a":2}"#).unwrap();
        assert_eq!(serde_json::to_string(&value).unwrap(), r#"{"a":2,"b":1}"#);
    }

    #[test]
    fn test_from_json_value_matches_deserialize() {
        let raw = serde_json::json!({"at": "2024-01-02T03:04:05Z", "ok": true});
        let via_from = StateValue::from(raw.clone());
        let via_de: StateValue = serde_json::from_value(raw).unwrap();
        assert_eq!(via_from, via_de);
    }
}
