use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

/// A JSON value whose date-shaped strings are held as real timestamps.
///
/// At rest a date is the ISO-8601 UTC string with millisecond precision
/// (`2024-03-01T08:30:00.000Z`); on read any string of that shape is revived.
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadValue {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Date(DateTime<Utc>),
    Array(Vec<PayloadValue>),
    Object(BTreeMap<String, PayloadValue>),
}

impl PayloadValue {
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => PayloadValue::Null,
            Value::Bool(b) => PayloadValue::Bool(b),
            Value::Number(n) => PayloadValue::Number(n),
            Value::String(s) => match revive_date(&s) {
                Some(date) => PayloadValue::Date(date),
                None => PayloadValue::String(s),
            },
            Value::Array(items) => {
                PayloadValue::Array(items.into_iter().map(PayloadValue::from_json).collect())
            }
            Value::Object(map) => PayloadValue::Object(
                map.into_iter()
                    .map(|(key, value)| (key, PayloadValue::from_json(value)))
                    .collect(),
            ),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            PayloadValue::Null => Value::Null,
            PayloadValue::Bool(b) => Value::Bool(*b),
            PayloadValue::Number(n) => Value::Number(n.clone()),
            PayloadValue::String(s) => Value::String(s.clone()),
            PayloadValue::Date(date) => Value::String(format_date(date)),
            PayloadValue::Array(items) => {
                Value::Array(items.iter().map(PayloadValue::to_json).collect())
            }
            PayloadValue::Object(map) => Value::Object(
                map.iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect(),
            ),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PayloadValue::Null => "null",
            PayloadValue::Bool(_) => "bool",
            PayloadValue::Number(_) => "number",
            PayloadValue::String(_) => "string",
            PayloadValue::Date(_) => "date",
            PayloadValue::Array(_) => "array",
            PayloadValue::Object(_) => "object",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PayloadValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            PayloadValue::Date(date) => Some(*date),
            _ => None,
        }
    }

    /// Replaces every string equal to `from` with `to`, returning how many were rewritten.
    pub fn replace_string(&mut self, from: &str, to: &str) -> usize {
        match self {
            PayloadValue::String(s) if s == from => {
                *s = to.to_string();
                1
            }
            PayloadValue::Array(items) => items
                .iter_mut()
                .map(|item| item.replace_string(from, to))
                .sum(),
            PayloadValue::Object(map) => map
                .values_mut()
                .map(|value| value.replace_string(from, to))
                .sum(),
            _ => 0,
        }
    }
}

impl From<DateTime<Utc>> for PayloadValue {
    fn from(value: DateTime<Utc>) -> Self {
        PayloadValue::Date(value)
    }
}

impl From<&str> for PayloadValue {
    fn from(value: &str) -> Self {
        PayloadValue::String(value.to_string())
    }
}

impl Serialize for PayloadValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PayloadValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(PayloadValue::from_json)
    }
}

/// Opaque body of a mutation. Always a JSON object.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MutationPayload(BTreeMap<String, PayloadValue>);

impl MutationPayload {
    pub fn new(value: Value) -> Result<Self, String> {
        match PayloadValue::from_json(value) {
            PayloadValue::Object(map) => Ok(Self(map)),
            other => Err(format!(
                "Mutation payload must be a JSON object, got {}",
                other.kind()
            )),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, String> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| format!("Invalid JSON payload: {e}"))?;
        Self::new(value)
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<PayloadValue>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&PayloadValue> {
        self.0.get(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &PayloadValue)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn replace_string(&mut self, from: &str, to: &str) -> usize {
        self.0
            .values_mut()
            .map(|value| value.replace_string(from, to))
            .sum()
    }

    pub fn to_json_map(&self) -> Map<String, Value> {
        self.0
            .iter()
            .map(|(key, value)| (key.clone(), value.to_json()))
            .collect()
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.to_json_map())
    }

    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.to_json())
    }
}

impl Serialize for MutationPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for MutationPayload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        MutationPayload::new(value).map_err(serde::de::Error::custom)
    }
}

pub fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn revive_date(value: &str) -> Option<DateTime<Utc>> {
    if !looks_like_iso_datetime(value) {
        return None;
    }
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|date| date.with_timezone(&Utc))
}

/// `YYYY-MM-DDTHH:MM:SS[.fff…]Z`
fn looks_like_iso_datetime(value: &str) -> bool {
    let bytes = value.as_bytes();
    if bytes.len() < 20 || bytes[bytes.len() - 1] != b'Z' {
        return false;
    }
    let digit_at = |idx: usize| bytes[idx].is_ascii_digit();
    let shape_ok = (0..4).all(digit_at)
        && bytes[4] == b'-'
        && (5..7).all(digit_at)
        && bytes[7] == b'-'
        && (8..10).all(digit_at)
        && bytes[10] == b'T'
        && (11..13).all(digit_at)
        && bytes[13] == b':'
        && (14..16).all(digit_at)
        && bytes[16] == b':'
        && (17..19).all(digit_at);
    if !shape_ok {
        return false;
    }
    let rest = &bytes[19..bytes.len() - 1];
    match rest.split_first() {
        None => true,
        Some((b'.', fraction)) => !fraction.is_empty() && fraction.iter().all(u8::is_ascii_digit),
        Some(_) => false,
    }
}
