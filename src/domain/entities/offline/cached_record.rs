use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const RESERVED_FIELDS: [&str; 3] = ["id", "_isOptimistic", "_tempId"];

/// A domain entity as it sits in the read cache, possibly ahead of the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CachedRecord {
    pub id: String,
    #[serde(rename = "_isOptimistic", default)]
    pub is_optimistic: bool,
    #[serde(rename = "_tempId", default, skip_serializing_if = "Option::is_none")]
    pub temp_id: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl CachedRecord {
    /// A confirmed record as returned by the server.
    pub fn confirmed(id: impl Into<String>, fields: Map<String, Value>) -> Self {
        let mut record = Self {
            id: id.into(),
            is_optimistic: false,
            temp_id: None,
            fields: Map::new(),
        };
        record.merge_fields(&fields);
        record
    }

    pub fn from_json(value: Value) -> Result<Self, String> {
        serde_json::from_value(value).map_err(|e| format!("Invalid cached record: {e}"))
    }

    pub fn to_json(&self) -> Value {
        let mut map = self.fields.clone();
        map.insert("id".to_string(), Value::String(self.id.clone()));
        map.insert("_isOptimistic".to_string(), Value::Bool(self.is_optimistic));
        if let Some(temp_id) = &self.temp_id {
            map.insert("_tempId".to_string(), Value::String(temp_id.clone()));
        }
        Value::Object(map)
    }

    /// Shallow merge; the identity and optimistic markers are never taken from `patch`.
    pub fn merge_fields(&mut self, patch: &Map<String, Value>) {
        for (key, value) in patch {
            if RESERVED_FIELDS.contains(&key.as_str()) {
                continue;
            }
            self.fields.insert(key.clone(), value.clone());
        }
    }

    pub fn mark_confirmed(&mut self, server_id: impl Into<String>) {
        self.id = server_id.into();
        self.is_optimistic = false;
        self.temp_id = None;
    }

    /// `updatedAt` as an RFC 3339 string or epoch milliseconds.
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        match self.fields.get("updatedAt")? {
            Value::String(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|date| date.with_timezone(&Utc)),
            Value::Number(n) => n.as_i64().and_then(DateTime::<Utc>::from_timestamp_millis),
            _ => None,
        }
    }
}
