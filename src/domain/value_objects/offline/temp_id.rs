use super::EntityType;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Reserved prefix of locally generated identifiers. Server ids never start with it.
pub const TEMP_ID_PREFIX: &str = "temp_";

/// Placeholder identifier for an entity the server has not confirmed yet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TempId(String);

impl TempId {
    pub fn generate() -> Self {
        Self(format!("{TEMP_ID_PREFIX}{}", Uuid::new_v4()))
    }

    pub fn for_entity(entity_type: &EntityType) -> Self {
        Self(format!("{TEMP_ID_PREFIX}{}-{}", entity_type, Uuid::new_v4()))
    }

    pub fn parse(value: &str) -> Result<Self, String> {
        if !is_temp_id(value) {
            return Err(format!("'{value}' is not a temporary id"));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub fn is_temp_id(value: &str) -> bool {
    value.starts_with(TEMP_ID_PREFIX)
}

impl fmt::Display for TempId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<TempId> for String {
    fn from(value: TempId) -> Self {
        value.0
    }
}

impl TryFrom<String> for TempId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}
