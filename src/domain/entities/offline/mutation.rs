use crate::domain::value_objects::{
    CacheKey, EntityId, EntityType, MutationId, MutationPayload, MutationType, TempId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Raw mutation as handed over by a caller, before any validation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MutationDraft {
    pub id: String,
    #[serde(rename = "type")]
    pub mutation_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub payload: Value,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl MutationDraft {
    pub fn new(
        mutation_type: MutationType,
        entity_type: &EntityType,
        entity_id: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            id: MutationId::generate().to_string(),
            mutation_type: mutation_type.as_str().to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.into(),
            payload,
            created_at: None,
        }
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }
}

/// A pending write held by the queue until it is synced or permanently failed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Mutation {
    pub id: MutationId,
    #[serde(rename = "type")]
    pub mutation_type: MutationType,
    pub entity_type: EntityType,
    pub entity_id: EntityId,
    pub payload: MutationPayload,
    pub created_at: DateTime<Utc>,
    pub retry_count: u32,
    /// Logical clock assigned at enqueue; breaks ties between equal timestamps.
    pub sequence: u64,
}

impl Mutation {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: MutationId,
        mutation_type: MutationType,
        entity_type: EntityType,
        entity_id: EntityId,
        payload: MutationPayload,
        created_at: DateTime<Utc>,
        retry_count: u32,
        sequence: u64,
    ) -> Self {
        Self {
            id,
            mutation_type,
            entity_type,
            entity_id,
            payload,
            created_at: truncate_to_millis(created_at),
            retry_count,
            sequence,
        }
    }

    pub fn cache_key(&self) -> CacheKey {
        CacheKey::for_entity_type(&self.entity_type)
    }

    /// The temp id this mutation introduced, for creates of not-yet-confirmed entities.
    pub fn introduced_temp_id(&self) -> Option<TempId> {
        if self.mutation_type != MutationType::Create {
            return None;
        }
        TempId::parse(self.entity_id.as_str()).ok()
    }

    pub fn targets_same_entity(&self, other: &Mutation) -> bool {
        self.entity_type == other.entity_type && self.entity_id == other.entity_id
    }

    pub fn order_key(&self) -> (DateTime<Utc>, u64) {
        (self.created_at, self.sequence)
    }
}

pub fn truncate_to_millis(value: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(value.timestamp_millis()).unwrap_or(value)
}
