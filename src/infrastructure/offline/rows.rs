use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MutationRow {
    pub sequence: i64,
    pub id: String,
    pub mutation_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub payload: String,
    pub created_at: i64,
    pub retry_count: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct QueueClockRow {
    pub last_sequence: i64,
    pub last_created_at: i64,
}
