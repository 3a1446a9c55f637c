use crate::domain::entities::Mutation;
use crate::domain::value_objects::{CacheKey, MutationId};
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Durable, ordered log of pending writes plus the per-key sync bookkeeping the
/// staleness check relies on.
#[async_trait]
pub trait MutationStore: Send + Sync {
    async fn append(&self, mutation: &Mutation) -> Result<(), AppError>;
    /// Pending mutations ordered by `(created_at, sequence)`.
    async fn list_pending(&self) -> Result<Vec<Mutation>, AppError>;
    async fn get(&self, id: &MutationId) -> Result<Option<Mutation>, AppError>;
    /// Returns whether a row was deleted; absent ids are not an error.
    async fn remove(&self, id: &MutationId) -> Result<bool, AppError>;
    /// Returns the new retry count.
    async fn increment_retry(&self, id: &MutationId) -> Result<u32, AppError>;
    /// Swaps a confirmed temp id for the server id in every queued entity id and payload.
    async fn rewrite_entity_reference(&self, temp_id: &str, server_id: &str)
    -> Result<u64, AppError>;
    /// Highest sequence number and newest `created_at` ever handed out.
    async fn high_water_mark(&self) -> Result<Option<(u64, DateTime<Utc>)>, AppError>;
    async fn mark_cache_synced(&self, key: &CacheKey, at: DateTime<Utc>) -> Result<(), AppError>;
    async fn last_synced_at(&self, key: &CacheKey) -> Result<Option<DateTime<Utc>>, AppError>;
}
