use super::mappers::{mutation_from_row, sequence_to_db, timestamp_from_millis};
use super::queries::*;
use super::rows::{MutationRow, QueueClockRow};
use crate::application::ports::MutationStore;
use crate::domain::entities::Mutation;
use crate::domain::value_objects::{CacheKey, MutationId};
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Sqlite};
use tracing::debug;

/// SQLite-backed queue. A mutation is durable once `append` returns.
pub struct SqliteMutationStore {
    pool: Pool<Sqlite>,
}

impl SqliteMutationStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl MutationStore for SqliteMutationStore {
    async fn append(&self, mutation: &Mutation) -> Result<(), AppError> {
        let sequence = sequence_to_db(mutation.sequence)?;
        let created_at = mutation.created_at.timestamp_millis();
        let payload = mutation.payload.to_json_string()?;

        let mut tx = self.pool.begin().await?;
        let inserted = sqlx::query(INSERT_MUTATION)
            .bind(sequence)
            .bind(mutation.id.as_str())
            .bind(mutation.mutation_type.as_str())
            .bind(mutation.entity_type.as_str())
            .bind(mutation.entity_id.as_str())
            .bind(&payload)
            .bind(created_at)
            .bind(i64::from(mutation.retry_count))
            .execute(&mut *tx)
            .await;

        if let Err(err) = inserted {
            let duplicate = err
                .as_database_error()
                .map(|db_err| db_err.is_unique_violation())
                .unwrap_or(false);
            if duplicate {
                return Err(AppError::ValidationError(format!(
                    "mutation {} is already queued",
                    mutation.id
                )));
            }
            return Err(err.into());
        }

        sqlx::query(ADVANCE_QUEUE_CLOCK)
            .bind(sequence)
            .bind(created_at)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn list_pending(&self) -> Result<Vec<Mutation>, AppError> {
        let rows = sqlx::query_as::<_, MutationRow>(SELECT_PENDING_MUTATIONS)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(mutation_from_row).collect()
    }

    async fn get(&self, id: &MutationId) -> Result<Option<Mutation>, AppError> {
        let row = sqlx::query_as::<_, MutationRow>(SELECT_MUTATION_BY_ID)
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(mutation_from_row).transpose()
    }

    async fn remove(&self, id: &MutationId) -> Result<bool, AppError> {
        let result = sqlx::query(DELETE_MUTATION)
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn increment_retry(&self, id: &MutationId) -> Result<u32, AppError> {
        let retry_count: Option<i64> = sqlx::query_scalar(INCREMENT_RETRY)
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        match retry_count {
            Some(count) => Ok(u32::try_from(count).unwrap_or(u32::MAX)),
            None => Err(AppError::NotFound(format!("mutation {id}"))),
        }
    }

    async fn rewrite_entity_reference(
        &self,
        temp_id: &str,
        server_id: &str,
    ) -> Result<u64, AppError> {
        let mut tx = self.pool.begin().await?;
        let rows = sqlx::query_as::<_, MutationRow>(SELECT_MUTATIONS_REFERENCING)
            .bind(temp_id)
            .fetch_all(&mut *tx)
            .await?;

        let mut rewritten = 0;
        for row in rows {
            let mut mutation = mutation_from_row(row)?;
            let mut changed = mutation.payload.replace_string(temp_id, server_id) > 0;
            let entity_id = if mutation.entity_id.as_str() == temp_id {
                changed = true;
                server_id.to_string()
            } else {
                mutation.entity_id.to_string()
            };
            if !changed {
                continue;
            }

            sqlx::query(UPDATE_MUTATION_REFERENCE)
                .bind(mutation.id.as_str())
                .bind(&entity_id)
                .bind(mutation.payload.to_json_string()?)
                .execute(&mut *tx)
                .await?;
            rewritten += 1;
        }
        tx.commit().await?;

        debug!(temp_id, server_id, rewritten, "queued references rewritten");
        Ok(rewritten)
    }

    async fn high_water_mark(&self) -> Result<Option<(u64, DateTime<Utc>)>, AppError> {
        let row = sqlx::query_as::<_, QueueClockRow>(SELECT_QUEUE_CLOCK)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some((
                u64::try_from(row.last_sequence).unwrap_or(0),
                timestamp_from_millis(row.last_created_at)?,
            ))),
            None => Ok(None),
        }
    }

    async fn mark_cache_synced(&self, key: &CacheKey, at: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query(UPSERT_CACHE_SYNCED)
            .bind(key.to_string())
            .bind(at.timestamp_millis())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn last_synced_at(&self, key: &CacheKey) -> Result<Option<DateTime<Utc>>, AppError> {
        let value: Option<i64> = sqlx::query_scalar(SELECT_CACHE_SYNCED)
            .bind(key.to_string())
            .fetch_optional(&self.pool)
            .await?;
        value.map(timestamp_from_millis).transpose()
    }
}
