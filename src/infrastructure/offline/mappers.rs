use super::rows::MutationRow;
use crate::domain::entities::Mutation;
use crate::domain::value_objects::{EntityId, EntityType, MutationId, MutationPayload, MutationType};
use crate::shared::error::AppError;
use chrono::{DateTime, Utc};

pub fn mutation_from_row(row: MutationRow) -> Result<Mutation, AppError> {
    let id = MutationId::new(row.id).map_err(AppError::DeserializationError)?;
    let mutation_type = row
        .mutation_type
        .parse::<MutationType>()
        .map_err(AppError::DeserializationError)?;
    let entity_type = EntityType::new(row.entity_type).map_err(AppError::DeserializationError)?;
    let entity_id = EntityId::new(row.entity_id).map_err(AppError::DeserializationError)?;
    let payload =
        MutationPayload::from_json_str(&row.payload).map_err(AppError::DeserializationError)?;

    Ok(Mutation::new(
        id,
        mutation_type,
        entity_type,
        entity_id,
        payload,
        timestamp_from_millis(row.created_at)?,
        u32::try_from(row.retry_count).unwrap_or(u32::MAX),
        u64::try_from(row.sequence).map_err(|_| {
            AppError::DeserializationError(format!("negative sequence {}", row.sequence))
        })?,
    ))
}

pub fn sequence_to_db(sequence: u64) -> Result<i64, AppError> {
    i64::try_from(sequence)
        .map_err(|_| AppError::SerializationError(format!("sequence {sequence} out of range")))
}

pub fn timestamp_from_millis(value: i64) -> Result<DateTime<Utc>, AppError> {
    DateTime::<Utc>::from_timestamp_millis(value)
        .ok_or_else(|| AppError::DeserializationError(format!("invalid timestamp {value}")))
}
