//! Pure projections of pending mutations onto cached record lists.
//!
//! Every function takes a borrowed list and returns a new one; inputs are never
//! touched, so concurrent readers keep a consistent snapshot.

use crate::domain::entities::{CachedRecord, Mutation};
use crate::domain::value_objects::{EntityType, MutationType, TempId};
use serde_json::{Map, Value};

/// The only way to tell an unconfirmed identifier from a server-assigned one.
pub use crate::domain::value_objects::is_temp_id;

pub fn generate_temp_id() -> TempId {
    TempId::generate()
}

pub fn generate_entity_temp_id(entity_type: &EntityType) -> TempId {
    TempId::for_entity(entity_type)
}

pub fn add_optimistic_record(
    list: &[CachedRecord],
    fields: &Map<String, Value>,
    temp_id: &TempId,
) -> Vec<CachedRecord> {
    let mut record = CachedRecord::confirmed(temp_id.as_str(), Map::new());
    record.merge_fields(fields);
    record.is_optimistic = true;
    record.temp_id = Some(temp_id.to_string());

    let mut next = list.to_vec();
    next.push(record);
    next
}

/// Absent ids are left alone: the record may already have synced through another view.
pub fn update_by_id(list: &[CachedRecord], id: &str, patch: &Map<String, Value>) -> Vec<CachedRecord> {
    list.iter()
        .map(|record| {
            if record.id != id {
                return record.clone();
            }
            let mut updated = record.clone();
            updated.merge_fields(patch);
            updated.is_optimistic = true;
            updated
        })
        .collect()
}

pub fn remove_by_id(list: &[CachedRecord], id: &str) -> Vec<CachedRecord> {
    list.iter()
        .filter(|record| record.id != id)
        .cloned()
        .collect()
}

pub fn replace_temp_id(
    list: &[CachedRecord],
    temp_id: &str,
    server_id: &str,
    extra_fields: Option<&Map<String, Value>>,
) -> Vec<CachedRecord> {
    list.iter()
        .map(|record| {
            if record.id != temp_id {
                return record.clone();
            }
            let mut confirmed = record.clone();
            confirmed.mark_confirmed(server_id);
            if let Some(extra) = extra_fields {
                confirmed.merge_fields(extra);
            }
            confirmed
        })
        .collect()
}

/// Like [`replace_temp_id`] but substitutes the whole server record. When the temp
/// record never reached this list, the server record is appended instead of dropped.
pub fn replace_temp_id_with_record(
    list: &[CachedRecord],
    temp_id: &str,
    server_record: &CachedRecord,
) -> Vec<CachedRecord> {
    let mut confirmed = server_record.clone();
    confirmed.is_optimistic = false;
    confirmed.temp_id = None;

    let mut replaced = false;
    let mut next: Vec<CachedRecord> = list
        .iter()
        .map(|record| {
            if record.id == temp_id {
                replaced = true;
                confirmed.clone()
            } else {
                record.clone()
            }
        })
        .collect();
    if !replaced {
        next.push(confirmed);
    }
    next
}

/// Replays one queued mutation onto a list, the way the UI applied it at enqueue time.
pub fn project_mutation(list: &[CachedRecord], mutation: &Mutation) -> Vec<CachedRecord> {
    let fields = mutation.payload.to_json_map();
    match mutation.mutation_type {
        MutationType::Create => match mutation.introduced_temp_id() {
            Some(temp_id) => add_optimistic_record(list, &fields, &temp_id),
            // Creates with a caller-chosen id still show up optimistically, without a temp id.
            None => {
                let mut next = remove_by_id(list, mutation.entity_id.as_str());
                let mut record = CachedRecord::confirmed(mutation.entity_id.as_str(), fields);
                record.is_optimistic = true;
                next.push(record);
                next
            }
        },
        MutationType::Update => update_by_id(list, mutation.entity_id.as_str(), &fields),
        MutationType::Delete => remove_by_id(list, mutation.entity_id.as_str()),
    }
}
