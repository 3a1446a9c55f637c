use crate::domain::entities::CachedRecord;
use chrono::{DateTime, Duration, Utc};
use std::cmp::Ordering;

pub const DEFAULT_STALE_AFTER_HOURS: i64 = 24;

/// A cache key never synced is stale; otherwise stale only once strictly more
/// than 24 hours have passed.
pub fn is_cache_stale(last_sync: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    is_stale_after(last_sync, now, Duration::hours(DEFAULT_STALE_AFTER_HOURS))
}

pub fn is_stale_after(
    last_sync: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    threshold: Duration,
) -> bool {
    match last_sync {
        None => true,
        Some(last) => now.signed_duration_since(last) > threshold,
    }
}

/// Last-write-wins on `updatedAt`. A record without a readable `updatedAt`
/// loses to one that has it. Ties go to the greater id, then to the greater
/// canonical JSON text, so `resolve_conflict(a, b) == resolve_conflict(b, a)`.
pub fn resolve_conflict(a: &CachedRecord, b: &CachedRecord) -> CachedRecord {
    match compare_records(a, b) {
        Ordering::Less => b.clone(),
        _ => a.clone(),
    }
}

/// Whether `server` beats `local` under [`resolve_conflict`].
pub fn server_wins(local: &CachedRecord, server: &CachedRecord) -> bool {
    compare_records(server, local) == Ordering::Greater
}

pub fn compare_records(a: &CachedRecord, b: &CachedRecord) -> Ordering {
    a.updated_at()
        .cmp(&b.updated_at())
        .then_with(|| a.id.cmp(&b.id))
        .then_with(|| canonical_text(a).cmp(&canonical_text(b)))
}

// serde_json's default map keeps keys sorted, which makes this text canonical.
fn canonical_text(record: &CachedRecord) -> String {
    record.to_json().to_string()
}
