use crate::application::ports::ReactiveCache;
use crate::application::services::optimistic_overlay::{project_mutation, replace_temp_id_with_record};
use crate::domain::entities::{CachedRecord, Mutation, OptimisticContext};
use crate::domain::value_objects::{CacheKey, EntityId, MutationId, TempId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

pub fn create_optimistic_context<T>(
    previous_data: Option<T>,
    temp_id: Option<TempId>,
) -> OptimisticContext<T> {
    OptimisticContext::new(previous_data, temp_id)
}

pub fn create_rollback<T>(cache: Arc<dyn ReactiveCache<T>>, key: CacheKey) -> Rollback<T>
where
    T: Clone + Send + Sync + 'static,
{
    Rollback { cache, key }
}

/// Restores one cache key to a captured snapshot.
pub struct Rollback<T>
where
    T: Clone + Send + Sync + 'static,
{
    cache: Arc<dyn ReactiveCache<T>>,
    key: CacheKey,
}

impl<T> Rollback<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Without a captured snapshot there is no state to go back to, so nothing happens.
    pub async fn rollback(&self, context: Option<&OptimisticContext<T>>) -> bool {
        let Some(previous) = context.and_then(|ctx| ctx.previous_data.as_ref()) else {
            debug!(key = %self.key, "rollback skipped, no snapshot captured");
            return false;
        };
        self.cache.set(&self.key, previous.clone()).await;
        debug!(key = %self.key, "cache restored from snapshot");
        true
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }
}

struct KeyOverlay {
    context: OptimisticContext<Vec<CachedRecord>>,
    pending: Vec<Mutation>,
}

/// Live optimistic state per cache key: one snapshot taken before the oldest
/// still-pending mutation on that key, plus those mutations in queue order.
///
/// Rolling back a single mutation restores the snapshot and replays the
/// survivors, so neither phantom writes nor lost siblings remain in the cache.
pub struct OverlayLedger {
    cache: Arc<dyn ReactiveCache<Vec<CachedRecord>>>,
    overlays: Mutex<HashMap<CacheKey, KeyOverlay>>,
}

impl OverlayLedger {
    pub fn new(cache: Arc<dyn ReactiveCache<Vec<CachedRecord>>>) -> Self {
        Self {
            cache,
            overlays: Mutex::new(HashMap::new()),
        }
    }

    pub fn cache(&self) -> &Arc<dyn ReactiveCache<Vec<CachedRecord>>> {
        &self.cache
    }

    /// Applies a freshly queued mutation to the cache, capturing the key's
    /// snapshot first when no other mutation on that key is pending. Applying the
    /// same mutation twice is a no-op and returns false.
    pub async fn apply(&self, mutation: &Mutation) -> bool {
        let key = mutation.cache_key();
        let mut overlays = self.overlays.lock().await;
        let current = self.cache.get(&key).await;

        let overlay = overlays.entry(key.clone()).or_insert_with(|| KeyOverlay {
            context: create_optimistic_context(
                Some(current.clone().unwrap_or_default()),
                mutation.introduced_temp_id(),
            ),
            pending: Vec::new(),
        });
        if overlay.pending.iter().any(|pending| pending.id == mutation.id) {
            return false;
        }
        overlay.pending.push(mutation.clone());

        let next = project_mutation(&current.unwrap_or_default(), mutation);
        self.cache.set(&key, next).await;
        debug!(mutation_id = %mutation.id, key = %key, "optimistic write applied");
        true
    }

    /// Undoes one pending mutation. Returns false when it had no live overlay.
    pub async fn revert(&self, mutation_id: &MutationId, key: &CacheKey) -> bool {
        let mut overlays = self.overlays.lock().await;
        let Some(overlay) = overlays.get_mut(key) else {
            return false;
        };
        let before = overlay.pending.len();
        overlay.pending.retain(|pending| &pending.id != mutation_id);
        if overlay.pending.len() == before {
            return false;
        }

        let rollback = create_rollback(Arc::clone(&self.cache), key.clone());
        rollback.rollback(Some(&overlay.context)).await;

        if overlay.pending.is_empty() {
            overlays.remove(key);
            return true;
        }

        let base = overlay.context.previous_data.clone().unwrap_or_default();
        let replayed = overlay
            .pending
            .iter()
            .fold(base, |list, pending| project_mutation(&list, pending));
        self.cache.set(key, replayed).await;
        debug!(%mutation_id, key = %key, survivors = overlay.pending.len(), "replayed surviving mutations");
        true
    }

    /// Confirms a synced mutation. `confirm` is applied to the live cache and,
    /// while other mutations on the key are pending, to the snapshot as well so
    /// a later rollback keeps the confirmed write.
    pub async fn settle<F>(&self, mutation_id: &MutationId, key: &CacheKey, confirm: F)
    where
        F: Fn(&[CachedRecord]) -> Vec<CachedRecord> + Send,
    {
        let mut overlays = self.overlays.lock().await;
        let current = self.cache.get(key).await.unwrap_or_default();
        self.cache.set(key, confirm(&current)).await;

        let Some(overlay) = overlays.get_mut(key) else {
            return;
        };
        let Some(position) = overlay
            .pending
            .iter()
            .position(|pending| &pending.id == mutation_id)
        else {
            return;
        };
        let settled = overlay.pending.remove(position);

        if overlay.pending.is_empty() {
            overlays.remove(key);
            return;
        }

        let base = overlay.context.previous_data.clone().unwrap_or_default();
        let with_mutation = project_mutation(&base, &settled);
        overlay.context.previous_data = Some(confirm(&with_mutation));
    }

    /// Writes an authoritative server record into the cache and the snapshot,
    /// replacing any record with the same id.
    pub async fn adopt_server_record(&self, key: &CacheKey, record: &CachedRecord) {
        let mut overlays = self.overlays.lock().await;
        let current = self.cache.get(key).await.unwrap_or_default();
        self.cache
            .set(key, replace_temp_id_with_record(&current, &record.id, record))
            .await;

        if let Some(overlay) = overlays.get_mut(key) {
            let base = overlay.context.previous_data.clone().unwrap_or_default();
            overlay.context.previous_data =
                Some(replace_temp_id_with_record(&base, &record.id, record));
        }
        debug!(key = %key, record_id = %record.id, "server record adopted");
    }

    /// Keeps the snapshot's copy of a queued mutation in step with the durable queue
    /// after a temp id was swapped for a server id.
    pub async fn rewrite_reference(&self, temp_id: &str, server_id: &str) {
        let mut overlays = self.overlays.lock().await;
        for overlay in overlays.values_mut() {
            for pending in overlay.pending.iter_mut() {
                if pending.entity_id.as_str() == temp_id {
                    if let Ok(entity_id) = EntityId::new(server_id.to_string()) {
                        pending.entity_id = entity_id;
                    }
                }
                pending.payload.replace_string(temp_id, server_id);
            }
        }
    }

    pub async fn has_live_context(&self, key: &CacheKey) -> bool {
        self.overlays.lock().await.contains_key(key)
    }

    pub async fn pending_on(&self, key: &CacheKey) -> usize {
        self.overlays
            .lock()
            .await
            .get(key)
            .map(|overlay| overlay.pending.len())
            .unwrap_or(0)
    }

    /// Whether another mutation on the same entity is still pending.
    pub async fn has_other_pending(&self, mutation: &Mutation) -> bool {
        self.overlays
            .lock()
            .await
            .get(&mutation.cache_key())
            .map(|overlay| {
                overlay
                    .pending
                    .iter()
                    .any(|pending| pending.id != mutation.id && pending.targets_same_entity(mutation))
            })
            .unwrap_or(false)
    }
}
