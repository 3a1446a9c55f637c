pub mod reconciler;
pub mod retry_policy;


pub use reconciler::{is_cache_stale, resolve_conflict, server_wins};
pub use retry_policy::RetryPolicy;

use crate::application::ports::{ServerAck, SyncClient, SyncError};
use crate::application::services::mutation_queue::MutationQueue;
use crate::application::services::optimistic_overlay::{
    remove_by_id, replace_temp_id, replace_temp_id_with_record,
};
use crate::application::services::rollback::OverlayLedger;
use crate::domain::entities::{CachedRecord, DrainReport, Mutation};
use crate::domain::value_objects::{
    CacheKey, EntityId, EntityType, MutationId, MutationType, is_temp_id,
};
use crate::shared::config::AppConfig;
use crate::shared::error::AppError;
use crate::shared::metrics::SyncMetrics;
use chrono::Utc;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub retry: RetryPolicy,
    pub request_timeout: Duration,
    pub batch_size: usize,
    pub stale_after: chrono::Duration,
}

impl SyncSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            retry: RetryPolicy::from_config(&config.sync),
            request_timeout: Duration::from_millis(config.sync.request_timeout_ms),
            batch_size: config.sync.batch_size.max(1) as usize,
            stale_after: chrono::Duration::hours(config.cache.stale_after_hours),
        }
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

type EntityKey = (EntityType, EntityId);

/// Per-drain bookkeeping that keeps same-entity mutations in edit order.
#[derive(Default)]
struct DrainState {
    report: DrainReport,
    /// Entities with an earlier mutation still pending this cycle.
    held_entities: HashSet<EntityKey>,
    /// Temp ids whose create is still pending this cycle.
    held_temp_ids: HashSet<String>,
    /// Temp ids whose create failed for good.
    failed_temp_ids: HashSet<String>,
    /// Temp id to server id swaps made during this cycle.
    renames: HashMap<String, String>,
}

impl DrainState {
    fn hold(&mut self, mutation: &Mutation) {
        self.held_entities.insert(entity_key(mutation));
        if let Some(temp_id) = mutation.introduced_temp_id() {
            self.held_temp_ids.insert(temp_id.to_string());
        }
    }

    fn apply_renames(&self, mutation: &mut Mutation) {
        for (temp_id, server_id) in &self.renames {
            if mutation.entity_id.as_str() == temp_id {
                if let Ok(entity_id) = EntityId::new(server_id.clone()) {
                    mutation.entity_id = entity_id;
                }
            }
            mutation.payload.replace_string(temp_id, server_id);
        }
    }
}

enum Attempt {
    Acked(ServerAck),
    Rejected(AppError),
    Conflict(Value),
}

/// Drains the durable queue against the server, one mutation at a time in
/// queue order, and reconciles the read cache with each outcome.
pub struct SyncEngine {
    queue: Arc<MutationQueue>,
    ledger: Arc<OverlayLedger>,
    client: Arc<dyn SyncClient>,
    settings: SyncSettings,
    metrics: Arc<SyncMetrics>,
    drain_gate: Mutex<()>,
    in_flight: Mutex<HashSet<MutationId>>,
}

impl SyncEngine {
    pub fn new(
        queue: Arc<MutationQueue>,
        ledger: Arc<OverlayLedger>,
        client: Arc<dyn SyncClient>,
        settings: SyncSettings,
        metrics: Arc<SyncMetrics>,
    ) -> Self {
        Self {
            queue,
            ledger,
            client,
            settings,
            metrics,
            drain_gate: Mutex::new(()),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn metrics(&self) -> &Arc<SyncMetrics> {
        &self.metrics
    }

    pub fn is_draining(&self) -> bool {
        self.drain_gate.try_lock().is_err()
    }

    /// Sends every pending mutation (up to the batch size) in queue order.
    ///
    /// Only one drain runs at a time; a concurrent call gets `DrainInProgress`.
    pub async fn drain_queue(&self) -> Result<DrainReport, AppError> {
        let _gate = self
            .drain_gate
            .try_lock()
            .map_err(|_| AppError::DrainInProgress)?;

        let batch: Vec<Mutation> = self
            .queue
            .dequeue_in_order()
            .await?
            .into_iter()
            .take(self.settings.batch_size)
            .collect();
        self.metrics.record_drain();
        self.in_flight.lock().await.clear();
        info!(batch = batch.len(), "drain started");

        let mut state = DrainState::default();
        for mut mutation in batch {
            state.apply_renames(&mut mutation);
            let id = mutation.id.clone();
            let result = self.process(&mutation, &mut state).await;
            // Cancellation stays refused until the outcome has been reconciled.
            self.in_flight.lock().await.remove(&id);

            if let Err(err) = result {
                warn!(mutation_id = %id, error = %err, "mutation left pending after store error");
                if state.report.outcome_of(&id).is_none() {
                    state.hold(&mutation);
                    self.metrics.record_pending();
                    state.report.record_pending(id);
                }
            }
        }

        let report = state.report;
        info!(
            synced = report.synced_count(),
            failed = report.failed_count(),
            pending = report.pending_count(),
            "drain finished"
        );
        Ok(report)
    }

    /// Removes a queued mutation and rolls back its optimistic write. A mutation
    /// currently being sent cannot be cancelled.
    pub async fn cancel(&self, id: &MutationId) -> Result<bool, AppError> {
        let _exclusive = self.queue.exclusive().await;
        let in_flight = self.in_flight.lock().await;
        if in_flight.contains(id) {
            return Err(AppError::MutationInFlight(id.to_string()));
        }
        let Some(mutation) = self.queue.get(id).await? else {
            return Ok(false);
        };
        self.queue.remove(id).await?;
        drop(in_flight);

        self.ledger.revert(id, &mutation.cache_key()).await;
        info!(mutation_id = %id, "mutation cancelled");
        Ok(true)
    }

    pub async fn is_in_flight(&self, id: &MutationId) -> bool {
        self.in_flight.lock().await.contains(id)
    }

    pub async fn is_cache_stale(&self, key: &CacheKey) -> Result<bool, AppError> {
        let last = self.queue.store().last_synced_at(key).await?;
        Ok(reconciler::is_stale_after(
            last,
            Utc::now(),
            self.settings.stale_after,
        ))
    }

    async fn process(&self, mutation: &Mutation, state: &mut DrainState) -> Result<(), AppError> {
        let references = referenced_temp_ids(mutation);

        if let Some(temp_id) = references
            .iter()
            .find(|temp_id| state.failed_temp_ids.contains(*temp_id))
        {
            let error = AppError::PermanentSync(format!("depends on failed create of {temp_id}"));
            return self.fail(mutation, error, state).await;
        }

        let waits_on_entity = state.held_entities.contains(&entity_key(mutation));
        let waits_on_create = references
            .iter()
            .any(|temp_id| state.held_temp_ids.contains(temp_id));
        if waits_on_entity || waits_on_create {
            debug!(mutation_id = %mutation.id, "held behind an earlier pending mutation");
            state.hold(mutation);
            self.metrics.record_pending();
            state.report.record_pending(mutation.id.clone());
            return Ok(());
        }

        let Some(attempt) = self.send(mutation).await? else {
            debug!(mutation_id = %mutation.id, "cancelled before send");
            if let Some(temp_id) = mutation.introduced_temp_id() {
                state.failed_temp_ids.insert(temp_id.to_string());
            }
            self.metrics.record_failed();
            state
                .report
                .record_failed(mutation.id.clone(), AppError::Cancelled(mutation.id.to_string()));
            return Ok(());
        };

        match attempt {
            Attempt::Acked(ack) => self.confirm(mutation, ack, state).await,
            Attempt::Rejected(error) if error.is_transient() => {
                self.retry_later(mutation, error, state).await
            }
            Attempt::Rejected(error) => self.fail(mutation, error, state).await,
            Attempt::Conflict(server_record) => {
                self.reconcile_conflict(mutation, server_record, state)
                    .await
            }
        }
    }

    /// Returns `None` when the mutation left the queue before it could be sent.
    /// Otherwise the id stays marked in flight until the caller clears it.
    async fn send(&self, mutation: &Mutation) -> Result<Option<Attempt>, AppError> {
        {
            let mut in_flight = self.in_flight.lock().await;
            if self.queue.get(&mutation.id).await?.is_none() {
                return Ok(None);
            }
            in_flight.insert(mutation.id.clone());
        }

        debug!(
            mutation_id = %mutation.id,
            mutation_type = %mutation.mutation_type,
            entity_id = %mutation.entity_id,
            "sending mutation"
        );
        let result =
            tokio::time::timeout(self.settings.request_timeout, self.client.apply(mutation)).await;

        let attempt = match result {
            Err(_) => Attempt::Rejected(AppError::TransientSync(format!(
                "request timed out after {}ms",
                self.settings.request_timeout.as_millis()
            ))),
            Ok(Ok(ack)) => Attempt::Acked(ack),
            Ok(Err(SyncError::Conflict { server_record })) => Attempt::Conflict(server_record),
            Ok(Err(err)) => Attempt::Rejected(err.into()),
        };
        Ok(Some(attempt))
    }

    async fn confirm(
        &self,
        mutation: &Mutation,
        ack: ServerAck,
        state: &mut DrainState,
    ) -> Result<(), AppError> {
        self.queue.remove(&mutation.id).await?;
        let key = mutation.cache_key();

        match (mutation.introduced_temp_id(), ack.server_id.as_deref()) {
            (Some(temp_id), Some(server_id)) if temp_id.as_str() != server_id => {
                let temp_id = temp_id.to_string();
                let server_record = ack.server_record.as_ref();
                self.ledger
                    .settle(&mutation.id, &key, |list| {
                        confirm_created(list, &temp_id, server_id, server_record)
                    })
                    .await;

                let rewritten = match self
                    .queue
                    .store()
                    .rewrite_entity_reference(&temp_id, server_id)
                    .await
                {
                    Ok(rewritten) => rewritten,
                    Err(err) => {
                        error!(temp_id = %temp_id, server_id, error = %err, "queued references not rewritten");
                        0
                    }
                };
                self.ledger.rewrite_reference(&temp_id, server_id).await;
                state.renames.insert(temp_id.clone(), server_id.to_string());
                info!(
                    mutation_id = %mutation.id,
                    temp_id = %temp_id,
                    server_id,
                    rewritten,
                    "temp id replaced by server id"
                );
            }
            _ => {
                let entity_id = mutation.entity_id.as_str();
                let still_pending = self.ledger.has_other_pending(mutation).await;
                let server_record = ack.server_record.as_ref();
                let mutation_type = mutation.mutation_type;
                self.ledger
                    .settle(&mutation.id, &key, |list| {
                        confirm_existing(list, mutation_type, entity_id, server_record, still_pending)
                    })
                    .await;
            }
        }

        if let Err(err) = self.queue.store().mark_cache_synced(&key, Utc::now()).await {
            warn!(key = %key, error = %err, "cache sync time not recorded");
        }
        self.metrics.record_synced();
        info!(mutation_id = %mutation.id, "mutation synced");
        state.report.record_synced(mutation.id.clone());
        Ok(())
    }

    async fn retry_later(
        &self,
        mutation: &Mutation,
        reason: AppError,
        state: &mut DrainState,
    ) -> Result<(), AppError> {
        let retry_count = self.queue.increment_retry(&mutation.id).await?;
        if self.settings.retry.is_exhausted(retry_count) {
            let error = AppError::PermanentSync(format!(
                "retry budget of {} exhausted: {reason}",
                self.settings.retry.max_retries()
            ));
            return self.fail(mutation, error, state).await;
        }

        warn!(
            mutation_id = %mutation.id,
            retry_count,
            reason = %reason,
            "mutation left pending"
        );
        state.hold(mutation);
        self.metrics.record_pending();
        state.report.record_pending(mutation.id.clone());
        Ok(())
    }

    async fn fail(
        &self,
        mutation: &Mutation,
        error: AppError,
        state: &mut DrainState,
    ) -> Result<(), AppError> {
        self.queue.remove(&mutation.id).await?;
        let rolled_back = self.ledger.revert(&mutation.id, &mutation.cache_key()).await;
        if let Some(temp_id) = mutation.introduced_temp_id() {
            state.failed_temp_ids.insert(temp_id.to_string());
        }

        warn!(
            mutation_id = %mutation.id,
            entity_type = %mutation.entity_type,
            entity_id = %mutation.entity_id,
            rolled_back,
            error = %error,
            "mutation failed"
        );
        self.metrics.record_failed();
        state.report.record_failed(mutation.id.clone(), error);
        Ok(())
    }

    async fn reconcile_conflict(
        &self,
        mutation: &Mutation,
        server_record: Value,
        state: &mut DrainState,
    ) -> Result<(), AppError> {
        let server_record = match CachedRecord::from_json(server_record) {
            Ok(record) => record,
            Err(err) => {
                let error = AppError::PermanentSync(format!("conflict reply unusable: {err}"));
                return self.fail(mutation, error, state).await;
            }
        };

        let key = mutation.cache_key();
        let local = self.ledger.cache().get(&key).await.and_then(|list| {
            list.into_iter()
                .find(|record| record.id == mutation.entity_id.as_str())
        });

        let local_wins = local
            .as_ref()
            .is_some_and(|local| !server_wins(local, &server_record));
        if local_wins {
            let reason = AppError::TransientSync("conflict, local version is newer".into());
            return self.retry_later(mutation, reason, state).await;
        }

        let error = AppError::PermanentSync("conflict, server version is newer".into());
        self.fail(mutation, error, state).await?;
        self.ledger.adopt_server_record(&key, &server_record).await;
        if let Err(err) = self.queue.store().mark_cache_synced(&key, Utc::now()).await {
            warn!(key = %key, error = %err, "cache sync time not recorded");
        }
        Ok(())
    }
}

fn entity_key(mutation: &Mutation) -> EntityKey {
    (mutation.entity_type.clone(), mutation.entity_id.clone())
}

/// Temp ids this mutation depends on, not counting one it introduces itself.
fn referenced_temp_ids(mutation: &Mutation) -> Vec<String> {
    let own = mutation.introduced_temp_id().map(|temp_id| temp_id.to_string());
    let mut found = vec![mutation.entity_id.to_string()];
    collect_temp_ids(&mutation.payload.to_json(), &mut found);
    found.retain(|candidate| is_temp_id(candidate) && Some(candidate) != own.as_ref());
    found.sort();
    found.dedup();
    found
}

fn collect_temp_ids(value: &Value, found: &mut Vec<String>) {
    match value {
        Value::String(s) if is_temp_id(s) => found.push(s.clone()),
        Value::Array(items) => items.iter().for_each(|item| collect_temp_ids(item, found)),
        Value::Object(map) => map.values().for_each(|item| collect_temp_ids(item, found)),
        _ => {}
    }
}

/// The cache after a create was confirmed. A record already cached under the
/// server id (say, from a refetch) is reconciled by last-write-wins.
fn confirm_created(
    list: &[CachedRecord],
    temp_id: &str,
    server_id: &str,
    server_record: Option<&CachedRecord>,
) -> Vec<CachedRecord> {
    let existing = list.iter().find(|record| record.id == server_id);
    if server_record.is_none() && existing.is_none() {
        return replace_temp_id(list, temp_id, server_id, None);
    }

    let candidate = match server_record {
        Some(record) => Some(record.clone()),
        None => list.iter().find(|record| record.id == temp_id).map(|record| {
            let mut confirmed = record.clone();
            confirmed.mark_confirmed(server_id);
            confirmed
        }),
    };
    let Some(candidate) = candidate else {
        return remove_by_id(list, temp_id);
    };
    let winner = match existing {
        Some(existing) => resolve_conflict(existing, &candidate),
        None => candidate,
    };
    replace_temp_id_with_record(&remove_by_id(list, server_id), temp_id, &winner)
}

fn confirm_existing(
    list: &[CachedRecord],
    mutation_type: MutationType,
    entity_id: &str,
    server_record: Option<&CachedRecord>,
    still_pending: bool,
) -> Vec<CachedRecord> {
    match (mutation_type, server_record) {
        (MutationType::Delete, _) => list.to_vec(),
        (_, Some(record)) if !still_pending => {
            replace_temp_id_with_record(list, entity_id, record)
        }
        (_, _) if still_pending => list.to_vec(),
        // Same id in and out: only the optimistic markers are cleared.
        _ => replace_temp_id(list, entity_id, entity_id, None),
    }
}
