use crate::application::ports::MutationStore;
use crate::application::services::payload_schema::PayloadSchemaRegistry;
use crate::domain::entities::{Mutation, MutationDraft, truncate_to_millis};
use crate::domain::value_objects::{EntityId, EntityType, MutationId, MutationPayload, MutationType};
use crate::shared::error::AppError;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

#[derive(Debug, Default)]
struct EnqueueClock {
    loaded: bool,
    sequence: u64,
    latest: Option<DateTime<Utc>>,
}

/// Durable FIFO of pending writes.
///
/// Enqueues are serialised so each mutation receives a strictly increasing
/// sequence number and a `created_at` no earlier than its predecessor's; drain
/// order therefore matches edit order even when the wall clock steps back.
pub struct MutationQueue {
    store: Arc<dyn MutationStore>,
    schemas: PayloadSchemaRegistry,
    clock: Mutex<EnqueueClock>,
    admission: RwLock<()>,
}

impl MutationQueue {
    pub fn new(store: Arc<dyn MutationStore>, schemas: PayloadSchemaRegistry) -> Self {
        Self {
            store,
            schemas,
            clock: Mutex::new(EnqueueClock::default()),
            admission: RwLock::new(()),
        }
    }

    pub fn store(&self) -> &Arc<dyn MutationStore> {
        &self.store
    }

    /// Validates the draft and persists it. Nothing is written when validation fails.
    pub async fn enqueue(&self, draft: MutationDraft) -> Result<Mutation, AppError> {
        let parsed = self.validate(&draft)?;

        let mut clock = self.clock.lock().await;
        if !clock.loaded {
            if let Some((sequence, latest)) = self.store.high_water_mark().await? {
                clock.sequence = sequence;
                clock.latest = Some(latest);
            }
            clock.loaded = true;
        }

        let requested = truncate_to_millis(draft.created_at.unwrap_or_else(Utc::now));
        let created_at = match clock.latest {
            Some(latest) if latest > requested => latest,
            _ => requested,
        };
        let sequence = clock.sequence + 1;

        let mutation = Mutation::new(
            parsed.id,
            parsed.mutation_type,
            parsed.entity_type,
            parsed.entity_id,
            parsed.payload,
            created_at,
            0,
            sequence,
        );
        self.store.append(&mutation).await?;

        clock.sequence = sequence;
        clock.latest = Some(created_at);
        drop(clock);

        info!(
            mutation_id = %mutation.id,
            mutation_type = %mutation.mutation_type,
            entity_type = %mutation.entity_type,
            entity_id = %mutation.entity_id,
            sequence,
            "mutation queued"
        );
        Ok(mutation)
    }

    /// Held by callers that must finish follow-up work on a fresh mutation before
    /// any drain can observe it. Concurrent admissions do not block each other.
    pub async fn admission(&self) -> RwLockReadGuard<'_, ()> {
        self.admission.read().await
    }

    /// Waits out every admission in progress and keeps new ones out until dropped.
    pub async fn exclusive(&self) -> RwLockWriteGuard<'_, ()> {
        self.admission.write().await
    }

    /// Every pending mutation, oldest first. Calling it twice without writes in
    /// between yields the same list.
    pub async fn dequeue_in_order(&self) -> Result<Vec<Mutation>, AppError> {
        let _exclusive = self.admission.write().await;
        let pending = self.store.list_pending().await?;
        Ok(sort_mutations(pending))
    }

    pub async fn get(&self, id: &MutationId) -> Result<Option<Mutation>, AppError> {
        self.store.get(id).await
    }

    pub async fn remove(&self, id: &MutationId) -> Result<bool, AppError> {
        let removed = self.store.remove(id).await?;
        debug!(mutation_id = %id, removed, "mutation removed from queue");
        Ok(removed)
    }

    pub async fn increment_retry(&self, id: &MutationId) -> Result<u32, AppError> {
        self.store.increment_retry(id).await
    }

    pub async fn pending_count(&self) -> Result<usize, AppError> {
        Ok(self.store.list_pending().await?.len())
    }

    fn validate(&self, draft: &MutationDraft) -> Result<ParsedDraft, AppError> {
        let id = MutationId::new(draft.id.clone()).map_err(AppError::ValidationError)?;
        let mutation_type = draft
            .mutation_type
            .parse::<MutationType>()
            .map_err(AppError::ValidationError)?;
        let entity_type =
            EntityType::new(draft.entity_type.clone()).map_err(AppError::ValidationError)?;
        let entity_id = EntityId::new(draft.entity_id.clone()).map_err(AppError::ValidationError)?;
        let payload =
            MutationPayload::new(draft.payload.clone()).map_err(AppError::ValidationError)?;

        self.schemas
            .validate(&entity_type, mutation_type, &payload)
            .map_err(AppError::ValidationError)?;

        Ok(ParsedDraft {
            id,
            mutation_type,
            entity_type,
            entity_id,
            payload,
        })
    }
}

struct ParsedDraft {
    id: MutationId,
    mutation_type: MutationType,
    entity_type: EntityType,
    entity_id: EntityId,
    payload: MutationPayload,
}

/// Ascending by `(created_at, sequence)`. Stable for equal keys.
pub fn sort_mutations(mut mutations: Vec<Mutation>) -> Vec<Mutation> {
    mutations.sort_by_key(Mutation::order_key);
    mutations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::connection_pool::ConnectionPool;
    use crate::infrastructure::offline::SqliteMutationStore;
    use chrono::{Duration, TimeZone};
    use serde_json::json;
    use std::collections::HashSet;

    async fn setup_queue() -> MutationQueue {
        let pool = ConnectionPool::in_memory().await.unwrap();
        let store: Arc<dyn MutationStore> =
            Arc::new(SqliteMutationStore::new(pool.get_pool().clone()));
        MutationQueue::new(store, PayloadSchemaRegistry::farm_defaults())
    }

    fn batch() -> EntityType {
        EntityType::new("batch".into()).unwrap()
    }

    fn create_batch(name: &str) -> MutationDraft {
        MutationDraft::new(
            MutationType::Create,
            &batch(),
            crate::domain::value_objects::TempId::for_entity(&batch()).to_string(),
            json!({"name": name}),
        )
    }

    #[tokio::test]
    async fn enqueued_mutation_round_trips() {
        let queue = setup_queue().await;
        let hatched = Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap() + Duration::milliseconds(45);
        let draft = MutationDraft::new(
            MutationType::Create,
            &batch(),
            "temp_batch-1",
            json!({"name": "Broilers", "startDate": "2024-03-01T08:30:00.045Z", "quantity": 500}),
        )
        .with_created_at(hatched);

        let queued = queue.enqueue(draft.clone()).await.unwrap();
        let loaded = queue.get(&queued.id).await.unwrap().unwrap();

        assert_eq!(loaded.id.as_str(), draft.id);
        assert_eq!(loaded.mutation_type, MutationType::Create);
        assert_eq!(loaded.entity_type.as_str(), "batch");
        assert_eq!(loaded.entity_id.as_str(), "temp_batch-1");
        assert_eq!(loaded.created_at, hatched);
        assert_eq!(loaded.retry_count, 0);
        assert_eq!(
            loaded.payload.get("startDate").and_then(|v| v.as_date()),
            Some(hatched)
        );
        assert_eq!(loaded, queued);
    }

    #[tokio::test]
    async fn invalid_drafts_are_rejected_without_a_write() {
        let queue = setup_queue().await;

        let mut bad_type = create_batch("A");
        bad_type.mutation_type = "upsert".into();
        let mut bad_payload = create_batch("A");
        bad_payload.payload = json!(["not", "an", "object"]);
        let mut no_entity = create_batch("A");
        no_entity.entity_id = String::new();
        let mut no_id = create_batch("A");
        no_id.id = String::new();
        let missing_name = MutationDraft::new(MutationType::Create, &batch(), "temp_batch-2", json!({}));

        for draft in [bad_type, bad_payload, no_entity, no_id, missing_name] {
            let result = queue.enqueue(draft).await;
            assert!(matches!(result, Err(AppError::ValidationError(_))), "{result:?}");
        }
        assert_eq!(queue.pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn dequeue_orders_by_creation_and_is_idempotent() {
        let queue = setup_queue().await;
        let base = Utc::now();
        let mut expected = Vec::new();
        for offset in [30_i64, 10, 20, 10] {
            let draft = create_batch("A").with_created_at(base + Duration::milliseconds(offset));
            expected.push(queue.enqueue(draft).await.unwrap().id);
        }

        let first = queue.dequeue_in_order().await.unwrap();
        let second = queue.dequeue_in_order().await.unwrap();
        assert_eq!(first, second);
        assert!(first.windows(2).all(|pair| pair[0].order_key() <= pair[1].order_key()));

        let ids: HashSet<_> = first.iter().map(|m| m.id.clone()).collect();
        assert_eq!(ids, expected.into_iter().collect());
    }

    #[tokio::test]
    async fn backwards_clock_keeps_edit_order() {
        let queue = setup_queue().await;
        let now = Utc::now();
        let first = queue
            .enqueue(create_batch("first").with_created_at(now))
            .await
            .unwrap();
        let second = queue
            .enqueue(create_batch("second").with_created_at(now - Duration::minutes(5)))
            .await
            .unwrap();

        assert!(second.created_at >= first.created_at);
        let ordered = queue.dequeue_in_order().await.unwrap();
        assert_eq!(ordered[0].id, first.id);
        assert_eq!(ordered[1].id, second.id);
    }

    #[tokio::test]
    async fn concurrent_enqueues_get_distinct_sequences() {
        let queue = Arc::new(setup_queue().await);
        let mut handles = Vec::new();
        for i in 0..20 {
            let queue = Arc::clone(&queue);
            handles.push(tokio::spawn(async move {
                queue.enqueue(create_batch(&format!("b{i}"))).await.unwrap()
            }));
        }
        let mut sequences = HashSet::new();
        for handle in handles {
            assert!(sequences.insert(handle.await.unwrap().sequence));
        }
        assert_eq!(sequences.len(), 20);
    }

    #[tokio::test]
    async fn remove_and_retry_behave_on_absent_ids() {
        let queue = setup_queue().await;
        let queued = queue.enqueue(create_batch("A")).await.unwrap();

        assert_eq!(queue.increment_retry(&queued.id).await.unwrap(), 1);
        assert_eq!(queue.increment_retry(&queued.id).await.unwrap(), 2);
        assert!(queue.remove(&queued.id).await.unwrap());
        assert!(!queue.remove(&queued.id).await.unwrap());
        assert!(matches!(
            queue.increment_retry(&queued.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn sort_mutations_breaks_timestamp_ties_by_sequence() {
        let at = Utc::now();
        let make = |sequence| {
            Mutation::new(
                MutationId::generate(),
                MutationType::Update,
                batch(),
                EntityId::new("srv-1".into()).unwrap(),
                MutationPayload::default(),
                at,
                0,
                sequence,
            )
        };
        let sorted = sort_mutations(vec![make(3), make(1), make(2)]);
        let sequences: Vec<u64> = sorted.iter().map(|m| m.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3]);
    }
}
