use crate::application::ports::{MutationStore, ReactiveCache, StorageEstimator, SyncClient};
use crate::application::services::mutation_queue::MutationQueue;
use crate::application::services::payload_schema::PayloadSchemaRegistry;
use crate::application::services::rollback::OverlayLedger;
use crate::application::services::storage_monitor::{StorageMonitor, StorageThresholds};
use crate::application::services::sync_engine::{SyncEngine, SyncSettings};
use crate::domain::entities::{CachedRecord, DrainReport, Mutation, MutationDraft};
use crate::domain::value_objects::{CacheKey, MutationId, StorageStatus};
use crate::shared::config::AppConfig;
use crate::shared::error::AppError;
use crate::shared::metrics::{SyncMetrics, SyncMetricsSnapshot};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

#[async_trait]
pub trait OfflineSyncServiceTrait: Send + Sync {
    async fn enqueue(&self, draft: MutationDraft) -> Result<MutationId, AppError>;
    async fn cancel(&self, id: &MutationId) -> Result<bool, AppError>;
    async fn drain_queue(&self) -> Result<DrainReport, AppError>;
    async fn pending_mutations(&self) -> Result<Vec<Mutation>, AppError>;
    async fn storage_status(&self) -> Result<StorageStatus, AppError>;
    async fn can_queue_mutation(&self) -> Result<bool, AppError>;
    async fn is_cache_stale(&self, key: &CacheKey) -> Result<bool, AppError>;
    async fn rehydrate(&self) -> Result<usize, AppError>;
    fn subscribe(&self) -> broadcast::Receiver<CacheKey>;
    fn metrics(&self) -> SyncMetricsSnapshot;
}

/// Entry point for callers: admission control, durable queueing, optimistic
/// cache writes and draining behind one surface.
pub struct OfflineSyncService {
    queue: Arc<MutationQueue>,
    ledger: Arc<OverlayLedger>,
    engine: Arc<SyncEngine>,
    storage: Arc<StorageMonitor>,
}

pub struct OfflineSyncDeps {
    pub store: Arc<dyn MutationStore>,
    pub cache: Arc<dyn ReactiveCache<Vec<CachedRecord>>>,
    pub client: Arc<dyn SyncClient>,
    pub estimator: Arc<dyn StorageEstimator>,
    pub schemas: PayloadSchemaRegistry,
}

impl OfflineSyncService {
    pub fn new(
        queue: Arc<MutationQueue>,
        ledger: Arc<OverlayLedger>,
        engine: Arc<SyncEngine>,
        storage: Arc<StorageMonitor>,
    ) -> Self {
        Self {
            queue,
            ledger,
            engine,
            storage,
        }
    }

    /// Wires the queue, ledger, engine and storage gate from their ports.
    pub fn assemble(deps: OfflineSyncDeps, config: &AppConfig) -> Result<Self, AppError> {
        let thresholds = StorageThresholds::from_config(&config.storage)?;
        let queue = Arc::new(MutationQueue::new(deps.store, deps.schemas));
        let ledger = Arc::new(OverlayLedger::new(deps.cache));
        let engine = Arc::new(SyncEngine::new(
            Arc::clone(&queue),
            Arc::clone(&ledger),
            deps.client,
            SyncSettings::from_config(config),
            Arc::new(SyncMetrics::new()),
        ));
        let storage = Arc::new(StorageMonitor::new(thresholds, deps.estimator));
        Ok(Self::new(queue, ledger, engine, storage))
    }

    pub fn engine(&self) -> &Arc<SyncEngine> {
        &self.engine
    }

    pub fn queue(&self) -> &Arc<MutationQueue> {
        &self.queue
    }

    pub fn storage(&self) -> &Arc<StorageMonitor> {
        &self.storage
    }

    pub async fn cached(&self, key: &CacheKey) -> Option<Vec<CachedRecord>> {
        self.ledger.cache().get(key).await
    }
}

#[async_trait]
impl OfflineSyncServiceTrait for OfflineSyncService {
    /// Refuses new work when storage is exhausted, then validates, persists and
    /// reflects the mutation in the cache.
    async fn enqueue(&self, draft: MutationDraft) -> Result<MutationId, AppError> {
        self.storage.ensure_can_queue().await?;

        let _admission = self.queue.admission().await;
        let mutation = self.queue.enqueue(draft).await?;
        self.ledger.apply(&mutation).await;
        Ok(mutation.id)
    }

    async fn cancel(&self, id: &MutationId) -> Result<bool, AppError> {
        self.engine.cancel(id).await
    }

    async fn drain_queue(&self) -> Result<DrainReport, AppError> {
        self.engine.drain_queue().await
    }

    async fn pending_mutations(&self) -> Result<Vec<Mutation>, AppError> {
        self.queue.dequeue_in_order().await
    }

    async fn storage_status(&self) -> Result<StorageStatus, AppError> {
        self.storage.storage_status().await
    }

    async fn can_queue_mutation(&self) -> Result<bool, AppError> {
        self.storage.can_queue_mutation().await
    }

    async fn is_cache_stale(&self, key: &CacheKey) -> Result<bool, AppError> {
        self.engine.is_cache_stale(key).await
    }

    /// Re-projects the durable queue onto the cache, e.g. after a restart or a
    /// refetch replaced cached lists. Returns how many mutations were applied.
    async fn rehydrate(&self) -> Result<usize, AppError> {
        let mut applied = 0;
        for mutation in self.queue.dequeue_in_order().await? {
            if self.ledger.apply(&mutation).await {
                applied += 1;
            }
        }
        info!(applied, "optimistic cache rehydrated from queue");
        Ok(applied)
    }

    fn subscribe(&self) -> broadcast::Receiver<CacheKey> {
        self.ledger.cache().subscribe()
    }

    fn metrics(&self) -> SyncMetricsSnapshot {
        self.engine.metrics().snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{ServerAck, SyncError};
    use crate::domain::entities::StorageEstimate;
    use crate::domain::value_objects::{EntityType, MutationType, TempId};
    use crate::infrastructure::cache::MemoryReactiveCache;
    use crate::infrastructure::database::ConnectionPool;
    use crate::infrastructure::offline::SqliteMutationStore;
    use mockall::mock;
    use serde_json::json;

    mock! {
        pub Client {}

        #[async_trait]
        impl SyncClient for Client {
            async fn apply(&self, mutation: &Mutation) -> Result<ServerAck, SyncError>;
        }
    }

    mock! {
        pub Estimator {}

        #[async_trait]
        impl StorageEstimator for Estimator {
            async fn estimate(&self) -> Result<StorageEstimate, AppError>;
        }
    }

    struct Fixture {
        service: OfflineSyncService,
        cache: Arc<MemoryReactiveCache<Vec<CachedRecord>>>,
    }

    async fn fixture(client: MockClient, usage: u64, quota: u64, config: AppConfig) -> Fixture {
        let pool = ConnectionPool::in_memory().await.unwrap();
        let cache: Arc<MemoryReactiveCache<Vec<CachedRecord>>> = Arc::new(MemoryReactiveCache::new());
        let mut estimator = MockEstimator::new();
        estimator
            .expect_estimate()
            .returning(move || Ok(StorageEstimate::new(usage, quota)));

        let service = OfflineSyncService::assemble(
            OfflineSyncDeps {
                store: Arc::new(SqliteMutationStore::new(pool.get_pool().clone())),
                cache: cache.clone(),
                client: Arc::new(client),
                estimator: Arc::new(estimator),
                schemas: PayloadSchemaRegistry::farm_defaults(),
            },
            &config,
        )
        .unwrap();
        Fixture { service, cache }
    }

    fn batch() -> EntityType {
        EntityType::new("batch".into()).unwrap()
    }

    fn batch_key() -> CacheKey {
        CacheKey::for_entity_type(&batch())
    }

    fn create_batch(name: &str) -> MutationDraft {
        MutationDraft::new(
            MutationType::Create,
            &batch(),
            TempId::for_entity(&batch()).to_string(),
            json!({"name": name}),
        )
    }

    #[tokio::test]
    async fn blocked_storage_rejects_enqueue_without_side_effects() {
        let mut config = AppConfig::default();
        config.storage.warning_percent = 60.0;
        config.storage.critical_percent = 80.0;
        config.storage.blocked_percent = 95.0;
        let fx = fixture(MockClient::new(), 96, 100, config).await;

        assert_eq!(fx.service.storage_status().await.unwrap(), StorageStatus::Blocked);
        assert!(!fx.service.can_queue_mutation().await.unwrap());

        let result = fx.service.enqueue(create_batch("Layers")).await;
        assert!(matches!(result, Err(AppError::StorageExhausted(_))));
        assert!(fx.service.pending_mutations().await.unwrap().is_empty());
        assert!(fx.cache.get(&batch_key()).await.is_none());
    }

    #[tokio::test]
    async fn enqueue_reflects_mutation_in_cache_and_notifies() {
        let fx = fixture(MockClient::new(), 1, 100, AppConfig::default()).await;
        let mut changes = fx.service.subscribe();

        let draft = create_batch("Layers");
        let temp_id = draft.entity_id.clone();
        let id = fx.service.enqueue(draft).await.unwrap();

        let cached = fx.service.cached(&batch_key()).await.unwrap();
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].id, temp_id);
        assert!(cached[0].is_optimistic);
        assert_eq!(changes.recv().await.unwrap(), batch_key());
        assert_eq!(fx.service.pending_mutations().await.unwrap()[0].id, id);
    }

    #[tokio::test]
    async fn invalid_draft_leaves_cache_untouched() {
        let fx = fixture(MockClient::new(), 1, 100, AppConfig::default()).await;
        let mut draft = create_batch("Layers");
        draft.payload = json!("not an object");

        assert!(matches!(
            fx.service.enqueue(draft).await,
            Err(AppError::ValidationError(_))
        ));
        assert!(fx.cache.get(&batch_key()).await.is_none());
    }

    #[tokio::test]
    async fn cancel_removes_and_rolls_back() {
        let fx = fixture(MockClient::new(), 1, 100, AppConfig::default()).await;
        fx.cache
            .set(
                &batch_key(),
                vec![CachedRecord::confirmed("srv-1", serde_json::Map::new())],
            )
            .await;
        let id = fx.service.enqueue(create_batch("Ducks")).await.unwrap();
        assert_eq!(fx.cache.get(&batch_key()).await.unwrap().len(), 2);

        assert!(fx.service.cancel(&id).await.unwrap());
        assert!(!fx.service.cancel(&id).await.unwrap());

        let cached = fx.cache.get(&batch_key()).await.unwrap();
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].id, "srv-1");
        assert!(fx.service.pending_mutations().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn in_flight_mutation_cannot_be_cancelled() {
        let mut client = MockClient::new();
        let (entered_tx, entered_rx) = std::sync::mpsc::channel::<()>();
        let entered_tx = std::sync::Mutex::new(entered_tx);
        client.expect_apply().returning(move |_| {
            let _ = entered_tx.lock().unwrap().send(());
            std::thread::sleep(std::time::Duration::from_millis(300));
            Ok(ServerAck::with_id("srv-1"))
        });
        let fx = fixture(client, 1, 100, AppConfig::default()).await;
        let service = Arc::new(fx.service);
        let id = service.enqueue(create_batch("Layers")).await.unwrap();

        let drainer = {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.drain_queue().await })
        };
        tokio::task::spawn_blocking(move || entered_rx.recv().unwrap())
            .await
            .unwrap();

        assert!(matches!(
            service.cancel(&id).await,
            Err(AppError::MutationInFlight(_))
        ));
        let report = drainer.await.unwrap().unwrap();
        assert_eq!(report.synced, vec![id]);
    }

    #[tokio::test]
    async fn rehydrate_replays_queue_once() {
        let fx = fixture(MockClient::new(), 1, 100, AppConfig::default()).await;
        fx.service.enqueue(create_batch("A")).await.unwrap();
        fx.service.enqueue(create_batch("B")).await.unwrap();

        assert_eq!(fx.service.rehydrate().await.unwrap(), 0);
        assert_eq!(fx.cache.get(&batch_key()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn unsynced_cache_key_is_stale() {
        let fx = fixture(MockClient::new(), 1, 100, AppConfig::default()).await;
        assert!(fx.service.is_cache_stale(&batch_key()).await.unwrap());
    }
}
