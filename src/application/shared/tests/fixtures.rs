use std::sync::Arc;

use serde_json::{Value, json};

use super::mocks::ScriptedSyncClient;
use crate::application::ports::{MutationStore, ReactiveCache};
use crate::application::services::offline_sync_service::{OfflineSyncDeps, OfflineSyncService};
use crate::application::services::payload_schema::PayloadSchemaRegistry;
use crate::domain::entities::{CachedRecord, MutationDraft};
use crate::domain::value_objects::{CacheKey, EntityType, MutationType, TempId};
use crate::infrastructure::cache::MemoryReactiveCache;
use crate::infrastructure::database::ConnectionPool;
use crate::infrastructure::offline::SqliteMutationStore;
use crate::infrastructure::storage::FixedStorageEstimator;
use crate::shared::config::AppConfig;

pub struct SyncHarness {
    pub service: Arc<OfflineSyncService>,
    pub client: Arc<ScriptedSyncClient>,
    pub cache: Arc<MemoryReactiveCache<Vec<CachedRecord>>>,
    pub pool: ConnectionPool,
}

impl SyncHarness {
    pub async fn new() -> Self {
        Self::with(ScriptedSyncClient::new(), AppConfig::default()).await
    }

    pub async fn with(client: ScriptedSyncClient, config: AppConfig) -> Self {
        Self::with_store(client, config, |store| Arc::new(store)).await
    }

    /// Like [`SyncHarness::with`], with the sqlite store wrapped before use.
    pub async fn with_store(
        client: ScriptedSyncClient,
        config: AppConfig,
        wrap: impl FnOnce(SqliteMutationStore) -> Arc<dyn MutationStore>,
    ) -> Self {
        let pool = ConnectionPool::in_memory().await.unwrap();
        let client = Arc::new(client);
        let cache: Arc<MemoryReactiveCache<Vec<CachedRecord>>> = Arc::new(MemoryReactiveCache::new());
        let service = OfflineSyncService::assemble(
            OfflineSyncDeps {
                store: wrap(SqliteMutationStore::new(pool.get_pool().clone())),
                cache: cache.clone(),
                client: client.clone(),
                estimator: Arc::new(FixedStorageEstimator::new(0, config.storage.quota_bytes)),
                schemas: PayloadSchemaRegistry::farm_defaults(),
            },
            &config,
        )
        .unwrap();

        Self {
            service: Arc::new(service),
            client,
            cache,
            pool,
        }
    }

    pub async fn cached(&self, entity_type: &str) -> Vec<CachedRecord> {
        self.cache
            .get(&key(entity_type))
            .await
            .unwrap_or_default()
    }

    pub async fn seed(&self, entity_type: &str, records: Vec<CachedRecord>) {
        self.cache.set(&key(entity_type), records).await;
    }
}

pub fn entity(name: &str) -> EntityType {
    EntityType::new(name.to_string()).unwrap()
}

pub fn key(entity_type: &str) -> CacheKey {
    CacheKey::for_entity_type(&entity(entity_type))
}

pub fn record(id: &str, fields: Value) -> CachedRecord {
    CachedRecord::confirmed(id, fields.as_object().cloned().unwrap_or_default())
}

/// Create draft with a fresh entity-scoped temp id; returns the draft and that id.
pub fn create(entity_type: &str, payload: Value) -> (MutationDraft, String) {
    let temp_id = TempId::for_entity(&entity(entity_type)).to_string();
    let draft = MutationDraft::new(MutationType::Create, &entity(entity_type), &temp_id, payload);
    (draft, temp_id)
}

pub fn update(entity_type: &str, entity_id: &str, payload: Value) -> MutationDraft {
    MutationDraft::new(MutationType::Update, &entity(entity_type), entity_id, payload)
}

pub fn delete(entity_type: &str, entity_id: &str) -> MutationDraft {
    MutationDraft::new(MutationType::Delete, &entity(entity_type), entity_id, json!({}))
}
