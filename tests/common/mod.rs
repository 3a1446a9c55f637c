#![allow(dead_code)]

use async_trait::async_trait;
use farmsync_lib::{
    AppConfig, CachedRecord, ConnectionPool, FixedStorageEstimator, MemoryReactiveCache, Mutation,
    MutationType, OfflineSyncDeps, OfflineSyncService, PayloadSchemaRegistry, ServerAck,
    SqliteMutationStore, SyncClient, SyncError,
};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Server double that can be switched offline; creates receive `srv-N` ids.
#[derive(Default)]
pub struct SwitchableClient {
    offline: AtomicBool,
    next_id: AtomicU32,
    calls: AtomicU32,
}

impl SwitchableClient {
    pub fn offline() -> Self {
        let client = Self::default();
        client.set_offline(true);
        client
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SyncClient for SwitchableClient {
    async fn apply(&self, mutation: &Mutation) -> Result<ServerAck, SyncError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(SyncError::Transient("network unreachable".into()));
        }
        if mutation.mutation_type == MutationType::Create {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            return Ok(ServerAck::with_id(format!("srv-{id}")));
        }
        Ok(ServerAck::default())
    }
}

pub struct App {
    pub service: OfflineSyncService,
    pub cache: Arc<MemoryReactiveCache<Vec<CachedRecord>>>,
    pub pool: ConnectionPool,
}

pub async fn open_pool(path: &Path) -> ConnectionPool {
    let url = format!("sqlite://{}?mode=rwc", path.display());
    let pool = ConnectionPool::new(&url, 2).await.unwrap();
    pool.migrate().await.unwrap();
    pool
}

/// Boots the service over the database at `path` with an empty cache, the way
/// a fresh process start would.
pub async fn boot(
    path: &Path,
    client: Arc<dyn SyncClient>,
    usage_bytes: u64,
    config: &AppConfig,
) -> App {
    let pool = open_pool(path).await;
    let cache: Arc<MemoryReactiveCache<Vec<CachedRecord>>> = Arc::new(MemoryReactiveCache::new());
    let service = OfflineSyncService::assemble(
        OfflineSyncDeps {
            store: Arc::new(SqliteMutationStore::new(pool.get_pool().clone())),
            cache: cache.clone(),
            client,
            estimator: Arc::new(FixedStorageEstimator::new(
                usage_bytes,
                config.storage.quota_bytes,
            )),
            schemas: PayloadSchemaRegistry::farm_defaults(),
        },
        config,
    )
    .unwrap();

    App {
        service,
        cache,
        pool,
    }
}
