pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod shared;

pub use application::ports::{
    MutationStore, ReactiveCache, ServerAck, StorageEstimator, SyncClient, SyncError,
};
pub use application::services::{
    MutationQueue, OfflineSyncDeps, OfflineSyncService, OfflineSyncServiceTrait, OverlayLedger,
    PayloadSchema, PayloadSchemaRegistry, StorageMonitor, StorageThresholds, SyncEngine,
    SyncSettings, format_bytes,
};
pub use domain::{
    CacheKey, CachedRecord, DrainReport, EntityId, EntityType, Mutation, MutationDraft,
    MutationId, MutationPayload, MutationType, StorageStatus, SyncOutcome, TempId,
};
pub use infrastructure::cache::MemoryReactiveCache;
pub use infrastructure::database::ConnectionPool;
pub use infrastructure::jobs::{DrainEventSink, SyncJob};
pub use infrastructure::offline::SqliteMutationStore;
pub use infrastructure::storage::{FixedStorageEstimator, SqliteStorageEstimator};
pub use shared::{AppConfig, AppError, SyncMetrics, SyncMetricsSnapshot};

/// Installs the global tracing subscriber. `RUST_LOG` overrides the default filter.
pub fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "farmsync_lib=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
