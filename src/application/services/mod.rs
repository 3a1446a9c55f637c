pub mod mutation_queue;
pub mod offline_sync_service;
pub mod optimistic_overlay;
pub mod payload_schema;
pub mod rollback;
pub mod storage_monitor;
pub mod sync_engine;

pub use mutation_queue::MutationQueue;
pub use offline_sync_service::{OfflineSyncDeps, OfflineSyncService, OfflineSyncServiceTrait};
pub use payload_schema::{FieldKind, PayloadSchema, PayloadSchemaRegistry};
pub use rollback::{OverlayLedger, Rollback, create_optimistic_context, create_rollback};
pub use storage_monitor::{StorageMonitor, StorageThresholds, format_bytes};
pub use sync_engine::{RetryPolicy, SyncEngine, SyncSettings};
