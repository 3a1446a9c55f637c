pub mod mutation_store;
pub mod reactive_cache;
pub mod storage_estimator;
pub mod sync_client;

pub use mutation_store::MutationStore;
pub use reactive_cache::ReactiveCache;
pub use storage_estimator::StorageEstimator;
pub use sync_client::{ServerAck, SyncClient, SyncError};
