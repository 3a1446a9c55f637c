pub mod entities;
pub mod value_objects;

pub use entities::{CachedRecord, DrainReport, Mutation, MutationDraft, OptimisticContext};
pub use value_objects::{
    CacheKey, EntityId, EntityType, MutationId, MutationPayload, MutationType, StorageStatus,
    SyncOutcome, TempId,
};
