pub mod offline;

pub use offline::{
    CacheKey, EntityId, EntityType, MutationId, MutationPayload, MutationType, PayloadValue,
    StorageStatus, SyncOutcome, TEMP_ID_PREFIX, TempId, is_temp_id,
};
