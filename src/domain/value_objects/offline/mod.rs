pub mod cache_key;
pub mod entity_id;
pub mod entity_type;
pub mod mutation_id;
pub mod mutation_type;
pub mod payload;
pub mod storage_status;
pub mod sync_outcome;
pub mod temp_id;

pub use cache_key::CacheKey;
pub use entity_id::EntityId;
pub use entity_type::EntityType;
pub use mutation_id::MutationId;
pub use mutation_type::MutationType;
pub use payload::{MutationPayload, PayloadValue};
pub use storage_status::StorageStatus;
pub use sync_outcome::SyncOutcome;
pub use temp_id::{TEMP_ID_PREFIX, TempId, is_temp_id};
