pub mod cached_record;
pub mod drain_report;
pub mod mutation;
pub mod optimistic_context;
pub mod storage_estimate;

pub use cached_record::CachedRecord;
pub use drain_report::{DrainReport, FailedMutation};
pub use mutation::{Mutation, MutationDraft, truncate_to_millis};
pub use optimistic_context::OptimisticContext;
pub use storage_estimate::StorageEstimate;
