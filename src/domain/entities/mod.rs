pub mod offline;

pub use offline::{
    CachedRecord, DrainReport, FailedMutation, Mutation, MutationDraft, OptimisticContext,
    StorageEstimate, truncate_to_millis,
};
