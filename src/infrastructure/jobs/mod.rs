pub mod sync_job;

pub use sync_job::{DrainEventSink, SyncJob};
