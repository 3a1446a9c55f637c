pub mod ports;
pub mod services;
pub mod shared;

pub use services::{
    MutationQueue,
    OfflineSyncService,
    OfflineSyncServiceTrait,
    SyncEngine,
};
