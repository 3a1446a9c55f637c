pub mod sqlite_estimator;

pub use sqlite_estimator::{FixedStorageEstimator, SqliteStorageEstimator};
