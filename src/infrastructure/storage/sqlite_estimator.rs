use crate::application::ports::StorageEstimator;
use crate::domain::entities::StorageEstimate;
use crate::shared::error::AppError;
use async_trait::async_trait;
use sqlx::{Pool, Sqlite};

/// Measures the queue database (pages in use times page size) against a fixed quota.
pub struct SqliteStorageEstimator {
    pool: Pool<Sqlite>,
    quota_bytes: u64,
}

impl SqliteStorageEstimator {
    pub fn new(pool: Pool<Sqlite>, quota_bytes: u64) -> Self {
        Self { pool, quota_bytes }
    }
}

#[async_trait]
impl StorageEstimator for SqliteStorageEstimator {
    async fn estimate(&self) -> Result<StorageEstimate, AppError> {
        let page_count: i64 = sqlx::query_scalar("PRAGMA page_count")
            .fetch_one(&self.pool)
            .await?;
        let page_size: i64 = sqlx::query_scalar("PRAGMA page_size")
            .fetch_one(&self.pool)
            .await?;
        let usage = page_count.max(0).saturating_mul(page_size.max(0));
        Ok(StorageEstimate::new(
            u64::try_from(usage).unwrap_or(0),
            self.quota_bytes,
        ))
    }
}

/// Reports a fixed reading. Useful where the host platform supplies its own numbers.
pub struct FixedStorageEstimator {
    estimate: StorageEstimate,
}

impl FixedStorageEstimator {
    pub fn new(usage_bytes: u64, quota_bytes: u64) -> Self {
        Self {
            estimate: StorageEstimate::new(usage_bytes, quota_bytes),
        }
    }
}

#[async_trait]
impl StorageEstimator for FixedStorageEstimator {
    async fn estimate(&self) -> Result<StorageEstimate, AppError> {
        Ok(self.estimate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::ConnectionPool;

    #[tokio::test]
    async fn estimate_counts_database_pages() {
        let pool = ConnectionPool::in_memory().await.unwrap();
        let estimator = SqliteStorageEstimator::new(pool.get_pool().clone(), 10 * 1024 * 1024);

        let estimate = estimator.estimate().await.unwrap();
        assert!(estimate.usage_bytes > 0);
        assert_eq!(estimate.quota_bytes, 10 * 1024 * 1024);
        assert!(estimate.percent_used() < 100.0);
    }

    #[tokio::test]
    async fn tiny_quota_reads_as_exhausted() {
        let pool = ConnectionPool::in_memory().await.unwrap();
        let estimator = SqliteStorageEstimator::new(pool.get_pool().clone(), 1);
        assert!(estimator.estimate().await.unwrap().percent_used() > 100.0);
    }
}
