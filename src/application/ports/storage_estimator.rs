use crate::domain::entities::StorageEstimate;
use crate::shared::error::AppError;
use async_trait::async_trait;

#[async_trait]
pub trait StorageEstimator: Send + Sync {
    async fn estimate(&self) -> Result<StorageEstimate, AppError>;
}
