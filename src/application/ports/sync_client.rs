use crate::domain::entities::{CachedRecord, Mutation};
use crate::shared::error::AppError;
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Server acknowledgement of an applied mutation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ServerAck {
    pub server_id: Option<String>,
    pub server_record: Option<CachedRecord>,
}

impl ServerAck {
    pub fn with_id(server_id: impl Into<String>) -> Self {
        Self {
            server_id: Some(server_id.into()),
            server_record: None,
        }
    }

    pub fn with_record(record: CachedRecord) -> Self {
        Self {
            server_id: Some(record.id.clone()),
            server_record: Some(record),
        }
    }
}

/// Failure reported by the domain API, already classified by the client.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SyncError {
    #[error("server unavailable: {0}")]
    Transient(String),

    #[error("rejected by server: {0}")]
    Permanent(String),

    #[error("conflicting server version")]
    Conflict { server_record: Value },
}

impl From<SyncError> for AppError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Transient(message) => AppError::TransientSync(message),
            SyncError::Permanent(message) => AppError::PermanentSync(message),
            SyncError::Conflict { .. } => {
                AppError::PermanentSync("conflicting server version".to_string())
            }
        }
    }
}

/// Opaque network client performing the actual domain writes.
#[async_trait]
pub trait SyncClient: Send + Sync {
    async fn apply(&self, mutation: &Mutation) -> Result<ServerAck, SyncError>;
}
