use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum AppError {
    Database(String),
    NotFound(String),
    ValidationError(String),
    /// The storage gate refused new work; carries the percent-used reading.
    StorageExhausted(f64),
    TransientSync(String),
    PermanentSync(String),
    MutationInFlight(String),
    /// The mutation was withdrawn by the caller before it reached the server.
    Cancelled(String),
    DrainInProgress,
    ConfigurationError(String),
    SerializationError(String),
    DeserializationError(String),
    Internal(String),
}

impl AppError {
    /// Errors that leave the mutation queued for another drain cycle.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::TransientSync(_))
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Database(msg) => write!(f, "Database error: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::StorageExhausted(percent) => write!(
                f,
                "Storage exhausted: {:.1}% used, new changes cannot be saved offline",
                percent
            ),
            AppError::TransientSync(msg) => write!(f, "Sync temporarily unavailable: {}", msg),
            AppError::PermanentSync(msg) => write!(f, "Sync rejected: {}", msg),
            AppError::MutationInFlight(id) => {
                write!(f, "Mutation {} is already being sent and cannot be cancelled", id)
            }
            AppError::Cancelled(id) => write!(f, "Mutation {} was cancelled", id),
            AppError::DrainInProgress => write!(f, "A sync cycle is already running"),
            AppError::ConfigurationError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            AppError::DeserializationError(msg) => write!(f, "Deserialization error: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::SerializationError(err.to_string())
    }
}

impl From<String> for AppError {
    fn from(err: String) -> Self {
        AppError::Internal(err)
    }
}

impl From<&str> for AppError {
    fn from(err: &str) -> Self {
        AppError::Internal(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
