use serde::{Deserialize, Serialize};
use std::fmt;

/// Persisted-storage pressure, ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageStatus {
    Ok,
    Warning,
    Critical,
    Blocked,
}

impl StorageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageStatus::Ok => "ok",
            StorageStatus::Warning => "warning",
            StorageStatus::Critical => "critical",
            StorageStatus::Blocked => "blocked",
        }
    }

    pub fn accepts_mutations(&self) -> bool {
        !matches!(self, StorageStatus::Blocked)
    }
}

impl fmt::Display for StorageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
