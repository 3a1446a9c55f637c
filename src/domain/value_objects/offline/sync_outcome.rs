use serde::{Deserialize, Serialize};
use std::fmt;

/// Terminal classification of one drain attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    Synced,
    Failed,
    /// Still queued; retried on a later drain cycle.
    Pending,
}

impl SyncOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncOutcome::Synced => "synced",
            SyncOutcome::Failed => "failed",
            SyncOutcome::Pending => "pending",
        }
    }
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
