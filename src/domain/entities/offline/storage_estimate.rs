use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StorageEstimate {
    pub usage_bytes: u64,
    pub quota_bytes: u64,
}

impl StorageEstimate {
    pub fn new(usage_bytes: u64, quota_bytes: u64) -> Self {
        Self {
            usage_bytes,
            quota_bytes,
        }
    }

    /// Percent of the quota in use. An unknown (zero) quota reads as fully used.
    pub fn percent_used(&self) -> f64 {
        if self.quota_bytes == 0 {
            return 100.0;
        }
        (self.usage_bytes as f64 / self.quota_bytes as f64) * 100.0
    }
}
