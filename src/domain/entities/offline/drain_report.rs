use crate::domain::value_objects::{MutationId, SyncOutcome};
use crate::shared::error::AppError;

/// A mutation dropped from the queue for good, with the reason surfaced to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedMutation {
    pub id: MutationId,
    pub error: AppError,
}

/// Result of one drain cycle. Every attempted mutation lands in exactly one bucket.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrainReport {
    pub synced: Vec<MutationId>,
    pub failed: Vec<FailedMutation>,
    pub pending: Vec<MutationId>,
}

impl DrainReport {
    pub fn record_synced(&mut self, id: MutationId) {
        self.synced.push(id);
    }

    pub fn record_pending(&mut self, id: MutationId) {
        self.pending.push(id);
    }

    pub fn record_failed(&mut self, id: MutationId, error: AppError) {
        self.failed.push(FailedMutation { id, error });
    }

    pub fn synced_count(&self) -> usize {
        self.synced.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn attempted(&self) -> usize {
        self.synced_count() + self.failed_count() + self.pending_count()
    }

    pub fn outcome_of(&self, id: &MutationId) -> Option<SyncOutcome> {
        if self.synced.contains(id) {
            Some(SyncOutcome::Synced)
        } else if self.failed.iter().any(|failed| &failed.id == id) {
            Some(SyncOutcome::Failed)
        } else if self.pending.contains(id) {
            Some(SyncOutcome::Pending)
        } else {
            None
        }
    }

    pub fn error_of(&self, id: &MutationId) -> Option<&AppError> {
        self.failed
            .iter()
            .find(|failed| &failed.id == id)
            .map(|failed| &failed.error)
    }
}
