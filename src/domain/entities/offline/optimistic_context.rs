use crate::domain::value_objects::TempId;

/// Snapshot of a cache entry taken right before an optimistic write.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimisticContext<T> {
    pub previous_data: Option<T>,
    pub temp_id: Option<TempId>,
}

impl<T> OptimisticContext<T> {
    pub fn new(previous_data: Option<T>, temp_id: Option<TempId>) -> Self {
        Self {
            previous_data,
            temp_id,
        }
    }

    pub fn has_snapshot(&self) -> bool {
        self.previous_data.is_some()
    }
}
