use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

pub const UNSET_TS: u64 = 0;

/// Drain outcome counters shared between the sync engine and whoever reports on it.
#[derive(Debug)]
pub struct SyncMetrics {
    synced: AtomicU64,
    failed: AtomicU64,
    pending: AtomicU64,
    drains: AtomicU64,
    last_synced_ms: AtomicU64,
    last_failed_ms: AtomicU64,
    last_drain_ms: AtomicU64,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SyncMetricsSnapshot {
    pub synced: u64,
    pub failed: u64,
    pub pending: u64,
    pub drains: u64,
    pub last_synced_ms: Option<u64>,
    pub last_failed_ms: Option<u64>,
    pub last_drain_ms: Option<u64>,
}

impl SyncMetrics {
    pub const fn new() -> Self {
        Self {
            synced: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            pending: AtomicU64::new(0),
            drains: AtomicU64::new(0),
            last_synced_ms: AtomicU64::new(UNSET_TS),
            last_failed_ms: AtomicU64::new(UNSET_TS),
            last_drain_ms: AtomicU64::new(UNSET_TS),
        }
    }

    pub fn record_synced(&self) {
        self.synced.fetch_add(1, Ordering::Relaxed);
        self.last_synced_ms
            .store(current_unix_ms(), Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        self.last_failed_ms
            .store(current_unix_ms(), Ordering::Relaxed);
    }

    pub fn record_pending(&self) {
        self.pending.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_drain(&self) {
        self.drains.fetch_add(1, Ordering::Relaxed);
        self.last_drain_ms
            .store(current_unix_ms(), Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SyncMetricsSnapshot {
        SyncMetricsSnapshot {
            synced: self.synced.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            pending: self.pending.load(Ordering::Relaxed),
            drains: self.drains.load(Ordering::Relaxed),
            last_synced_ms: timestamp_to_option(self.last_synced_ms.load(Ordering::Relaxed)),
            last_failed_ms: timestamp_to_option(self.last_failed_ms.load(Ordering::Relaxed)),
            last_drain_ms: timestamp_to_option(self.last_drain_ms.load(Ordering::Relaxed)),
        }
    }

    pub fn reset(&self) {
        self.synced.store(0, Ordering::Relaxed);
        self.failed.store(0, Ordering::Relaxed);
        self.pending.store(0, Ordering::Relaxed);
        self.drains.store(0, Ordering::Relaxed);
        self.last_synced_ms.store(UNSET_TS, Ordering::Relaxed);
        self.last_failed_ms.store(UNSET_TS, Ordering::Relaxed);
        self.last_drain_ms.store(UNSET_TS, Ordering::Relaxed);
    }
}

impl Default for SyncMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
pub fn current_unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis() as u64)
        .unwrap_or(UNSET_TS)
}

#[inline]
pub fn timestamp_to_option(value: u64) -> Option<u64> {
    if value == UNSET_TS { None } else { Some(value) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_recorded_outcomes() {
        let metrics = SyncMetrics::new();
        metrics.record_synced();
        metrics.record_synced();
        metrics.record_failed();
        metrics.record_pending();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.synced, 2);
        assert_eq!(snapshot.failed, 1);
        assert_eq!(snapshot.pending, 1);
        assert!(snapshot.last_synced_ms.is_some());
        assert!(snapshot.last_drain_ms.is_none());

        metrics.reset();
        assert_eq!(metrics.snapshot().synced, 0);
        assert!(metrics.snapshot().last_failed_ms.is_none());
    }
}
