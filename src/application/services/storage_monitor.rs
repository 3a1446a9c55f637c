use crate::application::ports::StorageEstimator;
use crate::domain::value_objects::StorageStatus;
use crate::shared::config::StorageConfig;
use crate::shared::error::AppError;
use std::sync::Arc;
use tracing::{debug, warn};

const BYTE_UNITS: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StorageThresholds {
    warning: f64,
    critical: f64,
    blocked: f64,
}

impl StorageThresholds {
    pub fn new(warning: f64, critical: f64, blocked: f64) -> Result<Self, AppError> {
        let in_range = |value: f64| value > 0.0 && value <= 100.0;
        if !(in_range(warning) && in_range(critical) && in_range(blocked)) {
            return Err(AppError::ConfigurationError(format!(
                "storage thresholds must be within (0, 100], got {warning}/{critical}/{blocked}"
            )));
        }
        if !(warning < critical && critical < blocked) {
            return Err(AppError::ConfigurationError(format!(
                "storage thresholds must ascend, got {warning}/{critical}/{blocked}"
            )));
        }
        Ok(Self {
            warning,
            critical,
            blocked,
        })
    }

    pub fn from_config(config: &StorageConfig) -> Result<Self, AppError> {
        Self::new(
            config.warning_percent,
            config.critical_percent,
            config.blocked_percent,
        )
    }

    pub fn status(&self, percent_used: f64) -> StorageStatus {
        if percent_used >= self.blocked {
            StorageStatus::Blocked
        } else if percent_used >= self.critical {
            StorageStatus::Critical
        } else if percent_used >= self.warning {
            StorageStatus::Warning
        } else {
            StorageStatus::Ok
        }
    }

    pub fn can_queue_mutation(&self, percent_used: f64) -> bool {
        self.status(percent_used) != StorageStatus::Blocked
    }
}

impl Default for StorageThresholds {
    fn default() -> Self {
        Self {
            warning: 80.0,
            critical: 90.0,
            blocked: 95.0,
        }
    }
}

/// The single backpressure gate: once storage is nearly exhausted, new optimistic
/// writes are refused instead of risking a silent persistence failure.
pub struct StorageMonitor {
    thresholds: StorageThresholds,
    estimator: Arc<dyn StorageEstimator>,
}

impl StorageMonitor {
    pub fn new(thresholds: StorageThresholds, estimator: Arc<dyn StorageEstimator>) -> Self {
        Self {
            thresholds,
            estimator,
        }
    }

    pub fn thresholds(&self) -> StorageThresholds {
        self.thresholds
    }

    pub async fn percent_used(&self) -> Result<f64, AppError> {
        let estimate = self.estimator.estimate().await?;
        Ok(estimate.percent_used())
    }

    pub async fn storage_status(&self) -> Result<StorageStatus, AppError> {
        let percent = self.percent_used().await?;
        let status = self.thresholds.status(percent);
        debug!(percent, status = %status, "storage status evaluated");
        Ok(status)
    }

    pub async fn can_queue_mutation(&self) -> Result<bool, AppError> {
        Ok(self.storage_status().await?.accepts_mutations())
    }

    /// Fails with `StorageExhausted` when the gate is closed.
    pub async fn ensure_can_queue(&self) -> Result<(), AppError> {
        let percent = self.percent_used().await?;
        if !self.thresholds.can_queue_mutation(percent) {
            warn!(percent, "refusing mutation, storage exhausted");
            return Err(AppError::StorageExhausted(percent));
        }
        Ok(())
    }
}

/// Human-readable size. The mantissa stays within (0, 1024] up to terabytes.
pub fn format_bytes(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut exponent = 0;
    let mut value = bytes as f64;
    while value >= 1024.0 && exponent < BYTE_UNITS.len() - 1 {
        value /= 1024.0;
        exponent += 1;
    }
    let rounded = format!("{value:.2}");
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, BYTE_UNITS[exponent])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::StorageEstimate;
    use async_trait::async_trait;
    use mockall::mock;

    mock! {
        pub Estimator {}

        #[async_trait]
        impl StorageEstimator for Estimator {
            async fn estimate(&self) -> Result<StorageEstimate, AppError>;
        }
    }

    fn estimator_at(usage: u64, quota: u64) -> Arc<dyn StorageEstimator> {
        let mut estimator = MockEstimator::new();
        estimator
            .expect_estimate()
            .returning(move || Ok(StorageEstimate::new(usage, quota)));
        Arc::new(estimator)
    }

    #[test]
    fn status_boundaries_are_inclusive_at_each_threshold() {
        let thresholds = StorageThresholds::new(60.0, 80.0, 95.0).unwrap();
        assert_eq!(thresholds.status(0.0), StorageStatus::Ok);
        assert_eq!(thresholds.status(59.99), StorageStatus::Ok);
        assert_eq!(thresholds.status(60.0), StorageStatus::Warning);
        assert_eq!(thresholds.status(80.0), StorageStatus::Critical);
        assert_eq!(thresholds.status(94.9), StorageStatus::Critical);
        assert_eq!(thresholds.status(95.0), StorageStatus::Blocked);
        assert_eq!(thresholds.status(96.0), StorageStatus::Blocked);
        assert!(!thresholds.can_queue_mutation(96.0));
    }

    #[test]
    fn status_is_monotonic_in_percent_used() {
        let thresholds = StorageThresholds::default();
        let mut previous = StorageStatus::Ok;
        for step in 0..=1000 {
            let percent = step as f64 / 10.0;
            let status = thresholds.status(percent);
            assert!(status >= previous, "severity dropped at {percent}");
            assert_eq!(
                thresholds.can_queue_mutation(percent),
                status != StorageStatus::Blocked
            );
            previous = status;
        }
    }

    #[test]
    fn rejects_invalid_thresholds() {
        assert!(StorageThresholds::new(80.0, 80.0, 95.0).is_err());
        assert!(StorageThresholds::new(0.0, 80.0, 95.0).is_err());
        assert!(StorageThresholds::new(60.0, 80.0, 100.5).is_err());
        assert!(StorageThresholds::new(90.0, 80.0, 95.0).is_err());
        assert!(StorageThresholds::new(60.0, 80.0, 100.0).is_ok());
    }

    #[test]
    fn format_bytes_renders_units() {
        assert_eq!(format_bytes(0), "0 Bytes");
        assert_eq!(format_bytes(1), "1 Bytes");
        assert_eq!(format_bytes(1023), "1023 Bytes");
        assert_eq!(format_bytes(1024), "1 KB");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5 MB");
        assert_eq!(format_bytes(3 * 1024_u64.pow(4)), "3 TB");
    }

    #[test]
    fn format_bytes_mantissa_stays_in_range() {
        let samples = [1_u64, 999, 1023, 1025, 1_048_575, 1_048_576, 123_456_789, 1024_u64.pow(5) - 1];
        for bytes in samples {
            let rendered = format_bytes(bytes);
            let mantissa: f64 = rendered.split(' ').next().unwrap().parse().unwrap();
            assert!(mantissa > 0.0 && mantissa <= 1024.0, "{bytes} -> {rendered}");
        }
    }

    #[tokio::test]
    async fn blocked_storage_refuses_new_mutations() {
        let thresholds = StorageThresholds::new(60.0, 80.0, 95.0).unwrap();
        let monitor = StorageMonitor::new(thresholds, estimator_at(96, 100));

        assert_eq!(monitor.storage_status().await.unwrap(), StorageStatus::Blocked);
        assert!(!monitor.can_queue_mutation().await.unwrap());
        assert!(matches!(
            monitor.ensure_can_queue().await,
            Err(AppError::StorageExhausted(_))
        ));
    }

    #[tokio::test]
    async fn healthy_storage_accepts_mutations() {
        let monitor = StorageMonitor::new(StorageThresholds::default(), estimator_at(10, 100));
        assert_eq!(monitor.storage_status().await.unwrap(), StorageStatus::Ok);
        assert!(monitor.ensure_can_queue().await.is_ok());
    }
}
