use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub sync: SyncConfig,
    pub storage: StorageConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub auto_sync: bool,
    /// Transient failures tolerated before a mutation is failed for good.
    pub max_retries: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub batch_size: u32,
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub warning_percent: f64,
    pub critical_percent: f64,
    pub blocked_percent: f64,
    pub quota_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub stale_after_hours: i64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: default_database_url(),
                max_connections: 5,
            },
            sync: SyncConfig::default(),
            storage: StorageConfig::default(),
            cache: CacheConfig {
                stale_after_hours: 24,
            },
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            auto_sync: true,
            max_retries: 5,
            base_backoff_ms: 1_000,
            max_backoff_ms: 5 * 60 * 1_000, // 5 minutes
            batch_size: 100,
            request_timeout_ms: 30_000,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            warning_percent: 80.0,
            critical_percent: 90.0,
            blocked_percent: 95.0,
            quota_bytes: 500 * 1024 * 1024, // 500MB
        }
    }
}

fn default_database_url() -> String {
    let dir = dirs::data_local_dir()
        .map(|dir| dir.join("farmsync"))
        .unwrap_or_else(|| PathBuf::from("./data"));
    format!("sqlite://{}?mode=rwc", dir.join("offline_queue.db").display())
}

impl AppConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("FARMSYNC_DATABASE_URL") {
            if !v.trim().is_empty() {
                cfg.database.url = v.trim().to_string();
            }
        }
        if let Some(value) = env_parsed("FARMSYNC_DATABASE_MAX_CONNECTIONS", parse_u32) {
            cfg.database.max_connections = value.max(1);
        }

        if let Ok(v) = std::env::var("FARMSYNC_AUTO_SYNC") {
            cfg.sync.auto_sync = parse_bool(&v, cfg.sync.auto_sync);
        }
        if let Some(value) = env_parsed("FARMSYNC_MAX_RETRIES", parse_u32) {
            cfg.sync.max_retries = value;
        }
        if let Some(value) = env_parsed("FARMSYNC_BASE_BACKOFF_MS", parse_u64) {
            cfg.sync.base_backoff_ms = value.max(1);
        }
        if let Some(value) = env_parsed("FARMSYNC_MAX_BACKOFF_MS", parse_u64) {
            cfg.sync.max_backoff_ms = value.max(1);
        }
        if let Some(value) = env_parsed("FARMSYNC_BATCH_SIZE", parse_u32) {
            cfg.sync.batch_size = value.max(1);
        }
        if let Some(value) = env_parsed("FARMSYNC_REQUEST_TIMEOUT_MS", parse_u64) {
            cfg.sync.request_timeout_ms = value.max(1);
        }

        if let Some(value) = env_parsed("FARMSYNC_STORAGE_WARNING_PERCENT", parse_f64) {
            cfg.storage.warning_percent = value;
        }
        if let Some(value) = env_parsed("FARMSYNC_STORAGE_CRITICAL_PERCENT", parse_f64) {
            cfg.storage.critical_percent = value;
        }
        if let Some(value) = env_parsed("FARMSYNC_STORAGE_BLOCKED_PERCENT", parse_f64) {
            cfg.storage.blocked_percent = value;
        }
        if let Some(value) = env_parsed("FARMSYNC_STORAGE_QUOTA_BYTES", parse_u64) {
            cfg.storage.quota_bytes = value;
        }

        if let Some(value) = env_parsed("FARMSYNC_CACHE_STALE_AFTER_HOURS", parse_i64) {
            cfg.cache.stale_after_hours = value.max(1);
        }

        cfg
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.database.max_connections == 0 {
            return Err("Database max_connections must be greater than 0".to_string());
        }
        if self.sync.batch_size == 0 {
            return Err("Sync batch_size must be greater than 0".to_string());
        }
        if self.sync.base_backoff_ms > self.sync.max_backoff_ms {
            return Err("Sync base_backoff_ms must not exceed max_backoff_ms".to_string());
        }
        if self.sync.request_timeout_ms == 0 {
            return Err("Sync request_timeout_ms must be greater than 0".to_string());
        }
        let storage = &self.storage;
        let in_range = |value: f64| value > 0.0 && value <= 100.0;
        if !(in_range(storage.warning_percent)
            && in_range(storage.critical_percent)
            && in_range(storage.blocked_percent))
        {
            return Err("Storage thresholds must be within (0, 100]".to_string());
        }
        if !(storage.warning_percent < storage.critical_percent
            && storage.critical_percent < storage.blocked_percent)
        {
            return Err("Storage thresholds must satisfy warning < critical < blocked".to_string());
        }
        if storage.quota_bytes == 0 {
            return Err("Storage quota_bytes must be greater than 0".to_string());
        }
        if self.cache.stale_after_hours <= 0 {
            return Err("Cache stale_after_hours must be greater than 0".to_string());
        }
        Ok(())
    }
}

fn env_parsed<T>(key: &str, parse: fn(&str) -> Option<T>) -> Option<T> {
    std::env::var(key).ok().and_then(|value| parse(&value))
}

fn parse_bool(s: &str, default: bool) -> bool {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

fn parse_u32(value: &str) -> Option<u32> {
    value.trim().parse::<u32>().ok()
}

fn parse_u64(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok()
}

fn parse_i64(value: &str) -> Option<i64> {
    value.trim().parse::<i64>().ok()
}

fn parse_f64(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok()
}
