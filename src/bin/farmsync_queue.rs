use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use farmsync_lib::application::services::mutation_queue::sort_mutations;
use farmsync_lib::application::services::sync_engine::reconciler::is_stale_after;
use farmsync_lib::{
    AppConfig, CacheKey, ConnectionPool, Mutation, MutationStore, SqliteMutationStore,
    SqliteStorageEstimator, StorageEstimator, StorageStatus, StorageThresholds, format_bytes,
};
use std::env;
use tokio::runtime::Runtime;

const DEFAULT_LIMIT: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Pending,
    Storage,
    Stale(String),
}

#[derive(Debug, Clone)]
struct CliOptions {
    command: Command,
    pretty: bool,
    limit: usize,
    database_url: Option<String>,
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct PendingReport {
    total: usize,
    shown: usize,
    oldest: Option<DateTime<Utc>>,
    mutations: Vec<Mutation>,
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct StorageReport {
    usage_bytes: u64,
    quota_bytes: u64,
    usage: String,
    quota: String,
    percent_used: f64,
    status: StorageStatus,
    accepts_mutations: bool,
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct StaleReport {
    cache_key: String,
    last_synced_at: Option<DateTime<Utc>>,
    stale: bool,
}

fn usage() -> &'static str {
    "Usage: farmsync-queue [pending|storage|stale <cache-key>] [--pretty] [--limit <n>] [--database-url <url>]"
}

fn main() -> Result<()> {
    farmsync_lib::init_logging();

    let args: Vec<String> = env::args().skip(1).collect();
    let options = parse_args(args)?;
    let config = AppConfig::from_env();
    config
        .validate()
        .map_err(|err| anyhow::anyhow!("Invalid configuration: {err}"))?;
    let database_url = resolve_database_url(&options, &config);

    let rt = Runtime::new().context("Failed to create Tokio runtime")?;
    let payload = rt.block_on(async {
        let pool = ConnectionPool::new(&database_url, config.database.max_connections)
            .await
            .with_context(|| format!("Failed to connect to database at {database_url}"))?;
        pool.migrate()
            .await
            .context("Failed to apply queue migrations")?;

        let payload = match &options.command {
            Command::Pending => {
                let report = collect_pending(&pool, options.limit).await?;
                to_json(&report, options.pretty)
            }
            Command::Storage => {
                let report = collect_storage(&pool, &config).await?;
                to_json(&report, options.pretty)
            }
            Command::Stale(key) => {
                let report = collect_staleness(&pool, &config, key).await?;
                to_json(&report, options.pretty)
            }
        };
        pool.close().await;
        payload
    })?;

    println!("{payload}");
    Ok(())
}

async fn collect_pending(pool: &ConnectionPool, limit: usize) -> Result<PendingReport> {
    let store = SqliteMutationStore::new(pool.get_pool().clone());
    let pending = sort_mutations(
        store
            .list_pending()
            .await
            .context("Failed to read the mutation queue")?,
    );
    let total = pending.len();
    let oldest = pending.first().map(|mutation| mutation.created_at);
    let mutations: Vec<Mutation> = pending.into_iter().take(limit).collect();

    Ok(PendingReport {
        total,
        shown: mutations.len(),
        oldest,
        mutations,
    })
}

async fn collect_storage(pool: &ConnectionPool, config: &AppConfig) -> Result<StorageReport> {
    let thresholds = StorageThresholds::from_config(&config.storage)
        .context("Invalid storage thresholds")?;
    let estimator = SqliteStorageEstimator::new(pool.get_pool().clone(), config.storage.quota_bytes);
    let estimate = estimator
        .estimate()
        .await
        .context("Failed to estimate storage usage")?;
    let percent_used = estimate.percent_used();
    let status = thresholds.status(percent_used);

    Ok(StorageReport {
        usage_bytes: estimate.usage_bytes,
        quota_bytes: estimate.quota_bytes,
        usage: format_bytes(estimate.usage_bytes),
        quota: format_bytes(estimate.quota_bytes),
        percent_used,
        status,
        accepts_mutations: status.accepts_mutations(),
    })
}

async fn collect_staleness(
    pool: &ConnectionPool,
    config: &AppConfig,
    key: &str,
) -> Result<StaleReport> {
    let cache_key = CacheKey::parse(key).map_err(|err| anyhow::anyhow!("Invalid cache key: {err}"))?;
    let store = SqliteMutationStore::new(pool.get_pool().clone());
    let last_synced_at = store
        .last_synced_at(&cache_key)
        .await
        .with_context(|| format!("Failed to read sync time of {cache_key}"))?;
    let stale = is_stale_after(
        last_synced_at,
        Utc::now(),
        chrono::Duration::hours(config.cache.stale_after_hours),
    );

    Ok(StaleReport {
        cache_key: cache_key.to_string(),
        last_synced_at,
        stale,
    })
}

fn to_json<T: serde::Serialize>(value: &T, pretty: bool) -> Result<String> {
    if pretty {
        Ok(serde_json::to_string_pretty(value)?)
    } else {
        Ok(serde_json::to_string(value)?)
    }
}

fn parse_args<I>(args: I) -> Result<CliOptions>
where
    I: IntoIterator<Item = String>,
{
    let mut command = Command::Pending;
    let mut pretty = false;
    let mut limit = DEFAULT_LIMIT;
    let mut database_url: Option<String> = None;

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "pending" => command = Command::Pending,
            "storage" => command = Command::Storage,
            "stale" => {
                let key = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("stale requires a cache key\n{}", usage()))?;
                command = Command::Stale(key);
            }
            "--pretty" => {
                pretty = true;
            }
            "--limit" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--limit requires a value\n{}", usage()))?;
                limit = parse_limit(&value)?;
            }
            "--database-url" => {
                let value = iter.next().ok_or_else(|| {
                    anyhow::anyhow!("--database-url requires a value\n{}", usage())
                })?;
                database_url = Some(value);
            }
            "-h" | "--help" => {
                println!("{}", usage());
                std::process::exit(0);
            }
            other => {
                bail!("Unknown argument: {other}\n{}", usage());
            }
        }
    }

    Ok(CliOptions {
        command,
        pretty,
        limit,
        database_url,
    })
}

fn parse_limit(value: &str) -> Result<usize> {
    let parsed: usize = value
        .parse()
        .with_context(|| format!("Invalid limit '{value}'. Expected a positive integer."))?;
    if parsed == 0 {
        bail!("--limit must be greater than 0");
    }
    Ok(parsed)
}

fn resolve_database_url(options: &CliOptions, config: &AppConfig) -> String {
    if let Some(url) = &options.database_url {
        return url.clone();
    }
    config.database.url.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn defaults_to_pending_listing() {
        let opts = parse_args(Vec::<String>::new()).unwrap();
        assert_eq!(opts.command, Command::Pending);
        assert_eq!(opts.limit, DEFAULT_LIMIT);
        assert!(!opts.pretty);
        assert!(opts.database_url.is_none());
    }

    #[test]
    fn parses_stale_command_with_options() {
        let opts = parse_args(args(&[
            "stale",
            "batch",
            "--pretty",
            "--database-url",
            "sqlite::memory:",
        ]))
        .unwrap();
        assert_eq!(opts.command, Command::Stale("batch".into()));
        assert!(opts.pretty);
        assert_eq!(opts.database_url.as_deref(), Some("sqlite::memory:"));
    }

    #[test]
    fn stale_without_key_is_rejected() {
        let err = parse_args(args(&["stale"])).unwrap_err();
        assert!(format!("{err}").contains("cache key"));
    }

    #[test]
    fn rejects_zero_limit_and_unknown_flags() {
        let err = parse_args(args(&["--limit", "0"])).unwrap_err();
        assert!(format!("{err}").contains("greater than 0"));
        let err = parse_args(args(&["--verbose"])).unwrap_err();
        assert!(format!("{err}").contains("Unknown argument"));
    }

    #[tokio::test]
    async fn storage_report_reads_the_queue_database() {
        let pool = ConnectionPool::new("sqlite::memory:", 1).await.unwrap();
        pool.migrate().await.unwrap();
        let mut config = AppConfig::default();
        config.storage.quota_bytes = 1024 * 1024 * 1024;

        let report = collect_storage(&pool, &config).await.unwrap();
        assert!(report.usage_bytes > 0);
        assert_eq!(report.quota, "1 GB");
        assert_eq!(report.status, StorageStatus::Ok);
        assert!(report.accepts_mutations);
    }

    #[tokio::test]
    async fn unsynced_key_reports_stale() {
        let pool = ConnectionPool::new("sqlite::memory:", 1).await.unwrap();
        pool.migrate().await.unwrap();

        let report = collect_staleness(&pool, &AppConfig::default(), "batch")
            .await
            .unwrap();
        assert!(report.stale);
        assert!(report.last_synced_at.is_none());
    }
}
