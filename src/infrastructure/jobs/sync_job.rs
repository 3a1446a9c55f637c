use crate::application::services::sync_engine::SyncEngine;
use crate::domain::entities::DrainReport;
use crate::shared::config::SyncConfig;
use crate::shared::error::AppError;
use std::sync::Arc;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

/// Receives the outcome of every background drain cycle.
pub trait DrainEventSink: Send + Sync {
    fn emit_report(&self, report: &DrainReport) -> Result<(), String>;
    fn emit_failure(&self, message: &str) -> Result<(), String>;
}

/// Drains the queue in the background, on demand or whenever connectivity
/// comes back. Runs never overlap.
pub struct SyncJob {
    engine: Arc<SyncEngine>,
    event_sink: Option<Arc<dyn DrainEventSink>>,
    auto_sync: bool,
    gate: Mutex<()>,
}

impl SyncJob {
    pub fn create(engine: Arc<SyncEngine>, config: &SyncConfig) -> Arc<Self> {
        Self::with_sink(engine, None, config)
    }

    pub fn with_sink(
        engine: Arc<SyncEngine>,
        event_sink: Option<Arc<dyn DrainEventSink>>,
        config: &SyncConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            engine,
            event_sink,
            auto_sync: config.auto_sync,
            gate: Mutex::new(()),
        })
    }

    pub fn trigger(self: &Arc<Self>) -> JoinHandle<()> {
        let job = Arc::clone(self);
        tokio::spawn(async move {
            job.run_guarded(None).await;
        })
    }

    /// Drains until nothing is left pending or the retry budget is spent.
    /// Returns the report of the last cycle, or `None` when another drain
    /// was already running.
    pub async fn run_once(&self) -> Result<Option<DrainReport>, AppError> {
        self.drain_until_settled(None).await
    }

    /// Drains every time `online` flips to `true`, and once up front if it
    /// already is. Stops when the sender is dropped. Does nothing when
    /// automatic sync is disabled.
    pub fn watch_connectivity(self: &Arc<Self>, mut online: watch::Receiver<bool>) -> JoinHandle<()> {
        let job = Arc::clone(self);
        tokio::spawn(async move {
            if !job.auto_sync {
                tracing::info!(target: "offline::sync", "automatic sync disabled");
                return;
            }
            loop {
                let is_online = *online.borrow_and_update();
                if is_online {
                    job.run_guarded(Some(online.clone())).await;
                }
                if online.changed().await.is_err() {
                    tracing::debug!(target: "offline::sync", "connectivity feed closed");
                    break;
                }
            }
        })
    }

    async fn run_guarded(&self, online: Option<watch::Receiver<bool>>) {
        let _guard = self.gate.lock().await;
        if let Err(err) = self.drain_until_settled(online).await {
            self.emit_failure(&err.to_string());
        }
    }

    async fn drain_until_settled(
        &self,
        mut online: Option<watch::Receiver<bool>>,
    ) -> Result<Option<DrainReport>, AppError> {
        let retry = self.engine.settings().retry;
        let mut attempt = 0u32;

        loop {
            let report = match self.engine.drain_queue().await {
                Ok(report) => report,
                Err(AppError::DrainInProgress) => {
                    tracing::debug!(target: "offline::sync", "drain already running");
                    return Ok(None);
                }
                Err(err) => return Err(err),
            };
            self.emit_success(&report);

            if report.pending_count() == 0 || attempt >= retry.max_retries() {
                return Ok(Some(report));
            }

            let delay = retry.backoff(attempt);
            attempt += 1;
            tracing::debug!(
                target: "offline::sync",
                attempt,
                delay_ms = delay.as_millis() as u64,
                pending = report.pending_count(),
                "waiting before next drain"
            );

            match online.as_mut() {
                Some(online) => {
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        changed = online.changed() => {
                            if changed.is_err() || !*online.borrow() {
                                tracing::info!(target: "offline::sync", "went offline, drain paused");
                                return Ok(Some(report));
                            }
                        }
                    }
                }
                None => tokio::time::sleep(delay).await,
            }
        }
    }

    fn emit_success(&self, report: &DrainReport) {
        if let Some(sink) = &self.event_sink {
            if let Err(err) = sink.emit_report(report) {
                tracing::warn!(
                    target: "offline::sync",
                    error = %err,
                    "failed to emit drain report"
                );
            }
        }
        tracing::info!(
            target: "offline::sync",
            synced = report.synced_count(),
            failed = report.failed_count(),
            pending = report.pending_count(),
            "background drain completed"
        );
    }

    fn emit_failure(&self, message: &str) {
        if let Some(sink) = &self.event_sink {
            if let Err(err) = sink.emit_failure(message) {
                tracing::warn!(
                    target: "offline::sync",
                    error = %err,
                    "failed to emit drain failure"
                );
            }
        }
        tracing::error!(target: "offline::sync", error = message, "background drain failed");
    }
}
