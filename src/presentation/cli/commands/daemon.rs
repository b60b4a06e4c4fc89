use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use tokio::sync::Notify;
use tracing::{info, warn};

use crate::application::config::{AppConfig, ConfigManager};
use crate::application::services::{
    AlertEnrichmentPool, EnrichmentSettings, HealthCheckScheduler, SchedulerSettings,
    SnapshotStore,
};
use crate::domain::ports::{AlertStore, EnrichmentBackend, HealthCollector};
use crate::infrastructure::collectors::SystemHealthCollector;
use crate::infrastructure::ipc::RequestDispatcher;
use crate::infrastructure::llm::create_backend;
use crate::infrastructure::persistence::{InMemoryStore, SqliteStore};
use crate::presentation::handlers::{register_all, DaemonContext};

/// A fully wired daemon: store, enrichment pool, scheduler and socket server.
///
/// [`start`](Self::start) and [`stop`](Self::stop) bring the components up
/// and down in dependency order.
pub struct Daemon {
    ctx: Arc<DaemonContext>,
    dispatcher: RequestDispatcher,
}

impl Daemon {
    /// Wire every component from `config`. Nothing runs until [`start`](Self::start).
    #[must_use]
    pub fn build(
        config: Arc<ConfigManager>,
        store: Arc<dyn AlertStore>,
        collector: Arc<dyn HealthCollector>,
        backend: Arc<dyn EnrichmentBackend>,
    ) -> Self {
        let cfg = config.get();
        let liveness = Arc::new(AtomicBool::new(false));

        let pool = Arc::new(AlertEnrichmentPool::new(
            &store,
            backend,
            Arc::clone(&liveness),
            enrichment_settings(&cfg),
        ));
        let scheduler = Arc::new(HealthCheckScheduler::new(
            collector,
            Arc::clone(&store),
            Arc::new(SnapshotStore::new()),
            Arc::clone(&pool),
            liveness,
            scheduler_settings(&cfg),
        ));

        let dispatcher = RequestDispatcher::new(
            cfg.socket_path(),
            cfg.socket_timeout(),
            cfg.rate_limit.max_requests_per_sec,
        );
        let ctx = Arc::new(DaemonContext {
            config,
            store,
            scheduler,
            pool,
            shutdown: Arc::new(Notify::new()),
            started_at: Instant::now(),
        });
        register_all(&dispatcher, &ctx);

        Self { ctx, dispatcher }
    }

    #[must_use]
    pub fn context(&self) -> &Arc<DaemonContext> {
        &self.ctx
    }

    #[must_use]
    pub const fn dispatcher(&self) -> &RequestDispatcher {
        &self.dispatcher
    }

    /// Start the scheduler, then open the socket.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be bound; the scheduler is stopped again.
    pub async fn start(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.dispatcher.socket_path().parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create socket directory {}", parent.display())
            })?;
        }

        self.ctx.scheduler.start();
        if let Err(e) = self.dispatcher.start() {
            self.ctx.scheduler.stop().await;
            self.ctx.pool.shutdown().await;
            return Err(e).with_context(|| {
                format!(
                    "Failed to listen on {}",
                    self.dispatcher.socket_path().display()
                )
            });
        }
        info!(
            socket = %self.dispatcher.socket_path().display(),
            llm = self.ctx.pool.backend_name(),
            "hostwatch daemon started"
        );
        Ok(())
    }

    /// Resolves once a client calls the `shutdown` method.
    pub async fn shutdown_requested(&self) {
        self.ctx.shutdown.notified().await;
    }

    /// Stop accepting requests, stop monitoring, then drain enrichment tasks.
    pub async fn stop(&self) {
        self.dispatcher.stop().await;
        self.ctx.scheduler.stop().await;
        self.ctx.pool.shutdown().await;
        info!("hostwatch daemon stopped");
    }
}

fn enrichment_settings(cfg: &AppConfig) -> EnrichmentSettings {
    EnrichmentSettings {
        max_tokens: cfg.llm.max_tokens,
        temperature: cfg.llm.temperature,
        timeout: Duration::from_secs(cfg.llm.timeout_secs.max(1)),
    }
}

fn scheduler_settings(cfg: &AppConfig) -> SchedulerSettings {
    SchedulerSettings {
        interval: cfg.check_interval(),
        poll_interval: cfg.poll_interval(),
        apt_check_every: cfg.monitoring.apt_check_every,
        disk_path: cfg.monitoring.disk_path.clone(),
        enable_apt: cfg.monitoring.enable_apt,
        enable_services: cfg.monitoring.enable_services,
        retention_days: cfg.database.retention_days,
        cleanup_every: cfg.monitoring.cleanup_every,
        thresholds: cfg.thresholds(),
    }
}

fn open_store(cfg: &AppConfig, in_memory: bool) -> anyhow::Result<Arc<dyn AlertStore>> {
    if in_memory {
        info!("alerts kept in memory only");
        return Ok(Arc::new(InMemoryStore::new()));
    }
    let path = cfg.database_path();
    let store = SqliteStore::open(&path)
        .with_context(|| format!("Failed to open alert database {}", path.display()))?;
    Ok(Arc::new(store))
}

/// Run the daemon until SIGINT, SIGTERM, or a `shutdown` request.
///
/// # Errors
///
/// Returns an error if the alert store cannot be opened or the socket cannot be bound.
pub async fn run_daemon(config: Arc<ConfigManager>, in_memory: bool) -> anyhow::Result<()> {
    let cfg = config.get();
    let store = open_store(&cfg, in_memory)?;
    let backend = create_backend(&cfg.llm);
    if cfg.llm.enabled && !backend.is_configured() {
        warn!(provider = %cfg.llm.provider, "LLM backend not configured, alerts will not be enriched");
    }

    let daemon = Daemon::build(
        config,
        store,
        Arc::new(SystemHealthCollector::new(cfg.command_timeout())),
        backend,
    );
    daemon.start().await?;

    tokio::select! {
        () = daemon.shutdown_requested() => {}
        () = termination_signal() => {}
    }

    daemon.stop().await;
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn termination_signal() {
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("cannot install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!("cannot listen for Ctrl+C: {e}");
                std::future::pending::<()>().await;
            }
            info!("SIGINT received, shutting down");
        }
        () = terminate => info!("SIGTERM received, shutting down"),
    }
}
