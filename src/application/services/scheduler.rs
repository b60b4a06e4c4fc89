use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::enrichment::AlertEnrichmentPool;
use super::snapshot_store::SnapshotStore;
use crate::domain::entities::{clamp_percent, CpuCounters, HealthSnapshot, PackageUpdate};
use crate::domain::ports::{AlertStore, CollectionError, HealthCollector};
use crate::domain::rules::ThresholdEvaluator;
use crate::domain::value_objects::{Severity, ThresholdSet};

/// Delay between the two samples taken when no previous CPU counters exist.
const CPU_BOOTSTRAP_DELAY: Duration = Duration::from_millis(100);

/// Static knobs of the monitoring loop.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerSettings {
    pub interval: Duration,
    pub poll_interval: Duration,
    /// Package updates are collected on every Nth check, starting with the first.
    pub apt_check_every: u32,
    pub disk_path: String,
    pub enable_apt: bool,
    pub enable_services: bool,
    /// Alerts older than this are purged; 0 disables retention.
    pub retention_days: u32,
    /// Retention runs on every Nth check, starting with the first.
    pub cleanup_every: u32,
    pub thresholds: ThresholdSet,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            poll_interval: Duration::from_secs(1),
            apt_check_every: 5,
            disk_path: "/".to_string(),
            enable_apt: true,
            enable_services: true,
            retention_days: 30,
            cleanup_every: 12,
            thresholds: ThresholdSet::default(),
        }
    }
}

/// State only touched while a check runs.
#[derive(Default)]
struct CheckState {
    prev_cpu: Option<CpuCounters>,
    cycle: u64,
}

struct SchedulerInner {
    collector: Arc<dyn HealthCollector>,
    store: Arc<dyn AlertStore>,
    snapshots: Arc<SnapshotStore>,
    pool: Arc<AlertEnrichmentPool>,
    evaluator: ThresholdEvaluator,
    liveness: Arc<AtomicBool>,
    check_requested: AtomicBool,
    interval_ms: AtomicU64,
    poll_interval: Duration,
    apt_check_every: u64,
    disk_path: String,
    enable_apt: bool,
    enable_services: bool,
    retention_days: u32,
    cleanup_every: u64,
    thresholds: RwLock<ThresholdSet>,
    check_lock: tokio::sync::Mutex<CheckState>,
    updates: Mutex<Vec<PackageUpdate>>,
}

/// Stop signal owned by one worker run.
#[derive(Default)]
struct Halt {
    requested: AtomicBool,
    notify: Notify,
}

impl Halt {
    fn request(&self) {
        self.requested.store(true, Ordering::Release);
        self.notify.notify_one();
    }

    fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }
}

struct Worker {
    halt: Arc<Halt>,
    handle: JoinHandle<()>,
}

/// Runs health checks periodically and on demand.
///
/// One worker task wakes every poll interval and runs a check when the
/// configured interval has elapsed or a check was requested. Checks are
/// serialized, so a forced check and the worker never interleave.
pub struct HealthCheckScheduler {
    inner: Arc<SchedulerInner>,
    worker: Mutex<Option<Worker>>,
}

impl HealthCheckScheduler {
    /// `liveness` is shared with the enrichment pool; the scheduler sets it
    /// while running and clears it on stop.
    #[must_use]
    pub fn new(
        collector: Arc<dyn HealthCollector>,
        store: Arc<dyn AlertStore>,
        snapshots: Arc<SnapshotStore>,
        pool: Arc<AlertEnrichmentPool>,
        liveness: Arc<AtomicBool>,
        settings: SchedulerSettings,
    ) -> Self {
        let interval_ms = u64::try_from(settings.interval.as_millis()).unwrap_or(u64::MAX);
        Self {
            inner: Arc::new(SchedulerInner {
                collector,
                store,
                snapshots,
                pool,
                evaluator: ThresholdEvaluator::default(),
                liveness,
                check_requested: AtomicBool::new(false),
                interval_ms: AtomicU64::new(interval_ms),
                poll_interval: settings.poll_interval,
                apt_check_every: u64::from(settings.apt_check_every.max(1)),
                disk_path: settings.disk_path,
                enable_apt: settings.enable_apt,
                enable_services: settings.enable_services,
                retention_days: settings.retention_days,
                cleanup_every: u64::from(settings.cleanup_every.max(1)),
                thresholds: RwLock::new(settings.thresholds),
                check_lock: tokio::sync::Mutex::new(CheckState::default()),
                updates: Mutex::new(Vec::new()),
            }),
            worker: Mutex::new(None),
        }
    }

    /// Spawns the worker. Calling it while already running does nothing.
    pub fn start(&self) {
        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        if worker.is_some() {
            return;
        }
        self.inner.liveness.store(true, Ordering::Release);
        let halt = Arc::new(Halt::default());
        let handle = tokio::spawn(run_loop(Arc::clone(&self.inner), Arc::clone(&halt)));
        *worker = Some(Worker { halt, handle });
        drop(worker);
        info!(
            interval_secs = self.interval().as_secs(),
            "health check scheduler started"
        );
    }

    /// Clears the liveness flag and waits for the worker to exit.
    ///
    /// The worker is detached and told to halt under the same lock `start`
    /// takes, so a concurrent `start` always spawns a fresh worker.
    pub async fn stop(&self) {
        let mut slot = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        self.inner.liveness.store(false, Ordering::Release);
        let worker = slot.take();
        if let Some(worker) = &worker {
            worker.halt.request();
        }
        drop(slot);

        let Some(worker) = worker else {
            return;
        };
        if let Err(e) = worker.handle.await {
            warn!(error = %e, "health check worker ended abnormally");
        }
        info!("health check scheduler stopped");
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.liveness.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn liveness(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.inner.liveness)
    }

    /// Asks the worker to run a check on its next poll. Repeated calls coalesce.
    pub fn trigger_check(&self) {
        self.inner.check_requested.store(true, Ordering::Release);
    }

    /// Runs a check right away on the caller's task and returns its snapshot.
    pub async fn force_check(&self) -> HealthSnapshot {
        self.inner.run_check().await
    }

    #[must_use]
    pub fn snapshot(&self) -> HealthSnapshot {
        self.inner.snapshots.latest()
    }

    #[must_use]
    pub fn pending_updates(&self) -> Vec<PackageUpdate> {
        self.inner
            .updates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.inner.interval()
    }

    pub fn set_interval(&self, interval: Duration) {
        let ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self.inner.interval_ms.store(ms.max(1), Ordering::Release);
    }

    pub fn set_thresholds(&self, thresholds: ThresholdSet) {
        *self
            .inner
            .thresholds
            .write()
            .unwrap_or_else(PoisonError::into_inner) = thresholds;
    }
}

async fn run_loop(inner: Arc<SchedulerInner>, halt: Arc<Halt>) {
    let mut last_check: Option<Instant> = None;

    while !halt.is_requested() {
        let due = last_check.is_none_or(|at| at.elapsed() >= inner.interval());
        let requested = inner.check_requested.swap(false, Ordering::AcqRel);
        if due || requested {
            if requested {
                debug!("running requested health check");
            }
            inner.run_check().await;
            last_check = Some(Instant::now());
        }

        tokio::select! {
            () = tokio::time::sleep(inner.poll_interval) => {}
            () = halt.notify.notified() => {}
        }
    }
}

impl SchedulerInner {
    fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.load(Ordering::Acquire))
    }

    fn thresholds(&self) -> ThresholdSet {
        self.thresholds
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// One tick: collect, publish, evaluate, submit. Collector failures keep the previous values.
    async fn run_check(&self) -> HealthSnapshot {
        let mut state = self.check_lock.lock().await;
        let mut snapshot = HealthSnapshot {
            timestamp: Utc::now(),
            ..self.snapshots.latest()
        };

        match self.sample_cpu(&mut state).await {
            Ok(usage) => snapshot.cpu_usage_percent = usage,
            Err(e) => warn!(error = %e, "cpu collection failed"),
        }

        match self.collector.memory_stats() {
            Ok(mem) => {
                snapshot.memory_usage_percent = mem.usage_percent();
                snapshot.memory_used_mb = mem.used_mb;
                snapshot.memory_total_mb = mem.total_mb;
            }
            Err(e) => warn!(error = %e, "memory collection failed"),
        }

        match self.collector.disk_stats(&self.disk_path) {
            Ok(disk) => {
                snapshot.disk_usage_percent = disk.usage_percent();
                snapshot.disk_used_gb = disk.used_gb;
                snapshot.disk_total_gb = disk.total_gb;
            }
            Err(e) => warn!(error = %e, path = %self.disk_path, "disk collection failed"),
        }

        if self.enable_apt && state.cycle % self.apt_check_every == 0 {
            self.collect_updates(&mut snapshot).await;
        }
        if self.enable_services {
            self.collect_failed_services(&mut snapshot).await;
        }
        if self.retention_days > 0 && state.cycle % self.cleanup_every == 0 {
            self.purge_expired_alerts();
        }
        state.cycle += 1;

        match self.store.count_active() {
            Ok(n) => snapshot.active_alerts = n,
            Err(e) => warn!(error = %e, "failed to count active alerts"),
        }
        match self.store.count_by_severity(Severity::Critical) {
            Ok(n) => snapshot.critical_alerts = n,
            Err(e) => warn!(error = %e, "failed to count critical alerts"),
        }

        snapshot.cpu_usage_percent = clamp_percent(snapshot.cpu_usage_percent);
        self.snapshots.publish(snapshot.clone());
        debug!(
            cpu = snapshot.cpu_usage_percent,
            memory = snapshot.memory_usage_percent,
            disk = snapshot.disk_usage_percent,
            "health snapshot published"
        );

        let updates = self
            .updates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let requests = self
            .evaluator
            .evaluate(&snapshot, &updates, &self.thresholds());
        for request in &requests {
            match self.pool.submit(request) {
                Ok(id) => info!(alert_id = %id, severity = %request.severity, title = %request.title, "alert raised"),
                Err(e) => warn!(error = %e, title = %request.title, "failed to store alert"),
            }
        }
        drop(state);

        snapshot
    }

    async fn sample_cpu(&self, state: &mut CheckState) -> Result<f64, CollectionError> {
        let mut current = self.collector.cpu_counters()?;
        let previous = if let Some(prev) = state.prev_cpu {
            prev
        } else {
            tokio::time::sleep(CPU_BOOTSTRAP_DELAY).await;
            let first = current;
            current = self.collector.cpu_counters()?;
            first
        };
        state.prev_cpu = Some(current);
        Ok(current.usage_since(&previous))
    }

    async fn collect_updates(&self, snapshot: &mut HealthSnapshot) {
        let collector = Arc::clone(&self.collector);
        match tokio::spawn(async move { collector.pending_updates().await }).await {
            Ok(Ok(updates)) => {
                snapshot.pending_updates = updates.len();
                snapshot.security_updates = updates.iter().filter(|u| u.is_security).count();
                *self.updates.lock().unwrap_or_else(PoisonError::into_inner) = updates;
            }
            Ok(Err(e)) => warn!(error = %e, "package update collection failed"),
            Err(e) => warn!(error = %e, "package update collector panicked"),
        }
    }

    async fn collect_failed_services(&self, snapshot: &mut HealthSnapshot) {
        let collector = Arc::clone(&self.collector);
        match tokio::spawn(async move { collector.failed_services().await }).await {
            Ok(Ok(failed)) => snapshot.failed_services = failed,
            Ok(Err(e)) => warn!(error = %e, "service collection failed"),
            Err(e) => warn!(error = %e, "service collector panicked"),
        }
    }

    fn purge_expired_alerts(&self) {
        match self.store.cleanup_older_than(self.retention_days) {
            Ok(0) => {}
            Ok(removed) => info!(
                removed,
                retention_days = self.retention_days,
                "expired alerts purged"
            ),
            Err(e) => warn!(error = %e, "alert retention cleanup failed"),
        }
    }
}
