#![allow(clippy::expect_used)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use hostwatch::application::services::enrichment::ENRICHMENT_SOURCE;
use hostwatch::application::services::{
    AlertEnrichmentPool, EnrichmentSettings, HealthCheckScheduler, SchedulerSettings,
    SnapshotStore,
};
use hostwatch::domain::entities::{
    Alert, AlertFilter, AlertRequest, CpuCounters, DiskStats, MemoryStats, PackageUpdate,
};
use hostwatch::domain::ports::{
    AlertStore, BackendError, CollectionError, EnrichmentBackend, HealthCollector, StoreError,
};
use hostwatch::domain::value_objects::{AlertCategory, Severity};
use hostwatch::infrastructure::llm::noop::NoopBackend;
use hostwatch::infrastructure::persistence::in_memory_store::InMemoryStore;

/// Backend whose calls block until the test releases permits.
struct GatedBackend {
    gate: Semaphore,
    calls: AtomicUsize,
    reply: Result<&'static str, &'static str>,
}

impl GatedBackend {
    fn open(reply: Result<&'static str, &'static str>) -> Self {
        Self {
            gate: Semaphore::new(Semaphore::MAX_PERMITS),
            calls: AtomicUsize::new(0),
            reply,
        }
    }

    fn closed() -> Self {
        Self {
            gate: Semaphore::new(0),
            calls: AtomicUsize::new(0),
            reply: Ok("Remove old journal files with journalctl --vacuum-size."),
        }
    }
}

#[async_trait]
impl EnrichmentBackend for GatedBackend {
    fn name(&self) -> &str {
        "gated"
    }

    fn is_configured(&self) -> bool {
        true
    }

    async fn generate(
        &self,
        _prompt: &str,
        _max_tokens: u32,
        _temperature: f32,
    ) -> Result<String, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| BackendError::ServiceUnavailable("gate closed".into()))?;
        match self.reply {
            Ok(text) => Ok(text.to_string()),
            Err(msg) => Err(BackendError::ServiceUnavailable(msg.to_string())),
        }
    }
}

/// In-memory store that counts writes.
struct CountingStore {
    inner: InMemoryStore,
    creates: Arc<AtomicUsize>,
}

impl AlertStore for CountingStore {
    fn create(&self, request: &AlertRequest) -> Result<String, StoreError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.inner.create(request)
    }
    fn count_active(&self) -> Result<usize, StoreError> {
        self.inner.count_active()
    }
    fn count_by_severity(&self, severity: Severity) -> Result<usize, StoreError> {
        self.inner.count_by_severity(severity)
    }
    fn get(&self, id: &str) -> Result<Option<Alert>, StoreError> {
        self.inner.get(id)
    }
    fn list(&self, filter: &AlertFilter) -> Result<Vec<Alert>, StoreError> {
        self.inner.list(filter)
    }
    fn acknowledge(&self, id: &str) -> Result<bool, StoreError> {
        self.inner.acknowledge(id)
    }
    fn acknowledge_all(&self) -> Result<usize, StoreError> {
        self.inner.acknowledge_all()
    }
    fn dismiss(&self, id: &str) -> Result<bool, StoreError> {
        self.inner.dismiss(id)
    }
    fn dismiss_all(&self) -> Result<usize, StoreError> {
        self.inner.dismiss_all()
    }
    fn cleanup_older_than(&self, days: u32) -> Result<usize, StoreError> {
        self.inner.cleanup_older_than(days)
    }
}

struct FullDiskCollector;

#[async_trait]
impl HealthCollector for FullDiskCollector {
    fn cpu_counters(&self) -> Result<CpuCounters, CollectionError> {
        Ok(CpuCounters::default())
    }

    fn memory_stats(&self) -> Result<MemoryStats, CollectionError> {
        Ok(MemoryStats {
            used_mb: 1000.0,
            total_mb: 8000.0,
        })
    }

    fn disk_stats(&self, _path: &str) -> Result<DiskStats, CollectionError> {
        Ok(DiskStats {
            used_gb: 97.0,
            total_gb: 100.0,
        })
    }

    async fn pending_updates(&self) -> Result<Vec<PackageUpdate>, CollectionError> {
        Ok(Vec::new())
    }
}

fn disk_alert() -> AlertRequest {
    AlertRequest {
        severity: Severity::Critical,
        category: AlertCategory::Disk,
        source: "system_monitor".into(),
        title: "Critical disk usage".into(),
        message: "Disk usage is 97.0%".into(),
        ai_context: "Disk usage is 97.0% (97.0 GB of 100.0 GB used).".into(),
        metadata: BTreeMap::new(),
    }
}

fn ai_alerts(store: &dyn AlertStore) -> Vec<Alert> {
    store
        .list(&AlertFilter::default())
        .expect("list")
        .into_iter()
        .filter(|a| a.source == ENRICHMENT_SOURCE)
        .collect()
}

async fn wait_until(deadline: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

struct Stack {
    store: Arc<dyn AlertStore>,
    pool: Arc<AlertEnrichmentPool>,
    scheduler: HealthCheckScheduler,
}

fn stack(backend: Arc<dyn EnrichmentBackend>) -> Stack {
    let store: Arc<dyn AlertStore> = Arc::new(InMemoryStore::new());
    let liveness = Arc::new(AtomicBool::new(false));
    let pool = Arc::new(AlertEnrichmentPool::new(
        &store,
        backend,
        Arc::clone(&liveness),
        EnrichmentSettings {
            timeout: Duration::from_secs(5),
            ..EnrichmentSettings::default()
        },
    ));
    let scheduler = HealthCheckScheduler::new(
        Arc::new(FullDiskCollector),
        Arc::clone(&store),
        Arc::new(SnapshotStore::new()),
        Arc::clone(&pool),
        liveness,
        SchedulerSettings {
            interval: Duration::from_secs(3600),
            poll_interval: Duration::from_millis(10),
            enable_apt: false,
            ..SchedulerSettings::default()
        },
    );
    Stack {
        store,
        pool,
        scheduler,
    }
}

#[tokio::test]
async fn breach_produces_linked_ai_analysis() {
    let stack = stack(Arc::new(GatedBackend::open(Ok(
        "Clear the apt cache and rotate logs.",
    ))));
    stack.scheduler.start();

    assert!(
        wait_until(Duration::from_secs(3), || !ai_alerts(stack.store.as_ref()).is_empty()).await,
        "AI analysis never stored"
    );
    stack.scheduler.stop().await;
    stack.pool.shutdown().await;

    let parent = stack
        .store
        .list(&AlertFilter {
            severity: Some(Severity::Critical),
            ..AlertFilter::default()
        })
        .expect("list")
        .pop()
        .expect("critical disk alert");
    let analysis = ai_alerts(stack.store.as_ref()).pop().expect("analysis");

    assert_eq!(analysis.severity, Severity::Info);
    assert_eq!(analysis.category, AlertCategory::Disk);
    assert_eq!(analysis.title, "AI analysis: Critical disk usage");
    assert_eq!(analysis.message, "Clear the apt cache and rotate logs.");
    assert_eq!(analysis.metadata.get("parent_alert_id"), Some(&parent.id));
    assert_eq!(
        analysis.metadata.get("ai_enhanced").map(String::as_str),
        Some("true")
    );
}

#[tokio::test]
async fn backend_failure_is_recorded_as_unavailable() {
    let stack = stack(Arc::new(GatedBackend::open(Err("connection refused"))));
    stack.scheduler.start();

    assert!(
        wait_until(Duration::from_secs(3), || !ai_alerts(stack.store.as_ref()).is_empty()).await
    );
    stack.scheduler.stop().await;
    stack.pool.shutdown().await;

    let analysis = ai_alerts(stack.store.as_ref()).pop().expect("analysis");
    assert_eq!(analysis.title, "AI analysis unavailable: Critical disk usage");
    assert!(analysis.message.contains("Analysis failed"));
    assert!(analysis.message.contains("connection refused"));
    assert_eq!(
        analysis.metadata.get("ai_enhanced").map(String::as_str),
        Some("false")
    );
}

#[tokio::test]
async fn results_arriving_after_stop_are_discarded() {
    let backend = Arc::new(GatedBackend::closed());
    let stack = stack(Arc::clone(&backend) as Arc<dyn EnrichmentBackend>);
    stack.scheduler.start();

    assert!(
        wait_until(Duration::from_secs(3), || backend.calls.load(Ordering::SeqCst) > 0).await,
        "enrichment never reached the backend"
    );
    stack.scheduler.stop().await;

    backend.gate.add_permits(16);
    stack.pool.shutdown().await;

    assert_eq!(stack.pool.pending(), 0);
    assert!(ai_alerts(stack.store.as_ref()).is_empty());
    // The primary alert itself was stored synchronously
    assert_eq!(
        stack
            .store
            .count_by_severity(Severity::Critical)
            .expect("count"),
        1
    );
}

#[tokio::test]
async fn tasks_never_revive_a_dropped_store() {
    let creates = Arc::new(AtomicUsize::new(0));
    let store: Arc<dyn AlertStore> = Arc::new(CountingStore {
        inner: InMemoryStore::new(),
        creates: Arc::clone(&creates),
    });
    let weak = Arc::downgrade(&store);
    let backend = Arc::new(GatedBackend::closed());
    let liveness = Arc::new(AtomicBool::new(true));
    let pool = AlertEnrichmentPool::new(
        &store,
        Arc::clone(&backend) as Arc<dyn EnrichmentBackend>,
        liveness,
        EnrichmentSettings::default(),
    );

    pool.submit(&disk_alert()).expect("submit");
    assert!(wait_until(Duration::from_secs(3), || backend.calls.load(Ordering::SeqCst) == 1).await);

    drop(store);
    assert!(weak.upgrade().is_none(), "pool must not keep the store alive");

    backend.gate.add_permits(1);
    pool.shutdown().await;

    assert_eq!(creates.load(Ordering::SeqCst), 1);
    assert!(matches!(
        pool.submit(&disk_alert()),
        Err(StoreError::Unavailable)
    ));
}

#[tokio::test]
async fn unconfigured_backend_only_stores_primary_alerts() {
    let stack = stack(Arc::new(NoopBackend::new()));
    stack.scheduler.start();

    assert!(
        wait_until(Duration::from_secs(3), || {
            stack.store.count_active().expect("count") == 1
        })
        .await
    );
    assert_eq!(stack.pool.pending(), 0);
    stack.scheduler.stop().await;
    stack.pool.shutdown().await;
    assert!(ai_alerts(stack.store.as_ref()).is_empty());
}

#[tokio::test]
async fn shutdown_refuses_new_enrichment() {
    let store: Arc<dyn AlertStore> = Arc::new(InMemoryStore::new());
    let backend = Arc::new(GatedBackend::open(Ok("text")));
    let pool = AlertEnrichmentPool::new(
        &store,
        Arc::clone(&backend) as Arc<dyn EnrichmentBackend>,
        Arc::new(AtomicBool::new(true)),
        EnrichmentSettings::default(),
    );

    pool.shutdown().await;
    let id = pool.submit(&disk_alert()).expect("alert still stored");
    assert!(store.get(&id).expect("get").is_some());
    assert_eq!(pool.pending(), 0);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
}
