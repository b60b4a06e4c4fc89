#![allow(clippy::expect_used)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use hostwatch::application::services::{
    AlertEnrichmentPool, EnrichmentSettings, HealthCheckScheduler, SchedulerSettings,
    SnapshotStore,
};
use hostwatch::domain::entities::{
    AlertFilter, CpuCounters, DiskStats, MemoryStats, PackageUpdate,
};
use hostwatch::domain::ports::{AlertStore, CollectionError, HealthCollector};
use hostwatch::domain::value_objects::{AlertCategory, Severity, ThresholdSet};
use hostwatch::infrastructure::llm::noop::NoopBackend;
use hostwatch::infrastructure::persistence::in_memory_store::InMemoryStore;

/// Collector with fixed readings and call counters.
struct CountingCollector {
    cpu_calls: AtomicUsize,
    memory_calls: AtomicUsize,
    apt_calls: AtomicUsize,
    disk_used_gb: f64,
    fail_disk: AtomicBool,
}

impl CountingCollector {
    fn new(disk_used_gb: f64) -> Self {
        Self {
            cpu_calls: AtomicUsize::new(0),
            memory_calls: AtomicUsize::new(0),
            apt_calls: AtomicUsize::new(0),
            disk_used_gb,
            fail_disk: AtomicBool::new(false),
        }
    }

    fn checks(&self) -> usize {
        self.memory_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HealthCollector for CountingCollector {
    fn cpu_counters(&self) -> Result<CpuCounters, CollectionError> {
        let n = self.cpu_calls.fetch_add(1, Ordering::SeqCst) as u64;
        Ok(CpuCounters {
            user: n * 10,
            nice: 0,
            system: 0,
            idle: n * 90,
            iowait: 0,
        })
    }

    fn memory_stats(&self) -> Result<MemoryStats, CollectionError> {
        self.memory_calls.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryStats {
            used_mb: 1024.0,
            total_mb: 8192.0,
        })
    }

    fn disk_stats(&self, _path: &str) -> Result<DiskStats, CollectionError> {
        if self.fail_disk.load(Ordering::SeqCst) {
            return Err(CollectionError::MetricsUnavailable("statvfs".into()));
        }
        Ok(DiskStats {
            used_gb: self.disk_used_gb,
            total_gb: 100.0,
        })
    }

    async fn pending_updates(&self) -> Result<Vec<PackageUpdate>, CollectionError> {
        self.apt_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Vec::new())
    }
}

fn build(
    collector: &Arc<CountingCollector>,
    settings: SchedulerSettings,
) -> (HealthCheckScheduler, Arc<dyn AlertStore>) {
    let store: Arc<dyn AlertStore> = Arc::new(InMemoryStore::new());
    let liveness = Arc::new(AtomicBool::new(false));
    let pool = Arc::new(AlertEnrichmentPool::new(
        &store,
        Arc::new(NoopBackend::new()),
        Arc::clone(&liveness),
        EnrichmentSettings::default(),
    ));
    let scheduler = HealthCheckScheduler::new(
        Arc::clone(collector) as Arc<dyn HealthCollector>,
        Arc::clone(&store),
        Arc::new(SnapshotStore::new()),
        pool,
        liveness,
        settings,
    );
    (scheduler, store)
}

fn fast_settings(interval: Duration) -> SchedulerSettings {
    SchedulerSettings {
        interval,
        poll_interval: Duration::from_millis(10),
        enable_apt: false,
        ..SchedulerSettings::default()
    }
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

#[tokio::test]
async fn runs_checks_on_the_configured_interval() {
    let collector = Arc::new(CountingCollector::new(20.0));
    let (scheduler, _store) = build(&collector, fast_settings(Duration::from_millis(50)));

    scheduler.start();
    assert!(
        wait_until(Duration::from_secs(3), || collector.checks() >= 3).await,
        "expected periodic checks, got {}",
        collector.checks()
    );
    scheduler.stop().await;

    let after_stop = collector.checks();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(collector.checks(), after_stop, "no checks after stop");
}

#[tokio::test]
async fn trigger_check_runs_before_the_interval() {
    let collector = Arc::new(CountingCollector::new(20.0));
    let (scheduler, _store) = build(&collector, fast_settings(Duration::from_secs(3600)));

    scheduler.start();
    assert!(wait_until(Duration::from_secs(2), || collector.checks() == 1).await);

    scheduler.trigger_check();
    scheduler.trigger_check();
    assert!(wait_until(Duration::from_secs(2), || collector.checks() == 2).await);

    // Coalesced: two triggers, one extra check
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(collector.checks(), 2);
    scheduler.stop().await;
}

#[tokio::test]
async fn stop_wakes_a_sleeping_worker() {
    let collector = Arc::new(CountingCollector::new(20.0));
    let settings = SchedulerSettings {
        interval: Duration::from_secs(3600),
        poll_interval: Duration::from_secs(60),
        enable_apt: false,
        ..SchedulerSettings::default()
    };
    let (scheduler, _store) = build(&collector, settings);

    scheduler.start();
    assert!(wait_until(Duration::from_secs(2), || collector.checks() == 1).await);

    let started = Instant::now();
    scheduler.stop().await;
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(!scheduler.is_running());

    // Restart after stop works
    scheduler.start();
    assert!(scheduler.is_running());
    scheduler.stop().await;
}

#[tokio::test]
async fn package_updates_collected_every_nth_check() {
    let collector = Arc::new(CountingCollector::new(20.0));
    let settings = SchedulerSettings {
        apt_check_every: 3,
        enable_apt: true,
        ..SchedulerSettings::default()
    };
    let (scheduler, _store) = build(&collector, settings);

    for _ in 0..7 {
        scheduler.force_check().await;
    }
    // Checks 0, 3 and 6
    assert_eq!(collector.apt_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn concurrent_force_checks_are_serialized() {
    let collector = Arc::new(CountingCollector::new(20.0));
    let (scheduler, _store) = build(&collector, fast_settings(Duration::from_secs(3600)));
    let scheduler = Arc::new(scheduler);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let scheduler = Arc::clone(&scheduler);
        handles.push(tokio::spawn(async move { scheduler.force_check().await }));
    }
    for handle in handles {
        let snapshot = handle.await.expect("join");
        assert!((snapshot.memory_usage_percent - 12.5).abs() < 1e-9);
        assert!((0.0..=100.0).contains(&snapshot.cpu_usage_percent));
    }

    assert_eq!(collector.checks(), 8);
    // Only the first check needed the bootstrap double sample
    assert_eq!(collector.cpu_calls.load(Ordering::SeqCst), 9);
}

#[tokio::test]
async fn failed_collector_keeps_previous_reading() {
    let collector = Arc::new(CountingCollector::new(55.0));
    let (scheduler, _store) = build(&collector, fast_settings(Duration::from_secs(3600)));

    let first = scheduler.force_check().await;
    assert!((first.disk_usage_percent - 55.0).abs() < 1e-9);

    collector.fail_disk.store(true, Ordering::SeqCst);
    let second = scheduler.force_check().await;
    assert!((second.disk_usage_percent - 55.0).abs() < 1e-9);
    assert!(second.timestamp >= first.timestamp);
}

#[tokio::test]
async fn new_thresholds_apply_to_the_next_check() {
    let collector = Arc::new(CountingCollector::new(55.0));
    let (scheduler, store) = build(&collector, fast_settings(Duration::from_secs(3600)));

    scheduler.force_check().await;
    assert_eq!(store.count_active().expect("count"), 0);

    scheduler.set_thresholds(ThresholdSet {
        disk_warning: 50.0,
        disk_critical: 90.0,
        ..ThresholdSet::default()
    });
    let snapshot = scheduler.force_check().await;

    let alerts = store.list(&AlertFilter::default()).expect("list");
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].severity, Severity::Warning);
    assert_eq!(alerts[0].category, AlertCategory::Disk);
    // Counts in the snapshot are taken before this tick's alerts are stored
    assert_eq!(snapshot.active_alerts, 0);
    assert_eq!(scheduler.snapshot().active_alerts, 0);
}

#[tokio::test]
async fn each_tick_raises_alerts_again() {
    let collector = Arc::new(CountingCollector::new(97.0));
    let (scheduler, store) = build(&collector, fast_settings(Duration::from_secs(3600)));

    scheduler.force_check().await;
    let second = scheduler.force_check().await;

    assert_eq!(store.count_by_severity(Severity::Critical).expect("count"), 2);
    assert_eq!(second.critical_alerts, 1);
}
