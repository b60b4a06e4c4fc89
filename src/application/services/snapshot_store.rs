use std::sync::{Mutex, PoisonError};

use crate::domain::entities::HealthSnapshot;

/// Holder of the most recently published health snapshot.
///
/// Readers always receive a copy, so a snapshot is never observed half-written.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    latest: Mutex<HealthSnapshot>,
}

impl SnapshotStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, snapshot: HealthSnapshot) {
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = snapshot;
    }

    #[must_use]
    pub fn latest(&self) -> HealthSnapshot {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn starts_with_zeroed_snapshot() {
        let store = SnapshotStore::new();
        let snap = store.latest();
        assert!(snap.cpu_usage_percent.abs() < f64::EPSILON);
        assert_eq!(snap.pending_updates, 0);
    }

    #[test]
    fn publish_replaces_latest() {
        let store = SnapshotStore::new();
        store.publish(HealthSnapshot {
            disk_usage_percent: 42.0,
            ..HealthSnapshot::default()
        });
        assert!((store.latest().disk_usage_percent - 42.0).abs() < f64::EPSILON);
    }

    #[test]
    fn readers_see_whole_snapshots() {
        let store = Arc::new(SnapshotStore::new());
        let writer = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for i in 0..500_u32 {
                    let v = f64::from(i % 100);
                    store.publish(HealthSnapshot {
                        cpu_usage_percent: v,
                        memory_usage_percent: v,
                        disk_usage_percent: v,
                        ..HealthSnapshot::default()
                    });
                }
            })
        };
        for _ in 0..500 {
            let snap = store.latest();
            assert!((snap.cpu_usage_percent - snap.memory_usage_percent).abs() < f64::EPSILON);
            assert!((snap.cpu_usage_percent - snap.disk_usage_percent).abs() < f64::EPSILON);
        }
        writer.join().expect("writer thread");
    }
}
