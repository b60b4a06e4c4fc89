use std::sync::Mutex;

use chrono::{Duration, Utc};

use crate::domain::entities::{Alert, AlertFilter, AlertRequest};
use crate::domain::ports::store::{AlertStore, StoreError};
use crate::domain::value_objects::{AlertStatus, Severity};

/// In-memory alert store, used by tests and `daemon --in-memory`.
pub struct InMemoryStore {
    alerts: Mutex<Vec<Alert>>,
}

impl InMemoryStore {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            alerts: Mutex::new(Vec::new()),
        }
    }

    fn read(&self) -> Result<std::sync::MutexGuard<'_, Vec<Alert>>, StoreError> {
        self.alerts
            .lock()
            .map_err(|_| StoreError::ReadFailed("lock poisoned".into()))
    }

    fn write(&self) -> Result<std::sync::MutexGuard<'_, Vec<Alert>>, StoreError> {
        self.alerts
            .lock()
            .map_err(|_| StoreError::WriteFailed("lock poisoned".into()))
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertStore for InMemoryStore {
    fn create(&self, request: &AlertRequest) -> Result<String, StoreError> {
        let id = uuid::Uuid::new_v4().to_string();
        self.write()?.push(Alert::from_request(id.clone(), request));
        Ok(id)
    }

    fn count_active(&self) -> Result<usize, StoreError> {
        Ok(self
            .read()?
            .iter()
            .filter(|a| a.status == AlertStatus::Active)
            .count())
    }

    fn count_by_severity(&self, severity: Severity) -> Result<usize, StoreError> {
        Ok(self
            .read()?
            .iter()
            .filter(|a| a.status == AlertStatus::Active && a.severity == severity)
            .count())
    }

    fn get(&self, id: &str) -> Result<Option<Alert>, StoreError> {
        Ok(self.read()?.iter().find(|a| a.id == id).cloned())
    }

    fn list(&self, filter: &AlertFilter) -> Result<Vec<Alert>, StoreError> {
        Ok(self
            .read()?
            .iter()
            .rev()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect())
    }

    fn acknowledge(&self, id: &str) -> Result<bool, StoreError> {
        let mut alerts = self.write()?;
        let Some(alert) = alerts
            .iter_mut()
            .find(|a| a.id == id && a.status == AlertStatus::Active)
        else {
            return Ok(false);
        };
        alert.status = AlertStatus::Acknowledged;
        alert.acknowledged_at = Some(Utc::now());
        drop(alerts);
        Ok(true)
    }

    fn acknowledge_all(&self) -> Result<usize, StoreError> {
        let now = Utc::now();
        let mut count = 0;
        for alert in self
            .write()?
            .iter_mut()
            .filter(|a| a.status == AlertStatus::Active)
        {
            alert.status = AlertStatus::Acknowledged;
            alert.acknowledged_at = Some(now);
            count += 1;
        }
        Ok(count)
    }

    fn dismiss(&self, id: &str) -> Result<bool, StoreError> {
        let mut alerts = self.write()?;
        let Some(alert) = alerts
            .iter_mut()
            .find(|a| a.id == id && a.status != AlertStatus::Dismissed)
        else {
            return Ok(false);
        };
        alert.status = AlertStatus::Dismissed;
        alert.dismissed_at = Some(Utc::now());
        drop(alerts);
        Ok(true)
    }

    fn dismiss_all(&self) -> Result<usize, StoreError> {
        let now = Utc::now();
        let mut count = 0;
        for alert in self
            .write()?
            .iter_mut()
            .filter(|a| a.status != AlertStatus::Dismissed)
        {
            alert.status = AlertStatus::Dismissed;
            alert.dismissed_at = Some(now);
            count += 1;
        }
        Ok(count)
    }

    fn cleanup_older_than(&self, days: u32) -> Result<usize, StoreError> {
        let cutoff = Utc::now() - Duration::days(i64::from(days));
        let mut alerts = self.write()?;
        let before = alerts.len();
        alerts.retain(|a| a.timestamp >= cutoff);
        Ok(before - alerts.len())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use crate::domain::value_objects::AlertCategory;
    use std::collections::BTreeMap;

    fn request(severity: Severity, title: &str) -> AlertRequest {
        AlertRequest {
            severity,
            category: AlertCategory::Memory,
            source: "test".to_string(),
            title: title.to_string(),
            message: "message".to_string(),
            ai_context: String::new(),
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn create_assigns_unique_ids() {
        let store = InMemoryStore::new();
        let a = store.create(&request(Severity::Warning, "a")).expect("create");
        let b = store.create(&request(Severity::Warning, "b")).expect("create");
        assert_ne!(a, b);
        assert!(uuid::Uuid::parse_str(&a).is_ok());
        assert_eq!(store.get(&a).expect("get").expect("exists").title, "a");
    }

    #[test]
    fn list_is_newest_first() {
        let store = InMemoryStore::new();
        store.create(&request(Severity::Warning, "first")).expect("create");
        store.create(&request(Severity::Warning, "second")).expect("create");
        let alerts = store.list(&AlertFilter::default()).expect("list");
        assert_eq!(alerts[0].title, "second");
        assert_eq!(alerts[1].title, "first");
    }

    #[test]
    fn counts_only_active_alerts() {
        let store = InMemoryStore::new();
        let crit = store.create(&request(Severity::Critical, "c")).expect("create");
        store.create(&request(Severity::Critical, "c2")).expect("create");
        store.create(&request(Severity::Warning, "w")).expect("create");
        assert_eq!(store.count_active().expect("count"), 3);
        assert_eq!(store.count_by_severity(Severity::Critical).expect("count"), 2);

        assert!(store.acknowledge(&crit).expect("ack"));
        assert!(!store.acknowledge(&crit).expect("second ack is a no-op"));
        assert_eq!(store.count_active().expect("count"), 2);
        assert_eq!(store.count_by_severity(Severity::Critical).expect("count"), 1);
    }

    #[test]
    fn dismiss_hides_from_default_listing() {
        let store = InMemoryStore::new();
        let id = store.create(&request(Severity::Info, "x")).expect("create");
        assert!(store.dismiss(&id).expect("dismiss"));
        assert!(store.list(&AlertFilter::default()).expect("list").is_empty());

        let all = store
            .list(&AlertFilter {
                include_dismissed: true,
                ..AlertFilter::default()
            })
            .expect("list");
        assert_eq!(all.len(), 1);
        assert!(all[0].dismissed_at.is_some());
    }

    #[test]
    fn bulk_operations_report_counts() {
        let store = InMemoryStore::new();
        for i in 0..3 {
            store
                .create(&request(Severity::Warning, &format!("w{i}")))
                .expect("create");
        }
        assert_eq!(store.acknowledge_all().expect("ack all"), 3);
        assert_eq!(store.acknowledge_all().expect("ack all"), 0);
        assert_eq!(store.dismiss_all().expect("dismiss all"), 3);
        assert_eq!(store.dismiss_all().expect("dismiss all"), 0);
    }

    #[test]
    fn cleanup_removes_only_expired_alerts() {
        let store = InMemoryStore::new();
        let old = store.create(&request(Severity::Warning, "old")).expect("create");
        let fresh = store.create(&request(Severity::Warning, "fresh")).expect("create");
        store
            .write()
            .expect("lock")
            .iter_mut()
            .filter(|a| a.id == old)
            .for_each(|a| a.timestamp = Utc::now() - Duration::days(31));

        assert_eq!(store.cleanup_older_than(30).expect("cleanup"), 1);
        assert!(store.get(&old).expect("get").is_none());
        assert!(store.get(&fresh).expect("get").is_some());
        assert_eq!(store.cleanup_older_than(30).expect("cleanup"), 0);
    }

    #[test]
    fn unknown_id_is_not_found() {
        let store = InMemoryStore::new();
        assert!(store.get("missing").expect("get").is_none());
        assert!(!store.acknowledge("missing").expect("ack"));
        assert!(!store.dismiss("missing").expect("dismiss"));
    }
}
