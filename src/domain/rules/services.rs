use std::collections::BTreeMap;

use crate::domain::entities::{AlertRequest, HealthSnapshot, PackageUpdate};
use crate::domain::value_objects::{AlertCategory, Severity, ThresholdSet};

use super::{Rule, ALERT_SOURCE};

pub struct FailedServicesRule;

impl Rule for FailedServicesRule {
    fn name(&self) -> &'static str {
        "failed_services"
    }

    fn evaluate(
        &self,
        snapshot: &HealthSnapshot,
        _updates: &[PackageUpdate],
        _thresholds: &ThresholdSet,
    ) -> Vec<AlertRequest> {
        let failed = &snapshot.failed_services;
        if failed.is_empty() {
            return vec![];
        }
        let names = failed.join(", ");

        let mut metadata = BTreeMap::new();
        metadata.insert("failed_count".to_string(), failed.len().to_string());
        metadata.insert("services".to_string(), names.clone());

        vec![AlertRequest {
            severity: Severity::Error,
            category: AlertCategory::Service,
            source: ALERT_SOURCE.to_string(),
            title: "Failed services detected".to_string(),
            message: format!("The following services have failed: {names}"),
            ai_context: format!(
                "{} systemd unit(s) in failed state: {names}. Memory usage: {:.1}%, \
                 disk usage: {:.1}%.",
                failed.len(),
                snapshot.memory_usage_percent,
                snapshot.disk_usage_percent
            ),
            metadata,
        }]
    }
}
