use std::collections::BTreeMap;

use crate::domain::entities::{AlertRequest, HealthSnapshot, PackageUpdate};
use crate::domain::value_objects::{AlertCategory, Severity, ThresholdSet};

use super::{Rule, ALERT_SOURCE};

pub struct DiskUsageRule;

impl Rule for DiskUsageRule {
    fn name(&self) -> &'static str {
        "disk_usage"
    }

    fn evaluate(
        &self,
        snapshot: &HealthSnapshot,
        _updates: &[PackageUpdate],
        thresholds: &ThresholdSet,
    ) -> Vec<AlertRequest> {
        let usage = snapshot.disk_usage_percent;
        let (severity, title, limit) = if usage >= thresholds.disk_critical {
            (Severity::Critical, "Critical disk usage", thresholds.disk_critical)
        } else if usage >= thresholds.disk_warning {
            (Severity::Warning, "High disk usage", thresholds.disk_warning)
        } else {
            return vec![];
        };

        let free_gb = (snapshot.disk_total_gb - snapshot.disk_used_gb).max(0.0);
        let mut metadata = BTreeMap::new();
        metadata.insert("usage_percent".to_string(), format!("{usage:.1}"));
        metadata.insert("threshold".to_string(), format!("{limit:.0}"));
        metadata.insert("used_gb".to_string(), format!("{:.1}", snapshot.disk_used_gb));
        metadata.insert("total_gb".to_string(), format!("{:.1}", snapshot.disk_total_gb));

        vec![AlertRequest {
            severity,
            category: AlertCategory::Disk,
            source: ALERT_SOURCE.to_string(),
            title: title.to_string(),
            message: format!(
                "Disk usage is at {usage:.1}% ({:.1} GB used of {:.1} GB)",
                snapshot.disk_used_gb, snapshot.disk_total_gb
            ),
            ai_context: format!(
                "Disk usage: {usage:.1}% (threshold {limit:.0}%). Used: {:.1} GB, \
                 free: {free_gb:.1} GB, total: {:.1} GB.",
                snapshot.disk_used_gb, snapshot.disk_total_gb
            ),
            metadata,
        }]
    }
}
