use std::collections::BTreeMap;

use crate::domain::entities::{AlertRequest, HealthSnapshot, PackageUpdate};
use crate::domain::value_objects::{AlertCategory, Severity, ThresholdSet};

use super::{Rule, ALERT_SOURCE};

pub struct MemoryUsageRule;

impl Rule for MemoryUsageRule {
    fn name(&self) -> &'static str {
        "memory_usage"
    }

    fn evaluate(
        &self,
        snapshot: &HealthSnapshot,
        _updates: &[PackageUpdate],
        thresholds: &ThresholdSet,
    ) -> Vec<AlertRequest> {
        let usage = snapshot.memory_usage_percent;
        let (severity, title, limit) = if usage >= thresholds.memory_critical {
            (Severity::Critical, "Critical memory usage", thresholds.memory_critical)
        } else if usage >= thresholds.memory_warning {
            (Severity::Warning, "High memory usage", thresholds.memory_warning)
        } else {
            return vec![];
        };

        let mut metadata = BTreeMap::new();
        metadata.insert("usage_percent".to_string(), format!("{usage:.1}"));
        metadata.insert("threshold".to_string(), format!("{limit:.0}"));
        metadata.insert("used_mb".to_string(), format!("{:.0}", snapshot.memory_used_mb));
        metadata.insert("total_mb".to_string(), format!("{:.0}", snapshot.memory_total_mb));

        vec![AlertRequest {
            severity,
            category: AlertCategory::Memory,
            source: ALERT_SOURCE.to_string(),
            title: title.to_string(),
            message: format!(
                "Memory usage is at {usage:.1}% ({:.0} MB used of {:.0} MB)",
                snapshot.memory_used_mb, snapshot.memory_total_mb
            ),
            ai_context: format!(
                "Memory usage: {usage:.1}% (threshold {limit:.0}%). Used: {:.0} MB, \
                 total: {:.0} MB. CPU usage: {:.1}%.",
                snapshot.memory_used_mb, snapshot.memory_total_mb, snapshot.cpu_usage_percent
            ),
            metadata,
        }]
    }
}
