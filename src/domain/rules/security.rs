use std::collections::BTreeMap;
use std::fmt::Write;

use crate::domain::entities::{AlertRequest, HealthSnapshot, PackageUpdate};
use crate::domain::value_objects::{AlertCategory, Severity, ThresholdSet};

use super::{Rule, ALERT_SOURCE};

/// Number of package names spelled out in the alert message.
const MAX_LISTED: usize = 5;

pub struct SecurityUpdatesRule;

impl Rule for SecurityUpdatesRule {
    fn name(&self) -> &'static str {
        "security_updates"
    }

    fn evaluate(
        &self,
        snapshot: &HealthSnapshot,
        updates: &[PackageUpdate],
        _thresholds: &ThresholdSet,
    ) -> Vec<AlertRequest> {
        let count = snapshot.security_updates;
        if count == 0 {
            return vec![];
        }

        let names: Vec<&str> = updates
            .iter()
            .filter(|u| u.is_security)
            .take(MAX_LISTED)
            .map(|u| u.name.as_str())
            .collect();

        let mut message = format!("{count} security update(s) pending");
        if !names.is_empty() {
            let _ = write!(message, ": {}", names.join(", "));
        }
        let remaining = count.saturating_sub(names.len());
        if remaining > 0 && !names.is_empty() {
            let _ = write!(message, " and {remaining} more");
        }

        let mut metadata = BTreeMap::new();
        metadata.insert("security_updates".to_string(), count.to_string());
        metadata.insert(
            "pending_updates".to_string(),
            snapshot.pending_updates.to_string(),
        );

        vec![AlertRequest {
            severity: Severity::Warning,
            category: AlertCategory::Apt,
            source: ALERT_SOURCE.to_string(),
            title: "Security updates available".to_string(),
            ai_context: format!(
                "{count} security updates pending out of {} total package updates. \
                 Packages: {}.",
                snapshot.pending_updates,
                if names.is_empty() {
                    "unknown".to_string()
                } else {
                    names.join(", ")
                }
            ),
            message,
            metadata,
        }]
    }
}
