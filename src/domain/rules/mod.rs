pub mod disk;
pub mod memory;
pub mod security;
pub mod services;

use crate::domain::entities::{AlertRequest, HealthSnapshot, PackageUpdate};
use crate::domain::value_objects::ThresholdSet;

/// `source` recorded on every alert raised by threshold evaluation.
pub const ALERT_SOURCE: &str = "system_monitor";

/// A deterministic rule that evaluates a health snapshot and produces alert requests.
/// Rules are pure functions: snapshot + thresholds in, alerts out. No I/O.
pub trait Rule: Send + Sync {
    /// Returns the unique name of this rule
    fn name(&self) -> &'static str;

    /// Evaluates the rule against a snapshot and the last known package updates
    fn evaluate(
        &self,
        snapshot: &HealthSnapshot,
        updates: &[PackageUpdate],
        thresholds: &ThresholdSet,
    ) -> Vec<AlertRequest>;
}

/// Returns the default rules: disk, memory, security updates, failed services
#[must_use]
pub fn default_rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(disk::DiskUsageRule),
        Box::new(memory::MemoryUsageRule),
        Box::new(security::SecurityUpdatesRule),
        Box::new(services::FailedServicesRule),
    ]
}

/// Maps a snapshot to the alerts it warrants.
///
/// Stateless: the same inputs always yield the same alerts, and repeats
/// across ticks are not suppressed.
pub struct ThresholdEvaluator {
    rules: Vec<Box<dyn Rule>>,
}

impl ThresholdEvaluator {
    #[must_use]
    pub fn new(rules: Vec<Box<dyn Rule>>) -> Self {
        Self { rules }
    }

    /// Runs every rule in registration order.
    #[must_use]
    pub fn evaluate(
        &self,
        snapshot: &HealthSnapshot,
        updates: &[PackageUpdate],
        thresholds: &ThresholdSet,
    ) -> Vec<AlertRequest> {
        self.rules
            .iter()
            .flat_map(|rule| rule.evaluate(snapshot, updates, thresholds))
            .collect()
    }
}

impl Default for ThresholdEvaluator {
    fn default() -> Self {
        Self::new(default_rules())
    }
}
