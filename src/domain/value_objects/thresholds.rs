use serde::{Deserialize, Serialize};

/// Usage thresholds evaluated after every health check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdSet {
    /// Disk usage percentage that triggers a warning
    pub disk_warning: f64,
    /// Disk usage percentage that triggers a critical alert
    pub disk_critical: f64,
    /// Memory usage percentage that triggers a warning
    pub memory_warning: f64,
    /// Memory usage percentage that triggers a critical alert
    pub memory_critical: f64,
}

impl Default for ThresholdSet {
    fn default() -> Self {
        Self {
            disk_warning: 80.0,
            disk_critical: 95.0,
            memory_warning: 85.0,
            memory_critical: 95.0,
        }
    }
}
