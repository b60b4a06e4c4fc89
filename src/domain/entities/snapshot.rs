use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One consistent sample of system health.
///
/// Published once per scheduler tick and handed out by value; every
/// percentage is kept inside `[0, 100]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub timestamp: DateTime<Utc>,
    pub cpu_usage_percent: f64,
    pub memory_usage_percent: f64,
    pub memory_used_mb: f64,
    pub memory_total_mb: f64,
    pub disk_usage_percent: f64,
    pub disk_used_gb: f64,
    pub disk_total_gb: f64,
    pub pending_updates: usize,
    pub security_updates: usize,
    /// systemd units currently in the `failed` state.
    #[serde(default)]
    pub failed_services: Vec<String>,
    pub active_alerts: usize,
    pub critical_alerts: usize,
}

impl Default for HealthSnapshot {
    fn default() -> Self {
        Self {
            timestamp: Utc::now(),
            cpu_usage_percent: 0.0,
            memory_usage_percent: 0.0,
            memory_used_mb: 0.0,
            memory_total_mb: 0.0,
            disk_usage_percent: 0.0,
            disk_used_gb: 0.0,
            disk_total_gb: 0.0,
            pending_updates: 0,
            security_updates: 0,
            failed_services: Vec::new(),
            active_alerts: 0,
            critical_alerts: 0,
        }
    }
}

/// Clamp a computed percentage into `[0, 100]`, mapping NaN to zero.
#[must_use]
pub fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

/// Cumulative CPU time counters as exposed by the kernel (first line of `/proc/stat`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuCounters {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
}

impl CpuCounters {
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.user + self.nice + self.system + self.idle + self.iowait
    }

    #[must_use]
    pub const fn used(&self) -> u64 {
        self.user + self.nice + self.system
    }

    /// Usage between `previous` and `self`, in percent.
    ///
    /// Returns `0.0` when the total did not advance (or went backwards after
    /// a counter reset).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn usage_since(&self, previous: &Self) -> f64 {
        let total_delta = self.total().saturating_sub(previous.total());
        if total_delta == 0 {
            return 0.0;
        }
        let used_delta = self.used().saturating_sub(previous.used());
        clamp_percent(used_delta as f64 / total_delta as f64 * 100.0)
    }
}

/// Memory usage in megabytes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub used_mb: f64,
    pub total_mb: f64,
}

impl MemoryStats {
    #[must_use]
    pub fn usage_percent(&self) -> f64 {
        if self.total_mb > 0.0 {
            clamp_percent(self.used_mb / self.total_mb * 100.0)
        } else {
            0.0
        }
    }
}

/// Disk usage of one filesystem in gigabytes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiskStats {
    pub used_gb: f64,
    pub total_gb: f64,
}

impl DiskStats {
    #[must_use]
    pub fn usage_percent(&self) -> f64 {
        if self.total_gb > 0.0 {
            clamp_percent(self.used_gb / self.total_gb * 100.0)
        } else {
            0.0
        }
    }
}
