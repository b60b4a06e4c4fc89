use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::{CpuCounters, DiskStats, MemoryStats, PackageUpdate};

#[derive(Error, Debug)]
pub enum CollectionError {
    #[error("failed to collect system metrics: {0}")]
    MetricsUnavailable(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("timeout while collecting data")]
    Timeout,
}

/// Source of raw host metrics sampled by the scheduler.
///
/// The metric readers are cheap and synchronous. Package and service
/// queries shell out and are async so adapters can bound them with a timeout.
#[async_trait]
pub trait HealthCollector: Send + Sync {
    /// Read the cumulative CPU counters.
    ///
    /// # Errors
    ///
    /// Returns `CollectionError` if the counters cannot be read or parsed.
    fn cpu_counters(&self) -> Result<CpuCounters, CollectionError>;

    /// Read current memory usage.
    ///
    /// # Errors
    ///
    /// Returns `CollectionError` if memory statistics are unavailable.
    fn memory_stats(&self) -> Result<MemoryStats, CollectionError>;

    /// Read usage of the filesystem containing `path`.
    ///
    /// # Errors
    ///
    /// Returns `CollectionError` if no filesystem matches `path`.
    fn disk_stats(&self, path: &str) -> Result<DiskStats, CollectionError>;

    /// List packages with pending upgrades. May be slow.
    ///
    /// # Errors
    ///
    /// Returns `CollectionError` if the package manager cannot be queried.
    async fn pending_updates(&self) -> Result<Vec<PackageUpdate>, CollectionError>;

    /// Names of units the service manager reports as failed.
    ///
    /// # Errors
    ///
    /// Returns `CollectionError` if the service manager cannot be queried.
    async fn failed_services(&self) -> Result<Vec<String>, CollectionError> {
        Ok(Vec::new())
    }
}
