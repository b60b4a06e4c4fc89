use thiserror::Error;

use crate::domain::entities::{Alert, AlertFilter, AlertRequest};
use crate::domain::value_objects::Severity;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage read failed: {0}")]
    ReadFailed(String),
    #[error("storage write failed: {0}")]
    WriteFailed(String),
    #[error("entry not found: {0}")]
    NotFound(String),
    #[error("alert store is no longer available")]
    Unavailable,
}

/// Durable alert storage.
///
/// Implementations must tolerate concurrent calls from the scheduler, the
/// request handlers and background enrichment tasks.
pub trait AlertStore: Send + Sync {
    /// Persist a new active alert and return its id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the write operation fails.
    fn create(&self, request: &AlertRequest) -> Result<String, StoreError>;

    /// Number of alerts that are neither acknowledged nor dismissed.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the read operation fails.
    fn count_active(&self) -> Result<usize, StoreError>;

    /// Number of active alerts with the given severity.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the read operation fails.
    fn count_by_severity(&self, severity: Severity) -> Result<usize, StoreError>;

    /// Fetch one alert by id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the read operation fails.
    fn get(&self, id: &str) -> Result<Option<Alert>, StoreError>;

    /// List alerts matching `filter`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the read operation fails.
    fn list(&self, filter: &AlertFilter) -> Result<Vec<Alert>, StoreError>;

    /// Mark an active alert acknowledged. Returns `false` if no active alert has this id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the write operation fails.
    fn acknowledge(&self, id: &str) -> Result<bool, StoreError>;

    /// Acknowledge every active alert, returning how many changed.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the write operation fails.
    fn acknowledge_all(&self) -> Result<usize, StoreError>;

    /// Dismiss an alert that is not already dismissed.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the write operation fails.
    fn dismiss(&self, id: &str) -> Result<bool, StoreError>;

    /// Dismiss every active or acknowledged alert, returning how many changed.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the write operation fails.
    fn dismiss_all(&self) -> Result<usize, StoreError>;

    /// Delete alerts created more than `days` days ago, whatever their
    /// status, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the write operation fails.
    fn cleanup_older_than(&self, days: u32) -> Result<usize, StoreError>;
}
