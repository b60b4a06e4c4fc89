use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{AlertCategory, AlertStatus, Severity};

/// Alert produced by threshold evaluation, not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertRequest {
    pub severity: Severity,
    pub category: AlertCategory,
    pub source: String,
    pub title: String,
    pub message: String,
    /// Summary of the triggering numbers, used only to prompt the enrichment backend.
    pub ai_context: String,
    pub metadata: BTreeMap<String, String>,
}

/// Persisted alert as stored and returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub severity: Severity,
    pub category: AlertCategory,
    pub source: String,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,
    pub status: AlertStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acknowledged_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dismissed_at: Option<DateTime<Utc>>,
}

impl Alert {
    /// Build a fresh active alert from a request.
    #[must_use]
    pub fn from_request(id: String, request: &AlertRequest) -> Self {
        Self {
            id,
            severity: request.severity,
            category: request.category,
            source: request.source.clone(),
            title: request.title.clone(),
            message: request.message.clone(),
            metadata: request.metadata.clone(),
            timestamp: Utc::now(),
            status: AlertStatus::Active,
            acknowledged_at: None,
            dismissed_at: None,
        }
    }
}

/// Query filter for listing alerts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertFilter {
    pub severity: Option<Severity>,
    pub category: Option<AlertCategory>,
    pub status: Option<AlertStatus>,
    pub include_dismissed: bool,
}

impl AlertFilter {
    #[must_use]
    pub fn matches(&self, alert: &Alert) -> bool {
        if !self.include_dismissed
            && alert.status == AlertStatus::Dismissed
            && self.status != Some(AlertStatus::Dismissed)
        {
            return false;
        }
        self.severity.is_none_or(|s| s == alert.severity)
            && self.category.is_none_or(|c| c == alert.category)
            && self.status.is_none_or(|s| s == alert.status)
    }
}
