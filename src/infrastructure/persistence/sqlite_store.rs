use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use crate::domain::entities::{Alert, AlertFilter, AlertRequest};
use crate::domain::ports::store::{AlertStore, StoreError};
use crate::domain::value_objects::{AlertStatus, Severity};

use super::migrations;

const ALERT_COLUMNS: &str = "id, created_at, severity, category, source, title, message, \
                             metadata, status, acknowledged_at, dismissed_at";

/// SQLite-backed persistent alert store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`.
    ///
    /// Creates parent directories, sets WAL mode and pragmas, and initializes schema.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::WriteFailed` if the database cannot be opened or initialized.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        }

        let conn = Connection::open(path).map_err(|e| StoreError::WriteFailed(e.to_string()))?;

        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        conn.pragma_update(None, "synchronous", "NORMAL")
            .map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        conn.pragma_update(None, "busy_timeout", 5000)
            .map_err(|e| StoreError::WriteFailed(e.to_string()))?;

        Self::from_connection(conn)
    }

    /// A private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::WriteFailed` if the schema cannot be created.
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn =
            Connection::open_in_memory().map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        migrations::initialize_schema(&conn).map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock_read(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::ReadFailed("lock poisoned".into()))
    }

    fn lock_write(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::WriteFailed("lock poisoned".into()))
    }

    fn count(&self, sql: &str, args: &[&str]) -> Result<usize, StoreError> {
        let conn = self.lock_read()?;
        let count: i64 = conn
            .query_row(sql, params_from_iter(args.iter()), |row| row.get(0))
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;
        drop(conn);
        usize::try_from(count).map_err(|e| StoreError::ReadFailed(e.to_string()))
    }

    fn update(&self, sql: &str, args: &[&str]) -> Result<usize, StoreError> {
        let conn = self.lock_write()?;
        let changed = conn
            .execute(sql, params_from_iter(args.iter()))
            .map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        drop(conn);
        Ok(changed)
    }
}

fn conversion_error(
    index: usize,
    err: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, Type::Text, err.into())
}

fn parse_time(index: usize, raw: &str) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(index, e))
}

fn parse_alert_row(row: &rusqlite::Row<'_>) -> Result<Alert, rusqlite::Error> {
    let created_at: String = row.get(1)?;
    let severity: String = row.get(2)?;
    let category: String = row.get(3)?;
    let metadata: String = row.get(7)?;
    let status: String = row.get(8)?;
    let acknowledged_at: Option<String> = row.get(9)?;
    let dismissed_at: Option<String> = row.get(10)?;

    Ok(Alert {
        id: row.get(0)?,
        timestamp: parse_time(1, &created_at)?,
        severity: severity.parse().map_err(|e: String| conversion_error(2, e))?,
        category: category.parse().map_err(|e: String| conversion_error(3, e))?,
        source: row.get(4)?,
        title: row.get(5)?,
        message: row.get(6)?,
        metadata: serde_json::from_str::<BTreeMap<String, String>>(&metadata)
            .map_err(|e| conversion_error(7, e))?,
        status: status.parse().map_err(|e: String| conversion_error(8, e))?,
        acknowledged_at: acknowledged_at
            .as_deref()
            .map(|raw| parse_time(9, raw))
            .transpose()?,
        dismissed_at: dismissed_at
            .as_deref()
            .map(|raw| parse_time(10, raw))
            .transpose()?,
    })
}

impl AlertStore for SqliteStore {
    fn create(&self, request: &AlertRequest) -> Result<String, StoreError> {
        let alert = Alert::from_request(uuid::Uuid::new_v4().to_string(), request);
        let metadata = serde_json::to_string(&alert.metadata)
            .map_err(|e| StoreError::WriteFailed(e.to_string()))?;

        let conn = self.lock_write()?;
        conn.execute(
            "INSERT INTO alerts (id, created_at, severity, category, source, title, message, \
             metadata, status) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                alert.id,
                alert.timestamp.to_rfc3339(),
                alert.severity.as_str(),
                alert.category.as_str(),
                alert.source,
                alert.title,
                alert.message,
                metadata,
                alert.status.as_str(),
            ],
        )
        .map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        drop(conn);

        Ok(alert.id)
    }

    fn count_active(&self) -> Result<usize, StoreError> {
        self.count(
            "SELECT COUNT(*) FROM alerts WHERE status = ?1",
            &[AlertStatus::Active.as_str()],
        )
    }

    fn count_by_severity(&self, severity: Severity) -> Result<usize, StoreError> {
        self.count(
            "SELECT COUNT(*) FROM alerts WHERE status = ?1 AND severity = ?2",
            &[AlertStatus::Active.as_str(), severity.as_str()],
        )
    }

    fn get(&self, id: &str) -> Result<Option<Alert>, StoreError> {
        let conn = self.lock_read()?;
        let alert = conn
            .query_row(
                &format!("SELECT {ALERT_COLUMNS} FROM alerts WHERE id = ?1"),
                params![id],
                parse_alert_row,
            )
            .optional()
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;
        drop(conn);
        Ok(alert)
    }

    fn list(&self, filter: &AlertFilter) -> Result<Vec<Alert>, StoreError> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut args: Vec<&str> = Vec::new();
        if let Some(severity) = filter.severity {
            clauses.push("severity = ?");
            args.push(severity.as_str());
        }
        if let Some(category) = filter.category {
            clauses.push("category = ?");
            args.push(category.as_str());
        }
        if let Some(status) = filter.status {
            clauses.push("status = ?");
            args.push(status.as_str());
        } else if !filter.include_dismissed {
            clauses.push("status != 'dismissed'");
        }

        let mut sql = format!("SELECT {ALERT_COLUMNS} FROM alerts");
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY seq DESC");

        let conn = self.lock_read()?;
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;
        let alerts = stmt
            .query_map(params_from_iter(args.iter()), parse_alert_row)
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;

        drop(stmt);
        drop(conn);
        Ok(alerts)
    }

    fn acknowledge(&self, id: &str) -> Result<bool, StoreError> {
        let now = Utc::now().to_rfc3339();
        let changed = self.update(
            "UPDATE alerts SET status = 'acknowledged', acknowledged_at = ?1 \
             WHERE id = ?2 AND status = 'active'",
            &[now.as_str(), id],
        )?;
        Ok(changed > 0)
    }

    fn acknowledge_all(&self) -> Result<usize, StoreError> {
        let now = Utc::now().to_rfc3339();
        self.update(
            "UPDATE alerts SET status = 'acknowledged', acknowledged_at = ?1 \
             WHERE status = 'active'",
            &[now.as_str()],
        )
    }

    fn dismiss(&self, id: &str) -> Result<bool, StoreError> {
        let now = Utc::now().to_rfc3339();
        let changed = self.update(
            "UPDATE alerts SET status = 'dismissed', dismissed_at = ?1 \
             WHERE id = ?2 AND status != 'dismissed'",
            &[now.as_str(), id],
        )?;
        Ok(changed > 0)
    }

    fn dismiss_all(&self) -> Result<usize, StoreError> {
        let now = Utc::now().to_rfc3339();
        self.update(
            "UPDATE alerts SET status = 'dismissed', dismissed_at = ?1 \
             WHERE status != 'dismissed'",
            &[now.as_str()],
        )
    }

    // `created_at` is always written by `to_rfc3339` in UTC, so text order is time order.
    fn cleanup_older_than(&self, days: u32) -> Result<usize, StoreError> {
        let cutoff = (Utc::now() - Duration::days(i64::from(days))).to_rfc3339();
        self.update(
            "DELETE FROM alerts WHERE created_at < ?1",
            &[cutoff.as_str()],
        )
    }
}
