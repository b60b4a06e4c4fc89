use rusqlite::Connection;

/// Initialize the database schema, creating tables if they don't exist.
///
/// # Errors
/// Returns `rusqlite::Error` if any SQL statement fails.
pub fn initialize_schema(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS alerts (
            seq             INTEGER PRIMARY KEY AUTOINCREMENT,
            id              TEXT    NOT NULL UNIQUE,
            created_at      TEXT    NOT NULL,
            severity        TEXT    NOT NULL,
            category        TEXT    NOT NULL,
            source          TEXT    NOT NULL,
            title           TEXT    NOT NULL,
            message         TEXT    NOT NULL,
            metadata        TEXT    NOT NULL,
            status          TEXT    NOT NULL DEFAULT 'active',
            acknowledged_at TEXT,
            dismissed_at    TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_alerts_status ON alerts(status);
        CREATE INDEX IF NOT EXISTS idx_alerts_severity ON alerts(severity, status);
        CREATE INDEX IF NOT EXISTS idx_alerts_created_at ON alerts(created_at);",
    )?;
    Ok(())
}
