use rusqlite::Connection;

use crate::error::StorageError;

pub const SCHEMA_VERSION: i32 = 1;

pub fn init_schema(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA busy_timeout = 5000;
    ",
    )?;
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at INTEGER NOT NULL
);
INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, unixepoch());

CREATE TABLE IF NOT EXISTS forms (
    slug TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    draft_json TEXT NOT NULL,
    draft_updated_at INTEGER NOT NULL,
    latest_version INTEGER
);

CREATE TABLE IF NOT EXISTS form_versions (
    slug TEXT NOT NULL REFERENCES forms (slug),
    version INTEGER NOT NULL,
    title TEXT NOT NULL,
    schema_json TEXT NOT NULL,
    checksum BLOB NOT NULL CHECK (length(checksum) = 32),
    ddl TEXT NOT NULL,
    published_at INTEGER NOT NULL,
    PRIMARY KEY (slug, version)
);

CREATE TABLE IF NOT EXISTS reports (
    report_id BLOB PRIMARY KEY CHECK (length(report_id) = 16),
    slug TEXT NOT NULL,
    version INTEGER NOT NULL,
    tracking_code TEXT NOT NULL,
    report_date TEXT,
    values_blob BLOB NOT NULL,
    submitted_at INTEGER NOT NULL,
    FOREIGN KEY (slug, version) REFERENCES form_versions (slug, version)
);
CREATE INDEX IF NOT EXISTS idx_reports_form ON reports (slug, version, submitted_at);
";
