use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{Connection, OptionalExtension};

use shiftform_core::{ReportId, SchemaModel, Snapshot, validation::validate_schema};

use crate::ddl::synthesize;
use crate::error::StorageError;
use crate::traits::{FormDraft, FormStore, FormSummary, FormVersion, ReportRecord};

/// Convert Vec<u8> to fixed-size array with proper error handling.
fn to_array<const N: usize>(v: Vec<u8>, label: &str) -> Result<[u8; N], StorageError> {
    v.try_into()
        .map_err(|_| StorageError::Serialization(format!("invalid {label} length")))
}

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as i64)
}

fn is_constraint(err: &rusqlite::Error) -> bool {
    matches!(err, rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation)
}

pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    pub fn open(path: &str) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }
}

type VersionRow = (String, u32, String, String, Vec<u8>, String, i64);

fn read_version(row: VersionRow) -> Result<FormVersion, StorageError> {
    let (slug, version, title, schema_json, checksum, ddl, published_at) = row;
    let checksum = to_array::<32>(checksum, "checksum")?;
    if *blake3::hash(schema_json.as_bytes()).as_bytes() != checksum {
        return Err(StorageError::ChecksumMismatch { slug, version });
    }
    Ok(FormVersion {
        schema: SchemaModel::from_json(&schema_json)?,
        slug,
        version,
        title,
        checksum,
        ddl,
        published_at,
    })
}

type ReportRow = (Vec<u8>, String, u32, String, Option<String>, Vec<u8>, i64);

fn read_report(row: ReportRow) -> Result<ReportRecord, StorageError> {
    let (report_id, slug, version, tracking_code, report_date, values_blob, submitted_at) = row;
    let values: Snapshot =
        rmp_serde::from_slice(&values_blob).map_err(|e| StorageError::Serialization(e.to_string()))?;
    Ok(ReportRecord {
        report_id: ReportId::from_bytes(to_array::<16>(report_id, "report_id")?),
        slug,
        version,
        tracking_code,
        report_date,
        values,
        submitted_at,
    })
}

const VERSION_COLUMNS: &str = "slug, version, title, schema_json, checksum, ddl, published_at";
const REPORT_COLUMNS: &str = "report_id, slug, version, tracking_code, report_date, values_blob, submitted_at";

fn version_row(row: &rusqlite::Row) -> rusqlite::Result<VersionRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

fn report_row(row: &rusqlite::Row) -> rusqlite::Result<ReportRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

impl FormStore for SqliteStorage {
    fn save_draft(&mut self, slug: &str, title: &str, schema: &SchemaModel) -> Result<(), StorageError> {
        let json = schema.to_json()?;
        self.conn.execute(
            "INSERT INTO forms (slug, title, draft_json, draft_updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(slug) DO UPDATE SET title = excluded.title, draft_json = excluded.draft_json,
                 draft_updated_at = excluded.draft_updated_at",
            rusqlite::params![slug, title, json, now_ms()],
        )?;
        tracing::debug!(slug, fields = schema.fields.len(), "draft saved");
        Ok(())
    }

    fn load_draft(&self, slug: &str) -> Result<Option<FormDraft>, StorageError> {
        let row = self
            .conn
            .query_row(
                "SELECT title, draft_json, draft_updated_at FROM forms WHERE slug = ?1",
                rusqlite::params![slug],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, i64>(2)?)),
            )
            .optional()?;
        match row {
            Some((title, json, updated_at)) => Ok(Some(FormDraft {
                slug: slug.to_string(),
                title,
                schema: SchemaModel::from_json(&json)?,
                updated_at,
            })),
            None => Ok(None),
        }
    }

    fn publish(&mut self, slug: &str) -> Result<FormVersion, StorageError> {
        let tx = self.conn.transaction()?;

        let (title, schema_json, latest): (String, String, Option<u32>) = tx
            .query_row(
                "SELECT title, draft_json, latest_version FROM forms WHERE slug = ?1",
                rusqlite::params![slug],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?
            .ok_or_else(|| StorageError::NotFound(format!("form {slug}")))?;

        let schema = SchemaModel::from_json(&schema_json)?;
        let issues = validate_schema(&schema);
        if !issues.is_empty() {
            tracing::warn!(slug, issues = issues.len(), "publish refused");
            return Err(StorageError::InvalidSchema(issues));
        }

        let version = latest.unwrap_or(0) + 1;
        let checksum = *blake3::hash(schema_json.as_bytes()).as_bytes();
        let ddl = synthesize(slug, &title, &schema.fields).to_sql();
        let published_at = now_ms();

        tx.execute(
            "INSERT INTO form_versions (slug, version, title, schema_json, checksum, ddl, published_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![slug, version, title, schema_json, &checksum[..], ddl, published_at],
        )?;
        tx.execute(
            "UPDATE forms SET latest_version = ?1 WHERE slug = ?2",
            rusqlite::params![version, slug],
        )?;
        tx.commit()?;

        tracing::info!(slug, version, "form published");
        Ok(FormVersion {
            slug: slug.to_string(),
            version,
            title,
            schema,
            checksum,
            ddl,
            published_at,
        })
    }

    fn load_version(&self, slug: &str, version: u32) -> Result<Option<FormVersion>, StorageError> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {VERSION_COLUMNS} FROM form_versions WHERE slug = ?1 AND version = ?2"),
                rusqlite::params![slug, version],
                version_row,
            )
            .optional()?;
        row.map(read_version).transpose()
    }

    fn latest_version(&self, slug: &str) -> Result<Option<FormVersion>, StorageError> {
        let row = self
            .conn
            .query_row(
                &format!(
                    "SELECT {VERSION_COLUMNS} FROM form_versions WHERE slug = ?1 ORDER BY version DESC LIMIT 1"
                ),
                rusqlite::params![slug],
                version_row,
            )
            .optional()?;
        row.map(read_version).transpose()
    }

    fn list_forms(&self) -> Result<Vec<FormSummary>, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT slug, title, latest_version, draft_updated_at FROM forms ORDER BY slug")?;
        let forms = stmt
            .query_map([], |row| {
                Ok(FormSummary {
                    slug: row.get(0)?,
                    title: row.get(1)?,
                    latest_version: row.get(2)?,
                    draft_updated_at: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(forms)
    }

    fn insert_report(&mut self, record: &ReportRecord) -> Result<(), StorageError> {
        let values_blob =
            rmp_serde::to_vec_named(&record.values).map_err(|e| StorageError::Serialization(e.to_string()))?;
        let result = self.conn.execute(
            &format!("INSERT INTO reports ({REPORT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
            rusqlite::params![
                record.report_id.as_bytes().as_slice(),
                record.slug,
                record.version,
                record.tracking_code,
                record.report_date,
                values_blob,
                record.submitted_at,
            ],
        );
        match result {
            Ok(_) => {
                tracing::info!(
                    report = %record.report_id,
                    slug = %record.slug,
                    version = record.version,
                    "report stored"
                );
                Ok(())
            }
            Err(e) if is_constraint(&e) => Err(StorageError::ConstraintViolation(format!(
                "report {} for {} v{}",
                record.report_id, record.slug, record.version
            ))),
            Err(e) => Err(StorageError::Sqlite(e)),
        }
    }

    fn get_report(&self, report_id: ReportId) -> Result<Option<ReportRecord>, StorageError> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {REPORT_COLUMNS} FROM reports WHERE report_id = ?1"),
                rusqlite::params![report_id.as_bytes().as_slice()],
                report_row,
            )
            .optional()?;
        row.map(read_report).transpose()
    }

    fn reports_for_form(&self, slug: &str) -> Result<Vec<ReportRecord>, StorageError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {REPORT_COLUMNS} FROM reports WHERE slug = ?1 ORDER BY submitted_at, report_id"
        ))?;
        let rows = stmt
            .query_map(rusqlite::params![slug], report_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(read_report).collect()
    }
}
