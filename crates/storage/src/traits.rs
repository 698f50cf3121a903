use shiftform_core::{ReportId, SchemaModel, Snapshot};

use crate::error::StorageError;

/// The editable working copy of a form.
#[derive(Debug, Clone, PartialEq)]
pub struct FormDraft {
    pub slug: String,
    pub title: String,
    pub schema: SchemaModel,
    pub updated_at: i64,
}

/// A frozen, published form. Reports always reference one of these.
#[derive(Debug, Clone, PartialEq)]
pub struct FormVersion {
    pub slug: String,
    pub version: u32,
    pub title: String,
    pub schema: SchemaModel,
    /// blake3 of the stored schema JSON.
    pub checksum: [u8; 32],
    pub ddl: String,
    pub published_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormSummary {
    pub slug: String,
    pub title: String,
    pub latest_version: Option<u32>,
    pub draft_updated_at: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportRecord {
    pub report_id: ReportId,
    pub slug: String,
    pub version: u32,
    pub tracking_code: String,
    pub report_date: Option<String>,
    pub values: Snapshot,
    pub submitted_at: i64,
}

/// Persistence for form drafts, published versions and submitted reports.
pub trait FormStore {
    /// Creates or overwrites the draft of `slug`.
    fn save_draft(&mut self, slug: &str, title: &str, schema: &SchemaModel) -> Result<(), StorageError>;

    fn load_draft(&self, slug: &str) -> Result<Option<FormDraft>, StorageError>;

    /// Freezes the current draft as the next version. Fails with
    /// `InvalidSchema` if the draft does not validate.
    fn publish(&mut self, slug: &str) -> Result<FormVersion, StorageError>;

    fn load_version(&self, slug: &str, version: u32) -> Result<Option<FormVersion>, StorageError>;

    fn latest_version(&self, slug: &str) -> Result<Option<FormVersion>, StorageError>;

    fn list_forms(&self) -> Result<Vec<FormSummary>, StorageError>;

    /// Stores a submitted report. Reports are write-once.
    fn insert_report(&mut self, record: &ReportRecord) -> Result<(), StorageError>;

    fn get_report(&self, report_id: ReportId) -> Result<Option<ReportRecord>, StorageError>;

    /// Reports of every version of `slug`, oldest first.
    fn reports_for_form(&self, slug: &str) -> Result<Vec<ReportRecord>, StorageError>;
}
