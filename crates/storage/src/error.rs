use shiftform_core::{CoreError, SchemaIssue};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("schema has {} issue(s)", .0.len())]
    InvalidSchema(Vec<SchemaIssue>),

    #[error("checksum mismatch for {slug} v{version}")]
    ChecksumMismatch { slug: String, version: u32 },

    #[error("core error: {0}")]
    Core(#[from] CoreError),
}
