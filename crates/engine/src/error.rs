use shiftform_core::{CoreError, SchemaIssue, ValueIssue};
use shiftform_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("invalid config: {0}")]
    Config(String),

    #[error("schema has {} issue(s): {}", .0.len(), join(.0))]
    InvalidSchema(Vec<SchemaIssue>),

    #[error("report has {} issue(s): {}", .0.len(), join(.0))]
    InvalidReport(Vec<ValueIssue>),

    #[error("form not found: {0}")]
    FormNotFound(String),

    #[error("report already submitted")]
    AlreadySubmitted,
}

fn join<T: std::fmt::Display>(items: &[T]) -> String {
    items.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}
