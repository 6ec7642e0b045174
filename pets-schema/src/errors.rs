use mongodb::error::{ErrorKind, WriteFailure};
use thiserror::Error;

/// Server code for a unique index violation.
pub const DUPLICATE_KEY_CODE: i32 = 11000;

/// Server code for a write rejected by a collection validator.
pub const DOCUMENT_VALIDATION_FAILURE_CODE: i32 = 121;

/// Top-level error type returned by the schema library.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Underlying MongoDB command failed.
    #[error("mongodb error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    /// A document did not satisfy a collection declaration.
    #[error("validation failed")]
    Validation(#[from] ValidationError),

    /// Configuration could not be loaded or expanded.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// A migration name did not match any declared migration.
    #[error("unknown migration '{name}'")]
    UnknownMigration { name: String },

    /// A collection name did not match any declared collection.
    #[error("unknown collection '{name}'")]
    UnknownCollection { name: String },

    /// An existing collection or index has the declared name but different options.
    #[error("{object} on '{collection}' does not match its declaration: {detail}")]
    Conflict {
        collection: String,
        object: String,
        detail: String,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SchemaError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }
}

/// Collection of validation issues found in a single document.
#[derive(Debug, Error)]
#[error("validation errors: {issues:?}")]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationError {
    pub fn new<I>(issues: I) -> Self
    where
        I: IntoIterator<Item = ValidationIssue>,
    {
        Self {
            issues: issues.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Returns true if any issue was reported for `field` with `code`.
    pub fn has(&self, field: &str, code: &str) -> bool {
        self.issues.iter().any(|issue| issue.field == field && issue.code == code)
    }
}

/// Detailed validation failure for a single field.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub field: String,
    pub code: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(field: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            code: code.into(),
            message: message.into(),
        }
    }
}

pub type ValidationResult<T> = Result<T, ValidationError>;

/// Extracts the numeric server code from a write or command failure.
pub fn server_code(err: &mongodb::error::Error) -> Option<i32> {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => Some(e.code),
        ErrorKind::Command(e) => Some(e.code),
        _ => None,
    }
}

/// Returns true if the server rejected a write because of a unique index.
pub fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    server_code(err) == Some(DUPLICATE_KEY_CODE)
}

/// Returns true if the server rejected a write because of the collection validator.
pub fn is_document_validation_failure(err: &mongodb::error::Error) -> bool {
    server_code(err) == Some(DOCUMENT_VALIDATION_FAILURE_CODE)
}
