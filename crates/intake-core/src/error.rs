//! Error types for the intake workflow

use thiserror::Error;

/// Message shown when a submission carries no answers at all
pub const EMPTY_SUBMISSION_MESSAGE: &str = "内容不能都为空";

/// A single file upload that failed inside a batch
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Upload of '{file_name}' for field '{field_id}' failed: {reason}")]
pub struct UploadError {
    pub field_id: String,
    pub file_name: String,
    pub reason: String,
}

/// Validation problem attached to one field
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field_id}: required")]
    Required { field_id: String },

    #[error("{field_id}: at most {max} characters allowed")]
    TooLong { field_id: String, max: usize },

    #[error("{field_id}: '{value}' is not an allowed option")]
    UnknownOption { field_id: String, value: String },

    #[error("{field_id}: at most {max} entries allowed")]
    TooManyEntries { field_id: String, max: usize },
}

impl ValidationError {
    pub fn field_id(&self) -> &str {
        match self {
            ValidationError::Required { field_id }
            | ValidationError::TooLong { field_id, .. }
            | ValidationError::UnknownOption { field_id, .. }
            | ValidationError::TooManyEntries { field_id, .. } => field_id,
        }
    }
}

/// Errors raised while driving an intake submission
#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("{}", EMPTY_SUBMISSION_MESSAGE)]
    EmptySubmission,

    #[error("Invalid form: {}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    Invalid(Vec<ValidationError>),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error("Submission rejected: {0}")]
    Submit(String),

    #[error("A submission is already in progress")]
    Busy,

    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Field '{field_id}' is limited to {max} entries")]
    EntryLimit { field_id: String, max: usize },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
}
