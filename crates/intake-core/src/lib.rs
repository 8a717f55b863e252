//! Service intake core
//!
//! Everything behind the multi-service document-intake form:
//!
//! - [`schema`]: field descriptors, services and the registry that
//!   consolidates fields and resolves question text
//! - [`state`]: the per-session form state store
//! - [`upload`]: concurrent upload of every selected file
//! - [`format`]: question-annotated submission documents
//! - [`session`]: the controller tying them together
//! - [`client`]: HTTP adapters for the site API

pub mod catalog;
pub mod client;
pub mod error;
pub mod format;
pub mod schema;
pub mod session;
pub mod state;
pub mod upload;

pub use catalog::CATALOG;
pub use error::{IntakeError, UploadError, ValidationError, EMPTY_SUBMISSION_MESSAGE};
pub use format::{format_submission, Answer, Entry, SubmissionDocument};
pub use schema::{
    question_in, FieldDescriptor, FieldKind, FieldOption, SchemaRegistry, Service, TableColumn,
};
pub use session::{IntakeSession, IntakeSubmission, SubmissionStatus, Submitter, STATUS_RESET_DELAY};
pub use state::{toggle_choice, FileHandle, FileSet, FormState, FormValue, Row, MAX_FILE_SIZE};
pub use upload::{UploadBatcher, UploadResult, UploadedFiles, Uploader};
