//! Intake session controller
//!
//! Owns everything one modal session needs: the selected services, the
//! form state and the submission status. The status moves linearly:
//!
//! ```text
//! Idle -> Loading -> Success | Error
//! ```
//!
//! Terminal states return to `Idle` through [`IntakeSession::reset`], which
//! callers invoke [`STATUS_RESET_DELAY`] after the outcome was shown.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::IntakeError;
use crate::format::{format_submission, SubmissionDocument};
use crate::schema::{FieldDescriptor, SchemaRegistry};
use crate::state::FormState;
use crate::upload::{UploadBatcher, Uploader};

/// How long a success or error status stays visible
pub const STATUS_RESET_DELAY: Duration = Duration::from_secs(3);

/// Payload of an intake submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntakeSubmission {
    pub form_data: SubmissionDocument,
    pub services: Vec<String>,
    pub id: String,
}

/// Receives a finished submission
#[async_trait]
pub trait Submitter: Send + Sync {
    async fn submit(&self, submission: &IntakeSubmission) -> Result<(), IntakeError>;
}

/// Status shown next to the submit button
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SubmissionStatus {
    #[default]
    Idle,
    Loading,
    Success,
    Error(String),
}

impl SubmissionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SubmissionStatus::Success | SubmissionStatus::Error(_))
    }
}

/// One document-intake session over a service selection
pub struct IntakeSession<'r> {
    registry: &'r SchemaRegistry,
    id: String,
    services: Vec<String>,
    state: FormState,
    status: SubmissionStatus,
}

impl<'r> IntakeSession<'r> {
    pub fn new(registry: &'r SchemaRegistry, id: impl Into<String>, services: Vec<String>) -> Self {
        Self {
            registry,
            id: id.into(),
            services,
            state: FormState::new(),
            status: SubmissionStatus::Idle,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn services(&self) -> &[String] {
        &self.services
    }

    /// Fields to render for the current selection
    pub fn fields(&self) -> Vec<&'r FieldDescriptor> {
        self.registry.fields_for(self.services.as_slice())
    }

    pub fn state(&self) -> &FormState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut FormState {
        &mut self.state
    }

    pub fn status(&self) -> &SubmissionStatus {
        &self.status
    }

    /// Return a terminal status to `Idle`
    pub fn reset(&mut self) {
        if self.status.is_terminal() {
            self.status = SubmissionStatus::Idle;
        }
    }

    /// Modal closed: drop every answer
    pub fn close(&mut self) {
        self.state.clear();
        self.status = SubmissionStatus::Idle;
    }

    /// Upload files, format the answers and hand them to `submitter`.
    ///
    /// Blank forms are rejected before any network call. A failed upload
    /// writes its reason under the failing file field; uploads that already
    /// finished are not rolled back. Dropping the returned future before it
    /// completes puts the status back to `Idle`.
    pub async fn submit<U, S>(
        &mut self,
        uploader: &U,
        submitter: &S,
    ) -> Result<SubmissionDocument, IntakeError>
    where
        U: Uploader + ?Sized,
        S: Submitter + ?Sized,
    {
        if self.status == SubmissionStatus::Loading {
            return Err(IntakeError::Busy);
        }
        if self.state.is_blank() {
            return Err(IntakeError::EmptySubmission);
        }

        let fields = self.fields();
        let problems = self.state.validate(&fields);
        if !problems.is_empty() {
            return Err(IntakeError::Invalid(problems));
        }

        tracing::info!(session = %self.id, services = ?self.services, "Submitting intake form");
        let loading = LoadingGuard::enter(&mut self.status);

        let submission = Submission {
            fields: &fields,
            id: &self.id,
            services: &self.services,
            state: &self.state,
        };
        let outcome = submission.run(uploader, submitter).await;

        match outcome {
            Ok(document) => {
                self.state.clear();
                loading.finish(SubmissionStatus::Success);
                Ok(document)
            }
            Err(err) => {
                if let IntakeError::Upload(upload) = &err {
                    self.state.set_file_error(&upload.field_id, upload.reason.clone());
                }
                tracing::error!(session = %self.id, error = %err, "Intake submission failed");
                loading.finish(SubmissionStatus::Error(err.to_string()));
                Err(err)
            }
        }
    }
}

/// Holds the status at `Loading` while a submission is in flight
struct LoadingGuard<'s> {
    status: &'s mut SubmissionStatus,
}

impl<'s> LoadingGuard<'s> {
    fn enter(status: &'s mut SubmissionStatus) -> Self {
        *status = SubmissionStatus::Loading;
        Self { status }
    }

    fn finish(self, outcome: SubmissionStatus) {
        *self.status = outcome;
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if *self.status == SubmissionStatus::Loading {
            *self.status = SubmissionStatus::Idle;
        }
    }
}

/// Borrowed view of one in-flight submission
struct Submission<'a, 'r> {
    fields: &'a [&'r FieldDescriptor],
    id: &'a str,
    services: &'a [String],
    state: &'a FormState,
}

impl Submission<'_, '_> {
    async fn run<U, S>(
        &self,
        uploader: &U,
        submitter: &S,
    ) -> Result<SubmissionDocument, IntakeError>
    where
        U: Uploader + ?Sized,
        S: Submitter + ?Sized,
    {
        let uploads = UploadBatcher::new(uploader).upload_all(self.state).await?;
        let document = format_submission(self.fields, self.state, &uploads);

        let submission = IntakeSubmission {
            form_data: document,
            services: self.services.to_vec(),
            id: self.id.to_string(),
        };
        submitter.submit(&submission).await?;

        Ok(submission.form_data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CATALOG;
    use crate::error::EMPTY_SUBMISSION_MESSAGE;
    use crate::state::{FileHandle, FormValue};
    use std::sync::Mutex;
    use std::time::Duration as StdDuration;

    #[derive(Default)]
    struct FakeBlobStore {
        stored: Mutex<Vec<String>>,
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl Uploader for FakeBlobStore {
        async fn upload(&self, file: &FileHandle) -> Result<String, String> {
            *self.calls.lock().unwrap() += 1;
            tokio::time::sleep(StdDuration::from_millis(file.size)).await;
            if file.name.starts_with("broken") {
                return Err("blob store rejected the file".into());
            }
            self.stored.lock().unwrap().push(file.name.clone());
            Ok(format!("https://blob.test/{}", file.name))
        }
    }

    #[derive(Default)]
    struct FakeStore {
        received: Mutex<Vec<IntakeSubmission>>,
    }

    #[async_trait]
    impl Submitter for FakeStore {
        async fn submit(&self, submission: &IntakeSubmission) -> Result<(), IntakeError> {
            self.received.lock().unwrap().push(submission.clone());
            Ok(())
        }
    }

    /// Never answers
    struct StalledStore;

    #[async_trait]
    impl Submitter for StalledStore {
        async fn submit(&self, _submission: &IntakeSubmission) -> Result<(), IntakeError> {
            std::future::pending().await
        }
    }

    fn session() -> IntakeSession<'static> {
        IntakeSession::new(&CATALOG, "sess-1", vec!["health-assessment".to_string()])
    }

    fn fill_required(session: &mut IntakeSession<'_>) {
        let state = session.state_mut();
        state.set("contact-name", FormValue::Text("王芳".into()));
        state.set("contact-phone", FormValue::Text("13800000000".into()));
    }

    #[tokio::test]
    async fn empty_form_is_rejected_without_network() {
        let mut session = session();
        let blobs = FakeBlobStore::default();
        let store = FakeStore::default();

        let err = session.submit(&blobs, &store).await.unwrap_err();

        assert!(matches!(err, IntakeError::EmptySubmission));
        assert_eq!(err.to_string(), EMPTY_SUBMISSION_MESSAGE);
        assert_eq!(*blobs.calls.lock().unwrap(), 0);
        assert!(store.received.lock().unwrap().is_empty());
        assert_eq!(session.status(), &SubmissionStatus::Idle);
    }

    #[tokio::test]
    async fn missing_required_fields_are_reported() {
        let mut session = session();
        session
            .state_mut()
            .set("remarks", FormValue::Text("请尽快联系".into()));

        let err = session
            .submit(&FakeBlobStore::default(), &FakeStore::default())
            .await
            .unwrap_err();
        let IntakeError::Invalid(problems) = err else {
            panic!("expected validation errors");
        };
        let ids: Vec<_> = problems.iter().map(|p| p.field_id()).collect();
        assert_eq!(ids, vec!["contact-name", "contact-phone"]);
    }

    #[tokio::test]
    async fn successful_submission_clears_state() {
        let mut session = session();
        fill_required(&mut session);
        session
            .state_mut()
            .select_files("medical-reports", vec![FileHandle::new("report.pdf", vec![1u8; 4])]);

        let blobs = FakeBlobStore::default();
        let store = FakeStore::default();
        let document = session.submit(&blobs, &store).await.unwrap();

        assert_eq!(session.status(), &SubmissionStatus::Success);
        assert!(session.state().is_empty());
        assert_eq!(document["contact-name"].question, "联系人姓名");

        let received = store.received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].id, "sess-1");
        assert_eq!(received[0].services, vec!["health-assessment".to_string()]);

        session.reset();
        assert_eq!(session.status(), &SubmissionStatus::Idle);
    }

    #[tokio::test]
    async fn failed_upload_errors_and_orphans_finished_uploads() {
        let mut session = session();
        fill_required(&mut session);
        session.state_mut().select_files(
            "medical-reports",
            vec![
                FileHandle::new("fine.pdf", vec![1u8; 1]),
                FileHandle::new("broken.pdf", vec![1u8; 20]),
            ],
        );

        let blobs = FakeBlobStore::default();
        let store = FakeStore::default();
        let err = session.submit(&blobs, &store).await.unwrap_err();

        assert!(matches!(err, IntakeError::Upload(_)));
        assert!(matches!(session.status(), SubmissionStatus::Error(_)));
        assert!(store.received.lock().unwrap().is_empty());
        // The first file already reached the store and stays there
        assert_eq!(*blobs.stored.lock().unwrap(), vec!["fine.pdf".to_string()]);

        let Some(FormValue::Files(set)) = session.state().get("medical-reports") else {
            panic!("expected a file set");
        };
        assert_eq!(set.error.as_deref(), Some("blob store rejected the file"));
        assert_eq!(set.files.len(), 2);
    }

    #[tokio::test]
    async fn abandoned_submit_returns_to_idle() {
        let mut session = session();
        fill_required(&mut session);
        let blobs = FakeBlobStore::default();

        let abandoned = tokio::time::timeout(
            StdDuration::from_millis(20),
            session.submit(&blobs, &StalledStore),
        )
        .await;
        assert!(abandoned.is_err());
        assert_eq!(session.status(), &SubmissionStatus::Idle);
        assert!(!session.state().is_blank());

        let store = FakeStore::default();
        session.submit(&blobs, &store).await.unwrap();
        assert_eq!(session.status(), &SubmissionStatus::Success);
        assert_eq!(store.received.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn persisted_questions_match_the_selected_service() {
        let mut session = IntakeSession::new(&CATALOG, "sess-2", vec!["tax-planning".to_string()]);
        fill_required(&mut session);
        session
            .state_mut()
            .set("remarks", FormValue::Text("需要年度申报".into()));
        session
            .state_mut()
            .set("tax-residency", FormValue::Text("cn".into()));

        let store = FakeStore::default();
        session.submit(&FakeBlobStore::default(), &store).await.unwrap();

        let received = store.received.lock().unwrap();
        assert_eq!(received[0].form_data["remarks"].question, "其他需求");
    }

    #[test]
    fn close_discards_answers() {
        let mut session = session();
        fill_required(&mut session);
        session.close();
        assert!(session.state().is_empty());
        assert_eq!(session.status(), &SubmissionStatus::Idle);
    }
}
