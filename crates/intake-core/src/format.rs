//! Submission Formatter
//!
//! Turns a [`FormState`] into the self-describing document that gets
//! persisted: every answer travels with the question text it answers.
//!
//! The walk is recursive over the value tree. Scalars and checkbox arrays
//! are the base case; table rows and person entries are the composite case
//! and are formatted one level down against their column or sub-field
//! schema, using `parent.child` question paths.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::schema::{question_in, FieldDescriptor};
use crate::state::{FormState, FormValue, Row};
use crate::upload::{UploadResult, UploadedFiles};

/// Persisted submission: field id to question/answer pair
pub type SubmissionDocument = BTreeMap<String, Entry>;

/// One answered question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub question: String,
    pub answer: Answer,
}

/// Answer payload of an [`Entry`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    Text(String),
    Choices(Vec<String>),
    Uploads(Vec<UploadResult>),
    Rows(Vec<SubmissionDocument>),
}

/// Format the whole form state against the fields that were rendered.
///
/// Fields missing from `fields` keep their raw id as question text.
pub fn format_submission(
    fields: &[&FieldDescriptor],
    state: &FormState,
    uploads: &UploadedFiles,
) -> SubmissionDocument {
    state
        .iter()
        .map(|(field_id, value)| {
            let entry = Entry {
                question: question_in(fields, field_id),
                answer: format_value(fields, field_id, value, uploads),
            };
            (field_id.clone(), entry)
        })
        .collect()
}

fn format_value(
    fields: &[&FieldDescriptor],
    field_id: &str,
    value: &FormValue,
    uploads: &UploadedFiles,
) -> Answer {
    match value {
        FormValue::Text(text) => Answer::Text(text.clone()),
        FormValue::Choices(choices) => Answer::Choices(choices.clone()),
        FormValue::Files(_) => Answer::Uploads(uploads.get(field_id).cloned().unwrap_or_default()),
        FormValue::Rows(rows) | FormValue::People(rows) => Answer::Rows(
            rows.iter()
                .map(|row| format_row(fields, field_id, row))
                .collect(),
        ),
    }
}

fn format_row(fields: &[&FieldDescriptor], parent_id: &str, row: &Row) -> SubmissionDocument {
    row.iter()
        .map(|(key, value)| {
            let entry = Entry {
                question: question_in(fields, &format!("{}.{}", parent_id, key)),
                answer: Answer::Text(value.clone()),
            };
            (key.clone(), entry)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CATALOG;
    use crate::state::FileSet;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use serde_json::json;

    fn sample_state() -> FormState {
        let mut state = FormState::new();
        state.set("contact-name", FormValue::Text("王芳".into()));
        state.set(
            "conditions",
            FormValue::Choices(vec!["diabetes".into(), "heart".into()]),
        );
        state.set(
            "shareholders",
            FormValue::People(vec![Row::from([
                ("name".into(), "张伟".into()),
                ("share".into(), "60%".into()),
                ("nickname".into(), "伟哥".into()),
            ])]),
        );
        state.set("medical-reports", FormValue::Files(FileSet::default()));
        state.set("referral-code", FormValue::Text("SPRING".into()));
        state
    }

    fn sample_fields() -> Vec<&'static FieldDescriptor> {
        CATALOG.fields_for(&["health-assessment", "company-registration"])
    }

    fn sample_uploads() -> UploadedFiles {
        UploadedFiles::from([(
            "medical-reports".to_string(),
            vec![UploadResult {
                field_id: "medical-reports".into(),
                remote_location: "https://blob.test/report.pdf".into(),
            }],
        )])
    }

    #[test]
    fn pairs_answers_with_questions() {
        let doc = format_submission(&sample_fields(), &sample_state(), &sample_uploads());
        let json = serde_json::to_value(&doc).unwrap();

        assert_eq!(
            json["contact-name"],
            json!({"question": "联系人姓名", "answer": "王芳"})
        );
        assert_eq!(json["conditions"]["answer"], json!(["diabetes", "heart"]));
        assert_eq!(
            json["medical-reports"]["answer"][0]["remoteLocation"],
            "https://blob.test/report.pdf"
        );
        assert_eq!(
            json["shareholders"]["answer"][0]["share"],
            json!({"question": "持股比例", "answer": "60%"})
        );
    }

    #[test]
    fn unknown_keys_keep_their_raw_id() {
        let doc = format_submission(&sample_fields(), &sample_state(), &sample_uploads());
        assert_eq!(doc["referral-code"].question, "referral-code");

        let Answer::Rows(rows) = &doc["shareholders"].answer else {
            panic!("expected rows");
        };
        assert_eq!(rows[0]["nickname"].question, "nickname");
    }

    #[test]
    fn file_field_without_uploads_has_empty_answer() {
        let doc = format_submission(&sample_fields(), &sample_state(), &UploadedFiles::new());
        assert_eq!(doc["medical-reports"].answer, Answer::Uploads(Vec::new()));
    }

    #[test]
    fn document_parses_back_with_same_questions() {
        let doc = format_submission(&sample_fields(), &sample_state(), &sample_uploads());
        let text = serde_json::to_string(&doc).unwrap();
        let parsed: SubmissionDocument = serde_json::from_str(&text).unwrap();

        for (id, entry) in &doc {
            assert_eq!(parsed[id].question, entry.question);
        }
        assert_eq!(parsed["shareholders"], doc["shareholders"]);
    }

    #[test]
    fn shared_ids_use_the_selected_services_labels() {
        let mut state = FormState::new();
        state.set("remarks", FormValue::Text("需要年度申报".into()));
        state.set("id-documents", FormValue::Files(FileSet::default()));

        let tax = CATALOG.fields_for(&["tax-planning"]);
        let doc = format_submission(&tax, &state, &UploadedFiles::new());
        assert_eq!(doc["remarks"].question, "其他需求");
        // Not part of tax planning, so the raw id stays
        assert_eq!(doc["id-documents"].question, "id-documents");

        let immigration = CATALOG.fields_for(&["immigration"]);
        let doc = format_submission(&immigration, &state, &UploadedFiles::new());
        assert_eq!(doc["remarks"].question, "补充说明");
        assert_eq!(doc["id-documents"].question, "护照及身份证明");

        let both = CATALOG.fields_for(&["immigration", "company-registration"]);
        let doc = format_submission(&both, &state, &UploadedFiles::new());
        assert_eq!(doc["id-documents"].question, "护照及身份证明");
    }

    proptest! {
        /// Every answer is persisted with the label its service rendered
        #[test]
        fn question_round_trip(
            service in 0usize..16,
            index in 0usize..64,
            answer in "[a-zA-Z0-9 ]{1,20}",
        ) {
            let services = CATALOG.services();
            let selected = [services[service % services.len()].id.as_str()];
            let fields = CATALOG.fields_for(&selected);
            let field = fields[index % fields.len()];

            let mut state = FormState::new();
            state.set(field.id.clone(), FormValue::Text(answer));
            let doc = format_submission(&fields, &state, &UploadedFiles::new());
            let parsed: SubmissionDocument =
                serde_json::from_str(&serde_json::to_string(&doc).unwrap()).unwrap();

            prop_assert_eq!(&parsed[&field.id].question, &field.label);
        }
    }
}
