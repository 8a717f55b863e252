//! Form State Store
//!
//! A flat map from field id to the field's current value for one intake
//! session. Event handlers replace whole values through [`FormState::set`];
//! the store never merges.

use std::collections::BTreeMap;

use bytes::Bytes;

use crate::error::{IntakeError, ValidationError};
use crate::schema::{FieldDescriptor, FieldKind};

/// Per-file size cap, enforced when files are selected
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// One row of a table or one person of a person group
pub type Row = BTreeMap<String, String>;

/// A file picked by the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHandle {
    pub name: String,
    pub size: u64,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl FileHandle {
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Self {
            name: name.into(),
            size: data.len() as u64,
            content_type: None,
            data,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn is_oversized(&self) -> bool {
        self.size > MAX_FILE_SIZE
    }
}

/// Files attached to a field plus the last error shown under it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSet {
    pub files: Vec<FileHandle>,
    pub error: Option<String>,
}

/// Current value of one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormValue {
    Text(String),
    Choices(Vec<String>),
    Rows(Vec<Row>),
    People(Vec<Row>),
    Files(FileSet),
}

impl FormValue {
    /// Empty value matching a widget kind
    pub fn empty_for(kind: FieldKind) -> Self {
        match kind {
            FieldKind::Text
            | FieldKind::Textarea
            | FieldKind::Select
            | FieldKind::Radio => FormValue::Text(String::new()),
            FieldKind::CheckboxGroup => FormValue::Choices(Vec::new()),
            FieldKind::Table => FormValue::Rows(Vec::new()),
            FieldKind::PersonGroup => FormValue::People(Vec::new()),
            FieldKind::File => FormValue::Files(FileSet::default()),
        }
    }

    /// True when the value carries no answer
    pub fn is_empty(&self) -> bool {
        match self {
            FormValue::Text(s) => s.trim().is_empty(),
            FormValue::Choices(v) => v.is_empty(),
            FormValue::Rows(rows) | FormValue::People(rows) => rows
                .iter()
                .all(|row| row.values().all(|v| v.trim().is_empty())),
            FormValue::Files(set) => set.files.is_empty(),
        }
    }

    fn rows_mut(&mut self) -> Option<&mut Vec<Row>> {
        match self {
            FormValue::Rows(rows) | FormValue::People(rows) => Some(rows),
            _ => None,
        }
    }
}

/// Live answers of one submission session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormState {
    values: BTreeMap<String, FormValue>,
}

impl FormState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the value stored for `field_id`
    pub fn set(&mut self, field_id: impl Into<String>, value: FormValue) {
        self.values.insert(field_id.into(), value);
    }

    pub fn get(&self, field_id: &str) -> Option<&FormValue> {
        self.values.get(field_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FormValue)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// True when no field carries an answer
    pub fn is_blank(&self) -> bool {
        self.values.values().all(FormValue::is_empty)
    }

    /// Apply a file selection to a file field.
    ///
    /// Files above [`MAX_FILE_SIZE`] never enter the set; the field's error
    /// names each of them. Accepted files replace the previous selection.
    pub fn select_files(&mut self, field_id: &str, candidates: Vec<FileHandle>) {
        let (accepted, rejected): (Vec<_>, Vec<_>) =
            candidates.into_iter().partition(|f| !f.is_oversized());

        let error = if rejected.is_empty() {
            None
        } else {
            let names = rejected
                .iter()
                .map(|f| f.name.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            tracing::debug!(field = field_id, rejected = %names, "Rejected oversized files");
            Some(format!("文件大小不能超过10MB: {}", names))
        };

        self.set(
            field_id,
            FormValue::Files(FileSet {
                files: accepted,
                error,
            }),
        );
    }

    /// Record an error under a file field without touching its files
    pub fn set_file_error(&mut self, field_id: &str, message: impl Into<String>) {
        let entry = self
            .values
            .entry(field_id.to_string())
            .or_insert_with(|| FormValue::Files(FileSet::default()));
        if let FormValue::Files(set) = entry {
            set.error = Some(message.into());
        }
    }

    /// Append an empty row to a table or person-group field
    pub fn add_row(&mut self, field: &FieldDescriptor) -> Result<usize, IntakeError> {
        if !field.kind.is_repeated() {
            return Err(IntakeError::UnknownField(field.id.clone()));
        }

        let value = self
            .values
            .entry(field.id.clone())
            .or_insert_with(|| FormValue::empty_for(field.kind));
        let rows = value
            .rows_mut()
            .ok_or_else(|| IntakeError::UnknownField(field.id.clone()))?;

        if let Some(max) = field.max {
            if rows.len() >= max {
                return Err(IntakeError::EntryLimit {
                    field_id: field.id.clone(),
                    max,
                });
            }
        }

        rows.push(
            field
                .row_keys()
                .into_iter()
                .map(|k| (k.to_string(), String::new()))
                .collect(),
        );
        Ok(rows.len() - 1)
    }

    pub fn remove_row(&mut self, field_id: &str, index: usize) -> Option<Row> {
        let rows = self.values.get_mut(field_id)?.rows_mut()?;
        (index < rows.len()).then(|| rows.remove(index))
    }

    /// Edit one cell; other rows stay untouched
    pub fn set_cell(
        &mut self,
        field_id: &str,
        index: usize,
        key: &str,
        value: impl Into<String>,
    ) -> Result<(), IntakeError> {
        let row = self
            .values
            .get_mut(field_id)
            .and_then(FormValue::rows_mut)
            .and_then(|rows| rows.get_mut(index))
            .ok_or_else(|| IntakeError::UnknownField(format!("{}[{}]", field_id, index)))?;
        row.insert(key.to_string(), value.into());
        Ok(())
    }

    /// Check the answers against the descriptors being rendered
    pub fn validate(&self, fields: &[&FieldDescriptor]) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        for field in fields {
            let value = self.values.get(&field.id);

            if field.required && value.map_or(true, FormValue::is_empty) {
                errors.push(ValidationError::Required {
                    field_id: field.id.clone(),
                });
                continue;
            }

            match value {
                Some(FormValue::Text(text)) => {
                    if let Some(max) = field.max_length {
                        if text.chars().count() > max {
                            errors.push(ValidationError::TooLong {
                                field_id: field.id.clone(),
                                max,
                            });
                        }
                    }
                    if field.kind.has_options() && !text.is_empty() && !field.allows_option(text) {
                        errors.push(ValidationError::UnknownOption {
                            field_id: field.id.clone(),
                            value: text.clone(),
                        });
                    }
                }
                Some(FormValue::Choices(choices)) => {
                    errors.extend(choices.iter().filter(|c| !field.allows_option(c)).map(|c| {
                        ValidationError::UnknownOption {
                            field_id: field.id.clone(),
                            value: c.clone(),
                        }
                    }));
                }
                Some(FormValue::Rows(rows)) | Some(FormValue::People(rows)) => {
                    if let Some(max) = field.max {
                        if rows.len() > max {
                            errors.push(ValidationError::TooManyEntries {
                                field_id: field.id.clone(),
                                max,
                            });
                        }
                    }
                }
                Some(FormValue::Files(_)) | None => {}
            }
        }

        errors
    }
}

/// Checkbox toggling computed on the caller side: returns the new selection
/// to hand to [`FormState::set`].
pub fn toggle_choice(current: &[String], value: &str) -> Vec<String> {
    if current.iter().any(|c| c == value) {
        current.iter().filter(|c| *c != value).cloned().collect()
    } else {
        let mut next = current.to_vec();
        next.push(value.to_string());
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    const MB: usize = 1024 * 1024;

    fn sized(name: &str, bytes: usize) -> FileHandle {
        FileHandle::new(name, vec![0u8; bytes])
    }

    #[test]
    fn oversized_file_is_rejected_and_named() {
        let mut state = FormState::new();
        state.select_files("docs", vec![sized("small.pdf", 5 * MB), sized("big.pdf", 12 * MB)]);

        let Some(FormValue::Files(set)) = state.get("docs") else {
            panic!("expected a file set");
        };
        assert_eq!(set.files.len(), 1);
        assert_eq!(set.files[0].name, "small.pdf");
        let error = set.error.as_deref().unwrap();
        assert!(error.contains("big.pdf"));
        assert!(!error.contains("small.pdf"));
    }

    #[test]
    fn file_exactly_at_limit_is_accepted() {
        let mut state = FormState::new();
        state.select_files("docs", vec![sized("edge.bin", MAX_FILE_SIZE as usize)]);
        let Some(FormValue::Files(set)) = state.get("docs") else {
            panic!("expected a file set");
        };
        assert_eq!(set.files.len(), 1);
        assert!(set.error.is_none());
    }

    #[test]
    fn set_cell_touches_only_one_row() {
        let field = FieldDescriptor::table("t", "T", &[("a", "A"), ("b", "B")]).with_max(3);
        let mut state = FormState::new();
        state.add_row(&field).unwrap();
        state.add_row(&field).unwrap();
        state.set_cell("t", 1, "a", "x").unwrap();

        let Some(FormValue::Rows(rows)) = state.get("t") else {
            panic!("expected rows");
        };
        assert_eq!(rows[0]["a"], "");
        assert_eq!(rows[1]["a"], "x");
        assert_eq!(rows[1]["b"], "");
    }

    #[test]
    fn add_row_respects_cap() {
        let field = FieldDescriptor::person_group("p", "P", vec![FieldDescriptor::text("n", "N")])
            .with_max(1);
        let mut state = FormState::new();
        assert_eq!(state.add_row(&field).unwrap(), 0);
        assert!(matches!(
            state.add_row(&field),
            Err(IntakeError::EntryLimit { max: 1, .. })
        ));
        assert!(state.remove_row("p", 0).is_some());
        assert!(state.remove_row("p", 0).is_none());
    }

    #[test]
    fn blank_state_detection() {
        let mut state = FormState::new();
        assert!(state.is_blank());
        state.set("name", FormValue::Text("   ".into()));
        state.set("rows", FormValue::Rows(vec![Row::from([("a".into(), "".into())])]));
        assert!(state.is_blank());
        state.set("name", FormValue::Text("Li".into()));
        assert!(!state.is_blank());
    }

    #[test]
    fn validation_reports_each_problem() {
        let name = FieldDescriptor::text("name", "Name").required();
        let notes = FieldDescriptor::textarea("notes", "Notes").with_max_length(3);
        let pick = FieldDescriptor::checkbox_group("pick", "Pick", &[("a", "A")]);
        let mut state = FormState::new();
        state.set("notes", FormValue::Text("四个汉字".into()));
        state.set("pick", FormValue::Choices(vec!["a".into(), "z".into()]));

        let errors = state.validate(&[&name, &notes, &pick]);
        let ids: Vec<_> = errors.iter().map(|e| e.field_id()).collect();
        assert_eq!(ids, vec!["name", "notes", "pick"]);
        assert!(matches!(errors[1], ValidationError::TooLong { max: 3, .. }));
    }

    #[test]
    fn toggle_adds_then_removes() {
        let once = toggle_choice(&[], "a");
        assert_eq!(once, vec!["a".to_string()]);
        assert!(toggle_choice(&once, "a").is_empty());
    }

    proptest! {
        #[test]
        fn set_is_idempotent(id in "[a-z-]{1,12}", text in ".{0,40}") {
            let mut state = FormState::new();
            state.set(id.clone(), FormValue::Text(text.clone()));
            let after_first = state.clone();
            state.set(id, FormValue::Text(text));
            prop_assert_eq!(state, after_first);
        }

        #[test]
        fn oversized_files_never_enter_the_set(
            sizes in proptest::collection::vec(0u64..(2 * MAX_FILE_SIZE), 1..6),
        ) {
            let files: Vec<_> = sizes
                .iter()
                .enumerate()
                .map(|(i, size)| FileHandle {
                    name: format!("f{}", i),
                    size: *size,
                    content_type: None,
                    data: Bytes::new(),
                })
                .collect();
            let mut state = FormState::new();
            state.select_files("docs", files);

            let Some(FormValue::Files(set)) = state.get("docs") else {
                panic!("expected a file set");
            };
            prop_assert!(set.files.iter().all(|f| f.size <= MAX_FILE_SIZE));
            let any_rejected = sizes.iter().any(|s| *s > MAX_FILE_SIZE);
            prop_assert_eq!(set.error.as_ref().map_or(false, |e| !e.is_empty()), any_rejected);
        }
    }
}
