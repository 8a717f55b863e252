//! Field Schema Registry
//!
//! Declarative description of every input a service intake form can show.
//! Descriptors are built once at start-up and never mutated; the registry
//! answers two questions for the rest of the crate:
//!
//! - which fields to render for a selection of services
//! - which human-readable question belongs to a (possibly nested) field id
//!   among the fields being rendered

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Widget kind of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldKind {
    Text,
    Textarea,
    Select,
    Radio,
    CheckboxGroup,
    File,
    Table,
    PersonGroup,
}

impl FieldKind {
    /// Kinds whose value is a list of structured rows
    pub fn is_repeated(self) -> bool {
        matches!(self, FieldKind::Table | FieldKind::PersonGroup)
    }

    /// Kinds restricted to a fixed list of options
    pub fn has_options(self) -> bool {
        matches!(
            self,
            FieldKind::Select | FieldKind::Radio | FieldKind::CheckboxGroup
        )
    }
}

/// A selectable option of a select, radio or checkbox-group field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOption {
    pub value: String,
    pub label: String,
}

/// A column of a table field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableColumn {
    pub key: String,
    pub header: String,
}

/// Static description of one form input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    pub id: String,
    pub kind: FieldKind,
    pub label: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<FieldOption>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<TableColumn>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_fields: Vec<FieldDescriptor>,
    /// Cap on repeated rows (table and person-group kinds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<usize>,
    #[serde(default)]
    pub required: bool,
    /// Character limit for text inputs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
}

impl FieldDescriptor {
    pub fn new(id: &str, kind: FieldKind, label: &str) -> Self {
        Self {
            id: id.to_string(),
            kind,
            label: label.to_string(),
            options: Vec::new(),
            columns: Vec::new(),
            sub_fields: Vec::new(),
            max: None,
            required: false,
            max_length: None,
        }
    }

    pub fn text(id: &str, label: &str) -> Self {
        Self::new(id, FieldKind::Text, label)
    }

    pub fn textarea(id: &str, label: &str) -> Self {
        Self::new(id, FieldKind::Textarea, label)
    }

    pub fn file(id: &str, label: &str) -> Self {
        Self::new(id, FieldKind::File, label)
    }

    pub fn select(id: &str, label: &str, options: &[(&str, &str)]) -> Self {
        Self::new(id, FieldKind::Select, label).with_options(options)
    }

    pub fn radio(id: &str, label: &str, options: &[(&str, &str)]) -> Self {
        Self::new(id, FieldKind::Radio, label).with_options(options)
    }

    pub fn checkbox_group(id: &str, label: &str, options: &[(&str, &str)]) -> Self {
        Self::new(id, FieldKind::CheckboxGroup, label).with_options(options)
    }

    pub fn table(id: &str, label: &str, columns: &[(&str, &str)]) -> Self {
        let mut field = Self::new(id, FieldKind::Table, label);
        field.columns = columns
            .iter()
            .map(|(key, header)| TableColumn {
                key: key.to_string(),
                header: header.to_string(),
            })
            .collect();
        field
    }

    pub fn person_group(id: &str, label: &str, sub_fields: Vec<FieldDescriptor>) -> Self {
        let mut field = Self::new(id, FieldKind::PersonGroup, label);
        field.sub_fields = sub_fields;
        field
    }

    pub fn with_options(mut self, options: &[(&str, &str)]) -> Self {
        self.options = options
            .iter()
            .map(|(value, label)| FieldOption {
                value: value.to_string(),
                label: label.to_string(),
            })
            .collect();
        self
    }

    pub fn with_max(mut self, max: usize) -> Self {
        self.max = Some(max);
        self
    }

    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Display text of a nested key: column header for tables, sub-field
    /// label for person groups.
    pub fn child_question(&self, key: &str) -> Option<&str> {
        match self.kind {
            FieldKind::Table => self
                .columns
                .iter()
                .find(|c| c.key == key)
                .map(|c| c.header.as_str()),
            FieldKind::PersonGroup => self
                .sub_fields
                .iter()
                .find(|f| f.id == key)
                .map(|f| f.label.as_str()),
            _ => None,
        }
    }

    /// Keys of an empty row for repeated kinds
    pub fn row_keys(&self) -> Vec<&str> {
        match self.kind {
            FieldKind::Table => self.columns.iter().map(|c| c.key.as_str()).collect(),
            FieldKind::PersonGroup => self.sub_fields.iter().map(|f| f.id.as_str()).collect(),
            _ => Vec::new(),
        }
    }

    pub fn allows_option(&self, value: &str) -> bool {
        self.options.iter().any(|o| o.value == value)
    }
}

/// A named bundle of fields for one offered service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    pub title: String,
    pub fields: Vec<FieldDescriptor>,
}

impl Service {
    pub fn new(id: &str, title: &str, fields: Vec<FieldDescriptor>) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            fields,
        }
    }
}

/// Immutable catalog of services and their fields
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    services: Vec<Service>,
}

impl SchemaRegistry {
    pub fn new(services: Vec<Service>) -> Self {
        Self { services }
    }

    pub fn services(&self) -> &[Service] {
        &self.services
    }

    pub fn service(&self, id: &str) -> Option<&Service> {
        self.services.iter().find(|s| s.id == id)
    }

    /// Consolidated field list for a selection of services.
    ///
    /// Services are walked in the order given; a field id seen once is
    /// never emitted again, so the first service carrying it wins.
    /// Unknown service ids contribute nothing.
    pub fn fields_for<S: AsRef<str>>(&self, service_ids: &[S]) -> Vec<&FieldDescriptor> {
        let mut seen = HashSet::new();
        let mut fields = Vec::new();

        for id in service_ids {
            let Some(service) = self.service(id.as_ref()) else {
                tracing::debug!(service = id.as_ref(), "Skipping unknown service");
                continue;
            };
            for field in &service.fields {
                if seen.insert(field.id.as_str()) {
                    fields.push(field);
                }
            }
        }

        fields
    }

    /// First descriptor with the given id, in catalog order
    pub fn field(&self, id: &str) -> Option<&FieldDescriptor> {
        self.services
            .iter()
            .flat_map(|s| s.fields.iter())
            .find(|f| f.id == id)
    }
}

/// Question text for a field id or a `parent.child` path, resolved against
/// the fields actually rendered (usually [`SchemaRegistry::fields_for`]).
/// Services sharing a field id may label it differently.
///
/// Unresolved paths fall back to their last raw segment.
pub fn question_in(fields: &[&FieldDescriptor], path: &str) -> String {
    let lookup = |id: &str| fields.iter().copied().find(|f| f.id == id);
    let resolved = match path.split_once('.') {
        None => lookup(path).map(|f| f.label.as_str()),
        Some((parent, child)) => lookup(parent).and_then(|f| f.child_question(child)),
    };

    match resolved {
        Some(text) => text.to_string(),
        None => path.rsplit('.').next().unwrap_or(path).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn registry() -> SchemaRegistry {
        SchemaRegistry::new(vec![
            Service::new(
                "a",
                "Service A",
                vec![
                    FieldDescriptor::text("name", "Name (A)"),
                    FieldDescriptor::table(
                        "assets",
                        "Assets",
                        &[("kind", "Kind"), ("value", "Value")],
                    ),
                ],
            ),
            Service::new(
                "b",
                "Service B",
                vec![
                    FieldDescriptor::text("name", "Name (B)"),
                    FieldDescriptor::person_group(
                        "family",
                        "Family members",
                        vec![FieldDescriptor::text("relation", "Relation")],
                    )
                    .with_max(3),
                ],
            ),
        ])
    }

    #[test]
    fn first_service_wins_on_duplicate_ids() {
        let reg = registry();

        let ab: Vec<_> = reg.fields_for(&["a", "b"]).iter().map(|f| f.label.clone()).collect();
        assert_eq!(ab, vec!["Name (A)", "Assets", "Family members"]);

        let ba: Vec<_> = reg.fields_for(&["b", "a"]).iter().map(|f| f.label.clone()).collect();
        assert_eq!(ba, vec!["Name (B)", "Family members", "Assets"]);
    }

    #[test]
    fn unknown_services_are_skipped() {
        let reg = registry();
        assert!(reg.fields_for(&["missing"]).is_empty());
        assert_eq!(reg.fields_for(&["missing", "a"]).len(), 2);
    }

    #[test]
    fn question_resolves_nested_paths() {
        let reg = registry();
        let fields = reg.fields_for(&["a", "b"]);
        assert_eq!(question_in(&fields, "name"), "Name (A)");
        assert_eq!(question_in(&fields, "assets.value"), "Value");
        assert_eq!(question_in(&fields, "family.relation"), "Relation");
    }

    #[test]
    fn question_falls_back_to_raw_id() {
        let reg = registry();
        let fields = reg.fields_for(&["a", "b"]);
        assert_eq!(question_in(&fields, "nickname"), "nickname");
        assert_eq!(question_in(&fields, "assets.color"), "color");
        assert_eq!(question_in(&fields, "unknown.child"), "child");
    }

    #[test]
    fn question_in_follows_the_rendered_fields() {
        let reg = registry();
        let b_first = reg.fields_for(&["b", "a"]);
        assert_eq!(question_in(&b_first, "name"), "Name (B)");
        assert_eq!(question_in(&b_first, "family.relation"), "Relation");

        let a_only = reg.fields_for(&["a"]);
        assert_eq!(question_in(&a_only, "name"), "Name (A)");
        assert_eq!(question_in(&a_only, "family.relation"), "relation");
    }

    #[test]
    fn descriptor_serializes_kind_in_kebab_case() {
        let json = serde_json::to_value(FieldDescriptor::checkbox_group("x", "X", &[("1", "One")]))
            .unwrap();
        assert_eq!(json["kind"], "checkbox-group");
        assert_eq!(json["options"][0]["label"], "One");
    }
}
