//! Loading answers from a JSON file into a form state
//!
//! The file is an object keyed by field id:
//!
//! ```json
//! {
//!   "contact-name": "王芳",
//!   "conditions": ["diabetes"],
//!   "shareholders": [{"name": "张伟", "share": "60%"}]
//! }
//! ```
//!
//! Arrays of objects become table rows or person entries depending on the
//! field's kind in the schema.

use anyhow::{anyhow, bail, Result};
use intake_core::{FieldKind, FormState, FormValue, Row, SchemaRegistry};
use serde_json::Value;

fn to_row(field_id: &str, value: &Value) -> Result<Row> {
    let object = value
        .as_object()
        .ok_or_else(|| anyhow!("{}: every entry must be an object", field_id))?;
    object
        .iter()
        .map(|(key, cell)| {
            let text = match cell {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            };
            Ok((key.clone(), text))
        })
        .collect()
}

fn to_value(registry: &SchemaRegistry, field_id: &str, value: &Value) -> Result<FormValue> {
    match value {
        Value::String(s) => Ok(FormValue::Text(s.clone())),
        Value::Number(n) => Ok(FormValue::Text(n.to_string())),
        Value::Bool(b) => Ok(FormValue::Text(b.to_string())),
        Value::Array(items) => {
            let kind = registry.field(field_id).map(|f| f.kind);
            let rows = || {
                items
                    .iter()
                    .map(|item| to_row(field_id, item))
                    .collect::<Result<Vec<_>>>()
            };
            match kind {
                Some(FieldKind::PersonGroup) => Ok(FormValue::People(rows()?)),
                Some(FieldKind::Table) => Ok(FormValue::Rows(rows()?)),
                _ if items.iter().all(Value::is_string) => Ok(FormValue::Choices(
                    items
                        .iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect(),
                )),
                _ => Ok(FormValue::Rows(rows()?)),
            }
        }
        Value::Null | Value::Object(_) => bail!("{}: unsupported answer shape", field_id),
    }
}

/// Build a form state from a JSON answers document
pub fn load_answers(registry: &SchemaRegistry, document: &Value) -> Result<FormState> {
    let object = document
        .as_object()
        .ok_or_else(|| anyhow!("answers must be a JSON object keyed by field id"))?;

    let mut state = FormState::new();
    for (field_id, value) in object {
        state.set(field_id.clone(), to_value(registry, field_id, value)?);
    }
    Ok(state)
}
