use crate::engine::path;
use crate::model::FieldSchema;
use serde_json::Value as JsonValue;

/// A field renders iff it has no `depends_on`, or the value at the
/// condition path strictly equals the expected value. A missing path
/// never matches, not even against an expected null.
pub fn is_visible(field: &FieldSchema, doc: &JsonValue) -> bool {
    match &field.depends_on {
        None => true,
        Some(dep) => path::get(doc, &dep.field) == Some(&dep.value),
    }
}
