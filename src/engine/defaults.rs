use crate::engine::path;
use crate::model::FieldSchema;
use serde_json::{Map, Value as JsonValue};

// A value counts as unset when it is missing, null or the empty string.
// 0 and false are legitimate values and must survive seeding.
fn is_unset(v: Option<&JsonValue>) -> bool {
    match v {
        None | Some(JsonValue::Null) => true,
        Some(JsonValue::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

/// Seed schema defaults into `doc`, once per schema/initial pairing.
/// Idempotent: a second application is a no-op.
pub fn apply_defaults(doc: &mut JsonValue, fields: &[FieldSchema]) {
    for f in fields {
        if let Some(dv) = &f.default {
            if is_unset(path::get(doc, &f.key)) {
                path::set_in_place(doc, &f.key, dv.clone());
            }
        }
    }
}

/// Build a fresh array element from an item schema's defaults.
pub fn default_item(item_schema: &[FieldSchema]) -> JsonValue {
    let mut item = JsonValue::Object(Map::new());
    apply_defaults(&mut item, item_schema);
    item
}
