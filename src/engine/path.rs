use serde_json::{Map, Value as JsonValue};

/// Walk a dot-path into a nested value. Numeric segments index into
/// arrays; any missing intermediate short-circuits to None.
pub fn get<'a>(doc: &'a JsonValue, path: &str) -> Option<&'a JsonValue> {
    let mut cur = doc;
    for seg in path.split('.') {
        cur = match cur {
            JsonValue::Object(map) => map.get(seg)?,
            JsonValue::Array(arr) => arr.get(seg.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(cur)
}

/// Assign `value` at `path`, creating intermediate containers as needed,
/// and return a fresh top-level document so callers can rely on
/// reference inequality for change detection.
pub fn set(doc: &JsonValue, path: &str, value: JsonValue) -> JsonValue {
    let mut out = doc.clone();
    set_in_place(&mut out, path, value);
    out
}

/// In-place variant used by the form controller, which owns the document.
pub fn set_in_place(doc: &mut JsonValue, path: &str, value: JsonValue) {
    if path.is_empty() {
        *doc = value;
        return;
    }
    match path.split_once('.') {
        None => assign_segment(doc, path, value),
        Some((head, rest)) => set_in_place(child_slot(doc, head), rest, value),
    }
}

fn assign_segment(doc: &mut JsonValue, seg: &str, value: JsonValue) {
    if let (Ok(i), JsonValue::Array(arr)) = (seg.parse::<usize>(), &mut *doc) {
        if i >= arr.len() {
            arr.resize(i + 1, JsonValue::Null);
        }
        arr[i] = value;
        return;
    }
    if !doc.is_object() {
        *doc = JsonValue::Object(Map::new());
    }
    if let JsonValue::Object(map) = doc {
        map.insert(seg.to_string(), value);
    }
}

// Descend one segment, materializing containers. Intermediate containers
// created on demand are always mappings, never sequences, regardless of
// segment shape; numeric segments only index containers that already are
// arrays (array sub-forms address `key.<index>.<sub>`).
fn child_slot<'a>(doc: &'a mut JsonValue, seg: &str) -> &'a mut JsonValue {
    let as_index = seg.parse::<usize>().ok();
    if !(as_index.is_some() && doc.is_array()) && !doc.is_object() {
        *doc = JsonValue::Object(Map::new());
    }
    match doc {
        JsonValue::Array(arr) => {
            let i = as_index.unwrap_or(0);
            if i >= arr.len() {
                arr.resize(i + 1, JsonValue::Null);
            }
            if !matches!(arr[i], JsonValue::Object(_) | JsonValue::Array(_)) {
                arr[i] = JsonValue::Object(Map::new());
            }
            &mut arr[i]
        }
        JsonValue::Object(map) => {
            let slot = map.entry(seg.to_string()).or_insert(JsonValue::Null);
            if !matches!(slot, JsonValue::Object(_) | JsonValue::Array(_)) {
                *slot = JsonValue::Object(Map::new());
            }
            slot
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn get_walks_nested_objects_and_arrays() {
        let doc = json!({"a": {"b": [{"c": 7}]}});
        assert_eq!(get(&doc, "a.b.0.c"), Some(&json!(7)));
        assert_eq!(get(&doc, "a.b.1.c"), None);
        assert_eq!(get(&doc, "a.x.c"), None);
    }

    #[test]
    fn set_round_trips_for_deep_paths() {
        let doc = json!({});
        for (p, v) in [
            ("title", json!("Hola")),
            ("contact.email", json!("a@b.com")),
            ("seo.meta.description", json!("x")),
        ] {
            let out = set(&doc, p, v.clone());
            assert_eq!(get(&out, p), Some(&v));
        }
    }

    #[test]
    fn set_preserves_unrelated_branches() {
        let doc = json!({"hero": {"title": "H", "subtitle": "S"}, "team": [{"name": "A"}]});
        let out = set(&doc, "hero.title", json!("Nuevo"));
        assert_eq!(get(&out, "hero.subtitle"), Some(&json!("S")));
        assert_eq!(get(&out, "team.0.name"), Some(&json!("A")));
    }

    #[test]
    fn set_returns_new_top_level_value() {
        let doc = json!({"a": 1});
        let out = set(&doc, "b", json!(2));
        assert_eq!(doc, json!({"a": 1}));
        assert_ne!(doc, out);
    }

    #[test]
    fn intermediates_are_objects_even_for_numeric_segments() {
        let doc = json!({});
        let out = set(&doc, "items.0.name", json!("x"));
        // "items" did not exist, so it is created as a mapping keyed "0"
        assert_eq!(out, json!({"items": {"0": {"name": "x"}}}));
    }

    #[test]
    fn numeric_segments_index_existing_arrays() {
        let doc = json!({"team": [{"name": "A"}, {"name": "B"}]});
        let out = set(&doc, "team.1.name", json!("Bea"));
        assert_eq!(get(&out, "team.1.name"), Some(&json!("Bea")));
        assert_eq!(get(&out, "team.0.name"), Some(&json!("A")));
    }

    #[test]
    fn set_overwrites_scalar_intermediate_with_mapping() {
        let doc = json!({"a": 3});
        let out = set(&doc, "a.b", json!(1));
        assert_eq!(get(&out, "a.b"), Some(&json!(1)));
    }

    #[test]
    fn set_in_place_root_replacement() {
        let mut doc = json!({"a": 1});
        set_in_place(&mut doc, "", json!({"b": 2}));
        assert_eq!(doc, json!({"b": 2}));
    }
}
