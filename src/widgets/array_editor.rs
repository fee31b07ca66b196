use crate::engine::{defaults, path};
use crate::model::FieldSchema;
use serde_json::Value as JsonValue;
use std::collections::HashSet;

/// Per-array-field UI state keyed by the field's absolute dot-path,
/// never global flags: which element detail views are open.
#[derive(Debug, Default, Clone)]
pub struct ArrayUiState {
    pub expanded: HashSet<usize>,
}

impl ArrayUiState {
    pub fn is_expanded(&self, index: usize) -> bool {
        self.expanded.contains(&index)
    }

    pub fn toggle(&mut self, index: usize) {
        if !self.expanded.remove(&index) {
            self.expanded.insert(index);
        }
    }

    // Removal of element `removed` drops its marker and shifts every
    // marker above it down by one.
    fn shift_down_after(&mut self, removed: usize) {
        let mut next = HashSet::new();
        for &i in &self.expanded {
            if i < removed {
                next.insert(i);
            } else if i > removed {
                next.insert(i - 1);
            }
        }
        self.expanded = next;
    }

    fn remap_move(&mut self, from: usize, to: usize) {
        let mut next = HashSet::new();
        for &i in &self.expanded {
            let mapped = if i == from {
                to
            } else if from < to && i > from && i <= to {
                i - 1
            } else if to < from && i >= to && i < from {
                i + 1
            } else {
                i
            };
            next.insert(mapped);
        }
        self.expanded = next;
    }
}

fn items_mut<'a>(doc: &'a mut JsonValue, key: &str) -> Option<&'a mut Vec<JsonValue>> {
    // Materialize the array on first use
    if path::get(doc, key).map(|v| !v.is_array()).unwrap_or(true) {
        path::set_in_place(doc, key, JsonValue::Array(vec![]));
    }
    match path_get_mut(doc, key) {
        Some(JsonValue::Array(arr)) => Some(arr),
        _ => None,
    }
}

fn path_get_mut<'a>(doc: &'a mut JsonValue, key: &str) -> Option<&'a mut JsonValue> {
    let mut cur = doc;
    for seg in key.split('.') {
        cur = match cur {
            JsonValue::Object(map) => map.get_mut(seg)?,
            JsonValue::Array(arr) => arr.get_mut(seg.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(cur)
}

/// Append a new element seeded with the item schema's defaults and
/// auto-expand its detail view. Returns the new index.
pub fn insert_item(
    doc: &mut JsonValue,
    key: &str,
    item_schema: &[FieldSchema],
    st: &mut ArrayUiState,
) -> usize {
    let item = defaults::default_item(item_schema);
    let idx = match items_mut(doc, key) {
        Some(arr) => {
            arr.push(item);
            arr.len() - 1
        }
        None => 0,
    };
    st.expanded.insert(idx);
    idx
}

/// Splice out element `index`; expand state above it shifts down by one
/// and state for the removed element is dropped.
pub fn remove_item(doc: &mut JsonValue, key: &str, index: usize, st: &mut ArrayUiState) {
    if let Some(arr) = items_mut(doc, key) {
        if index < arr.len() {
            arr.remove(index);
            st.shift_down_after(index);
        }
    }
}

/// Reposition an element; no-op when `to` is outside `[0, len)`.
pub fn move_item(
    doc: &mut JsonValue,
    key: &str,
    from: usize,
    to: usize,
    st: &mut ArrayUiState,
) -> bool {
    if let Some(arr) = items_mut(doc, key) {
        if from < arr.len() && to < arr.len() && from != to {
            let item = arr.remove(from);
            arr.insert(to, item);
            st.remap_move(from, to);
            return true;
        }
    }
    false
}

/// Human label for a collapsed row: probe `title`, `name`, `author`,
/// else a positional fallback.
pub fn display_name(item: &JsonValue, index: usize) -> String {
    for probe in ["title", "name", "author"] {
        if let Some(s) = item.get(probe).and_then(|v| v.as_str()) {
            if !s.is_empty() {
                return s.to_string();
            }
        }
    }
    format!("Item {}", index + 1)
}
