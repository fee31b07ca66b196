use crate::engine::{path, visibility};
use crate::model::{FieldKind, FieldSchema, FormConfig};
use crate::nav::keys;
use crate::widgets::array_editor::{self, ArrayUiState};
use crate::widgets::layout::{GroupLayout, LayoutMode};
use serde_json::Value as JsonValue;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormButton {
    Submit,
    Reset,
    Cancel,
    Preview,
}

/// One navigable row of the rendered form. The field tree (groups, fields,
/// array elements, nested sub-fields) is flattened into this list so that
/// cursor movement and key dispatch work on a flat index.
#[derive(Debug, Clone)]
pub enum Row {
    GroupHeader {
        name: String,
        label: String,
        collapsible: bool,
        expanded: bool,
    },
    Field {
        path: String,
        field: FieldSchema,
        depth: usize,
    },
    ArrayItem {
        path: String,
        index: usize,
        label: String,
        expanded: bool,
        depth: usize,
    },
    ArrayAdd {
        path: String,
        item_schema: Vec<FieldSchema>,
        depth: usize,
    },
    Button(FormButton),
}

impl Row {
    pub fn is_selectable(&self) -> bool {
        match self {
            Row::GroupHeader { collapsible, .. } => *collapsible,
            _ => true,
        }
    }
}

/// Flatten the schema against the current document into navigable rows.
/// Invisible fields are skipped entirely; array fields recurse into their
/// elements, re-entering the same machinery for nested sub-schemas.
pub fn flatten_rows(
    cfg: &FormConfig,
    doc: &JsonValue,
    layout: &GroupLayout,
    mode: LayoutMode,
    array_ui: &HashMap<String, ArrayUiState>,
) -> Vec<Row> {
    let mut rows: Vec<Row> = Vec::new();
    match mode {
        LayoutMode::Stacked => {
            for f in &cfg.fields {
                push_field(f, doc, "", 0, array_ui, &mut rows);
            }
        }
        LayoutMode::Tabs => {
            if let Some(g) = layout.active_group() {
                let name = g.name.clone();
                for f in layout.fields_for(&name, &cfg.fields) {
                    push_field(f, doc, "", 0, array_ui, &mut rows);
                }
            }
        }
        LayoutMode::Accordion => {
            for g in layout.groups().to_vec() {
                let expanded = layout.is_expanded(&g.name);
                rows.push(Row::GroupHeader {
                    name: g.name.clone(),
                    label: g.label.clone(),
                    collapsible: g.collapsible,
                    expanded,
                });
                if expanded {
                    for f in layout.fields_for(&g.name, &cfg.fields) {
                        push_field(f, doc, "", 1, array_ui, &mut rows);
                    }
                }
            }
        }
    }
    rows.push(Row::Button(FormButton::Submit));
    rows.push(Row::Button(FormButton::Reset));
    rows.push(Row::Button(FormButton::Cancel));
    if cfg.options.show_preview_button {
        rows.push(Row::Button(FormButton::Preview));
    }
    rows
}

fn push_field(
    f: &FieldSchema,
    scope: &JsonValue,
    base: &str,
    depth: usize,
    array_ui: &HashMap<String, ArrayUiState>,
    rows: &mut Vec<Row>,
) {
    if !visibility::is_visible(f, scope) {
        return;
    }
    let abs = keys::join(base, &f.key);
    rows.push(Row::Field {
        path: abs.clone(),
        field: f.clone(),
        depth,
    });
    if f.kind == FieldKind::Array {
        let st = array_ui.get(&abs);
        if let Some(JsonValue::Array(items)) = path::get(scope, &f.key) {
            for (i, item) in items.iter().enumerate() {
                let expanded = st.map(|s| s.is_expanded(i)).unwrap_or(false);
                rows.push(Row::ArrayItem {
                    path: abs.clone(),
                    index: i,
                    label: array_editor::display_name(item, i),
                    expanded,
                    depth: depth + 1,
                });
                if expanded {
                    let item_base = format!("{abs}.{i}");
                    for sub in &f.item_schema {
                        push_field(sub, item, &item_base, depth + 2, array_ui, rows);
                    }
                }
            }
        }
        rows.push(Row::ArrayAdd {
            path: abs,
            item_schema: f.item_schema.clone(),
            depth: depth + 1,
        });
    }
}
