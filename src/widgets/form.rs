use crate::engine::{defaults, path, validate};
use crate::engine::validate::{RuleSet, ValidationState};
use crate::model::{FieldKind, FieldSchema, FormConfig, SelectOption};
use crate::nav::flatten::{flatten_rows, FormButton, Row};
use crate::widgets::array_editor::ArrayUiState;
use crate::widgets::chrome::panel_block;
use crate::widgets::layout::{layout_mode, GroupLayout, LayoutMode};
use ratatui::prelude::*;
use ratatui::widgets::*;
use serde_json::{Map, Value as JsonValue};
use std::collections::{BTreeMap, HashMap};
use std::time::Instant;
use tui_textarea::TextArea;

pub const OPTIONS_VISIBLE: usize = 8;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfirmAction {
    Reset,
    Cancel,
}

/// Options fetched from a CLI command for one select field, with the fetch
/// time so the TTL cache in the loader can be bypassed on manual refresh.
pub struct DynOptions {
    pub options: Vec<SelectOption>,
    pub loaded_at: Instant,
}

/// Active editor for the selected row. One variant per editing style, not
/// per field kind: all single-line kinds share `Line`, both multi-line
/// kinds share `Area`.
pub enum Editor {
    Line { buf: String },
    Area(Box<TextArea<'static>>),
    Select { cursor: usize, offset: usize },
    Multi { cursor: usize, offset: usize, chosen: Vec<String> },
}

/// The form's entire state: the document (exclusively owned here), the
/// schema, derived validation state, the group layout and per-array UI
/// state. Every write goes through the path resolver.
pub struct FormState {
    pub config: FormConfig,
    pub doc: JsonValue,
    pub initial: JsonValue,
    pub validation: ValidationState,
    pub rules: RuleSet,
    pub layout: GroupLayout,
    pub array_ui: HashMap<String, ArrayUiState>,
    pub dyn_options: HashMap<String, DynOptions>,
    pub rows: Vec<Row>,
    pub mode: LayoutMode,
    pub selected: usize,
    pub editing: bool,
    pub message: Option<String>,
    pub disabled: bool,
    pub dirty: bool,
    pub confirm: Option<ConfirmAction>,
}

impl FormState {
    pub fn new(config: FormConfig) -> Self {
        let mut doc = config
            .initial
            .clone()
            .unwrap_or_else(|| JsonValue::Object(Map::new()));
        defaults::apply_defaults(&mut doc, &config.fields);
        let layout = GroupLayout::new(&config.groups, &config.fields);
        let mut form = Self {
            initial: doc.clone(),
            doc,
            config,
            validation: ValidationState::default(),
            rules: RuleSet::default(),
            layout,
            array_ui: HashMap::new(),
            dyn_options: HashMap::new(),
            rows: Vec::new(),
            mode: LayoutMode::Stacked,
            selected: 0,
            editing: false,
            message: None,
            disabled: false,
            dirty: false,
            confirm: None,
        };
        form.refresh_rows();
        form.selected = form.first_selectable().unwrap_or(0);
        form
    }

    /// A different record was loaded into this form instance: replace the
    /// document wholesale and drop all derived state.
    pub fn load_record(&mut self, mut record: JsonValue) {
        defaults::apply_defaults(&mut record, &self.config.fields);
        self.initial = record.clone();
        self.doc = record;
        self.validation.clear();
        self.array_ui.clear();
        self.dirty = false;
        self.editing = false;
        self.confirm = None;
        self.refresh_rows();
        self.selected = self.first_selectable().unwrap_or(0);
    }

    /// Re-evaluate the layout mode against the current terminal width.
    pub fn sync_mode(&mut self, width: u16) {
        let mode = layout_mode(width, self.layout.groups().len());
        if mode != self.mode {
            self.mode = mode;
            self.refresh_rows();
        }
    }

    pub fn refresh_rows(&mut self) {
        self.rows = flatten_rows(
            &self.config,
            &self.doc,
            &self.layout,
            self.mode,
            &self.array_ui,
        );
        if self.selected >= self.rows.len() {
            self.selected = self.rows.len().saturating_sub(1);
        }
    }

    pub fn selected_row(&self) -> Option<&Row> {
        self.rows.get(self.selected)
    }

    pub fn first_selectable(&self) -> Option<usize> {
        self.rows.iter().position(|r| r.is_selectable())
    }

    pub fn move_selection(&mut self, delta: isize) {
        if self.rows.is_empty() {
            return;
        }
        let mut i = self.selected as isize;
        loop {
            i += delta;
            if i < 0 || i >= self.rows.len() as isize {
                return;
            }
            if self.rows[i as usize].is_selectable() {
                self.selected = i as usize;
                return;
            }
        }
    }

    /// Route a write through the path resolver; the error at that path is
    /// cleared optimistically and re-checked on the next blur.
    pub fn set_value(&mut self, field_path: &str, value: JsonValue) {
        path::set_in_place(&mut self.doc, field_path, value);
        self.validation.clear_error(field_path);
        self.dirty = self.doc != self.initial;
        self.refresh_rows();
    }

    /// Leaving a field marks it touched and, when smart validation is on,
    /// re-validates just that field.
    pub fn blur(&mut self, field_path: &str, field: &FieldSchema) {
        self.validation.touch(field_path);
        if self.config.options.enable_smart_validation {
            let err = validate::validate_field(
                field,
                path::get(&self.doc, field_path),
                true,
                &self.rules,
            );
            self.validation.set_error(field_path, err);
        }
    }

    /// Submit-time validation: every visible field re-checked as touched,
    /// errors aggregated into a dot-path keyed map.
    pub fn validate_all(&mut self) -> BTreeMap<String, String> {
        let errors = validate::validate_document(&self.config.fields, &self.doc, &self.rules);
        let visible = validate::visible_paths(&self.config.fields, &self.doc);
        // a field hidden since the last pass must not keep its old error
        self.validation.drop_errors_outside(&visible);
        for p in &visible {
            self.validation.touch(p);
            self.validation.set_error(p, errors.get(p).cloned());
        }
        errors
    }

    pub fn reset_to_initial(&mut self) {
        self.doc = self.initial.clone();
        self.validation.clear();
        self.array_ui.clear();
        self.dirty = false;
        self.message = Some("Formulario restablecido".into());
        self.refresh_rows();
    }

    /// The document was persisted (or freshly seeded): the current state
    /// becomes the clean baseline for dirty tracking and reset.
    pub fn capture_initial(&mut self) {
        self.initial = self.doc.clone();
        self.dirty = false;
    }

    pub fn options_for(&self, field: &FieldSchema, field_path: &str) -> Vec<SelectOption> {
        match self.dyn_options.get(field_path) {
            Some(dy) => dy.options.clone(),
            None => field.options.clone(),
        }
    }

    pub fn first_error_row(&self) -> Option<usize> {
        self.rows.iter().position(|r| match r {
            Row::Field { path, .. } => self.validation.error_for(path).is_some(),
            _ => false,
        })
    }
}

/// Build the editor for a field, seeded from its current value. Kinds with
/// no editor (checkbox toggles in place, media opens the picker, arrays
/// edit through their item rows) return None.
pub fn editor_for(form: &FormState, field: &FieldSchema, field_path: &str) -> Option<Editor> {
    let cur = path::get(&form.doc, field_path);
    match field.kind {
        FieldKind::Checkbox | FieldKind::MediaReference | FieldKind::Array | FieldKind::Custom => {
            None
        }
        FieldKind::Textarea | FieldKind::Markdown => {
            let mut ta = TextArea::default();
            if let Some(s) = cur.and_then(|v| v.as_str()) {
                if !s.is_empty() {
                    ta.insert_str(s);
                }
            }
            Some(Editor::Area(Box::new(ta)))
        }
        FieldKind::Select => {
            let opts = form.options_for(field, field_path);
            let cur_val = cur.and_then(|v| v.as_str()).unwrap_or("");
            let cursor = opts
                .iter()
                .position(|o| o.value() == cur_val)
                .unwrap_or(0);
            Some(Editor::Select { cursor, offset: 0 })
        }
        FieldKind::Multiselect => {
            let chosen = cur
                .and_then(|v| v.as_array())
                .map(|a| {
                    a.iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default();
            Some(Editor::Multi {
                cursor: 0,
                offset: 0,
                chosen,
            })
        }
        FieldKind::Tags => {
            let buf = cur
                .and_then(|v| v.as_array())
                .map(|a| {
                    a.iter()
                        .filter_map(|v| v.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                })
                .unwrap_or_default();
            Some(Editor::Line { buf })
        }
        _ => {
            let buf = match cur {
                Some(JsonValue::String(s)) => s.clone(),
                Some(JsonValue::Number(n)) => n.to_string(),
                _ => String::new(),
            };
            Some(Editor::Line { buf })
        }
    }
}

/// Commit an editor's content at the field's path. The raw text is coerced
/// per kind; values that fail coercion are written as-is and left for the
/// validation engine to report.
pub fn commit_editor(
    form: &mut FormState,
    field: &FieldSchema,
    field_path: &str,
    editor: Editor,
) -> bool {
    let value = match editor {
        Editor::Line { buf } => match field.kind {
            FieldKind::Number => {
                let t = buf.trim();
                if t.is_empty() {
                    JsonValue::String(String::new())
                } else {
                    t.parse::<f64>()
                        .ok()
                        .and_then(serde_json::Number::from_f64)
                        .map(JsonValue::Number)
                        .unwrap_or(JsonValue::String(buf))
                }
            }
            FieldKind::Tags => JsonValue::Array(
                buf.split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(|t| JsonValue::String(t.to_string()))
                    .collect(),
            ),
            _ => JsonValue::String(buf),
        },
        Editor::Area(ta) => JsonValue::String(ta.lines().join("\n")),
        Editor::Select { cursor, .. } => {
            let opts = form.options_for(field, field_path);
            match opts.get(cursor) {
                Some(o) => JsonValue::String(o.value().to_string()),
                None => {
                    // nothing to write, but the interaction is still a blur
                    form.blur(field_path, field);
                    return false;
                }
            }
        }
        Editor::Multi { chosen, .. } => {
            JsonValue::Array(chosen.into_iter().map(JsonValue::String).collect())
        }
    };
    form.set_value(field_path, value);
    form.blur(field_path, field);
    true
}

fn join_strs(values: &[JsonValue], sep: &str) -> String {
    values
        .iter()
        .filter_map(|v| v.as_str())
        .collect::<Vec<_>>()
        .join(sep)
}

/// Collapsed one-line rendering of a field's current value, dispatched
/// exhaustively over the closed set of kinds.
pub fn value_summary(
    field: &FieldSchema,
    value: Option<&JsonValue>,
    options: &[SelectOption],
) -> String {
    match field.kind {
        FieldKind::Password => value
            .and_then(|v| v.as_str())
            .map(|s| "•".repeat(s.chars().count()))
            .unwrap_or_default(),
        FieldKind::Checkbox => {
            if value.and_then(|v| v.as_bool()).unwrap_or(false) {
                "[x]".into()
            } else {
                "[ ]".into()
            }
        }
        FieldKind::Select => {
            let cur = value.and_then(|v| v.as_str()).unwrap_or("");
            options
                .iter()
                .find(|o| o.value() == cur)
                .map(|o| o.label().to_string())
                .unwrap_or_else(|| {
                    if cur.is_empty() {
                        "(ninguno)".into()
                    } else {
                        cur.to_string()
                    }
                })
        }
        FieldKind::Multiselect => {
            let n = value.and_then(|v| v.as_array()).map(Vec::len).unwrap_or(0);
            format!("{n} seleccionados")
        }
        FieldKind::Tags => value
            .and_then(|v| v.as_array())
            .map(|a| join_strs(a, ", "))
            .unwrap_or_default(),
        FieldKind::Array => {
            let n = value.and_then(|v| v.as_array()).map(Vec::len).unwrap_or(0);
            if n == 1 {
                "1 elemento".into()
            } else {
                format!("{n} elementos")
            }
        }
        FieldKind::Textarea | FieldKind::Markdown => {
            let text = value.and_then(|v| v.as_str()).unwrap_or("");
            let mut lines = text.lines();
            let first = lines.next().unwrap_or("").to_string();
            let rest = lines.count();
            if rest > 0 {
                format!("{first} … (+{rest} líneas)")
            } else {
                first
            }
        }
        FieldKind::MediaReference => match value {
            Some(JsonValue::Array(a)) => {
                let n = a.len();
                if n == 1 {
                    "1 referencia".into()
                } else {
                    format!("{n} referencias")
                }
            }
            Some(JsonValue::String(s)) => s.clone(),
            _ => "(sin medio)".into(),
        },
        FieldKind::Custom => value.map(|v| v.to_string()).unwrap_or_default(),
        FieldKind::Number => match value {
            Some(JsonValue::Number(n)) => n.to_string(),
            Some(JsonValue::String(s)) => s.clone(),
            _ => String::new(),
        },
        _ => value.and_then(|v| v.as_str()).unwrap_or("").to_string(),
    }
}

fn window(cursor: usize, offset: usize, total: usize) -> (usize, usize) {
    let mut start = offset.min(total);
    if cursor < start {
        start = cursor;
    } else if cursor >= start + OPTIONS_VISIBLE {
        start = cursor + 1 - OPTIONS_VISIBLE;
    }
    let end = (start + OPTIONS_VISIBLE).min(total);
    (start, end)
}

pub fn draw_form(
    f: &mut Frame,
    area: Rect,
    form: &mut FormState,
    editor: Option<&Editor>,
    focused: bool,
    cursor_on: bool,
) {
    form.sync_mode(area.width);

    let mut lines: Vec<Line> = Vec::new();
    let mut sel_line: usize = 0;
    let mut buttons: Vec<(usize, FormButton)> = Vec::new();

    if form.mode == LayoutMode::Tabs {
        let mut spans: Vec<Span> = Vec::new();
        for (gi, g) in form.layout.groups().iter().enumerate() {
            let st = if gi == form.layout.active {
                crate::theme::list_cursor_style()
            } else {
                crate::theme::text_muted()
            };
            spans.push(Span::styled(format!(" {} ", g.label), st));
            spans.push(Span::raw(" "));
        }
        spans.push(Span::styled("(Tab cambia de grupo)", crate::theme::text_muted()));
        lines.push(Line::from(spans));
        lines.push(Line::from(""));
    }

    for (i, row) in form.rows.iter().enumerate() {
        if let Row::Button(b) = row {
            buttons.push((i, *b));
            continue;
        }
        if i == form.selected {
            sel_line = lines.len();
        }
        let sel = if i == form.selected { '›' } else { ' ' };
        match row {
            Row::GroupHeader { label, expanded, .. } => {
                let arrow = if *expanded { '▾' } else { '▸' };
                lines.push(Line::from(Span::styled(
                    format!("{sel} {arrow} {label}"),
                    crate::theme::title_style().add_modifier(Modifier::BOLD),
                )));
            }
            Row::Field { path, field, depth } => {
                let indent = "  ".repeat(*depth);
                let req = if field.required { " *" } else { "" };
                let editing_here = form.editing && i == form.selected;
                let value_style = if i == form.selected {
                    if editing_here {
                        crate::theme::text_editing_bold()
                    } else {
                        crate::theme::text_active_bold()
                    }
                } else {
                    Style::default()
                };
                let value = path::get(&form.doc, path);
                let opts = form.options_for(field, path);
                match (editing_here, editor) {
                    (true, Some(Editor::Line { buf })) => {
                        let mut val = buf.clone();
                        if cursor_on {
                            val.push('▏');
                        }
                        lines.push(Line::from(vec![
                            Span::raw(format!("{sel} {indent}{}{req}: ", field.label)),
                            Span::styled(val, value_style),
                        ]));
                    }
                    (true, Some(Editor::Area(_))) => {
                        lines.push(Line::from(vec![
                            Span::raw(format!("{sel} {indent}{}{req}: ", field.label)),
                            Span::styled(
                                "(editando — Ctrl+S guarda, Esc cancela)",
                                crate::theme::text_editing_bold(),
                            ),
                        ]));
                    }
                    (true, Some(Editor::Select { cursor, offset })) => {
                        let summary = value_summary(field, value, &opts);
                        lines.push(Line::from(vec![
                            Span::raw(format!("{sel} {indent}{}{req}: ", field.label)),
                            Span::styled(summary, value_style),
                        ]));
                        let cur_val = value.and_then(|v| v.as_str()).unwrap_or("");
                        let (start, end) = window(*cursor, *offset, opts.len());
                        for (oi, opt) in opts.iter().enumerate().take(end).skip(start) {
                            let mark = if opt.value() == cur_val { "(•)" } else { "( )" };
                            let cur = if oi == *cursor { '›' } else { ' ' };
                            let st = if oi == *cursor {
                                crate::theme::list_cursor_style()
                            } else {
                                crate::theme::text_muted()
                            };
                            lines.push(Line::from(Span::styled(
                                format!("  {indent}{cur} {mark} {}", opt.label()),
                                st,
                            )));
                        }
                        if opts.is_empty() {
                            lines.push(Line::from(Span::styled(
                                format!("  {indent}(sin opciones — r recarga)"),
                                crate::theme::text_muted(),
                            )));
                        }
                    }
                    (true, Some(Editor::Multi { cursor, offset, chosen })) => {
                        lines.push(Line::from(vec![
                            Span::raw(format!("{sel} {indent}{}{req}: ", field.label)),
                            Span::styled(
                                format!("{} seleccionados", chosen.len()),
                                value_style,
                            ),
                        ]));
                        let (start, end) = window(*cursor, *offset, opts.len());
                        for (oi, opt) in opts.iter().enumerate().take(end).skip(start) {
                            let chk = if chosen.iter().any(|c| c == opt.value()) {
                                "[x]"
                            } else {
                                "[ ]"
                            };
                            let cur = if oi == *cursor { '›' } else { ' ' };
                            let st = if oi == *cursor {
                                crate::theme::list_cursor_style()
                            } else {
                                crate::theme::text_muted()
                            };
                            lines.push(Line::from(Span::styled(
                                format!("  {indent}{cur} {chk} {}", opt.label()),
                                st,
                            )));
                        }
                    }
                    _ => {
                        let summary = value_summary(field, value, &opts);
                        lines.push(Line::from(vec![
                            Span::raw(format!("{sel} {indent}{}{req}: ", field.label)),
                            Span::styled(summary, value_style),
                        ]));
                    }
                }
                if let Some(err) = form.validation.error_for(path) {
                    lines.push(Line::from(Span::styled(
                        format!("  {indent}! {err}"),
                        crate::theme::text_error(),
                    )));
                }
            }
            Row::ArrayItem {
                label,
                expanded,
                depth,
                ..
            } => {
                let indent = "  ".repeat(*depth);
                let arrow = if *expanded { '▾' } else { '▸' };
                let st = if i == form.selected {
                    crate::theme::text_active_bold()
                } else {
                    Style::default()
                };
                lines.push(Line::from(vec![
                    Span::raw(format!("{sel} {indent}{arrow} ")),
                    Span::styled(label.clone(), st),
                ]));
            }
            Row::ArrayAdd { depth, .. } => {
                let indent = "  ".repeat(*depth);
                let st = if i == form.selected {
                    crate::theme::text_active_bold()
                } else {
                    crate::theme::text_muted()
                };
                lines.push(Line::from(Span::styled(
                    format!("{sel} {indent}+ Añadir elemento"),
                    st,
                )));
            }
            Row::Button(_) => unreachable!(),
        }
    }

    // Buttons render on one line; each is still its own selectable row.
    if !buttons.is_empty() {
        lines.push(Line::from(""));
        let mut spans: Vec<Span> = Vec::new();
        for (i, b) in &buttons {
            if *i == form.selected {
                sel_line = lines.len();
            }
            let (label, enabled) = match b {
                FormButton::Submit => ("[ Guardar ]", !form.disabled),
                FormButton::Reset => ("Restablecer", form.dirty && !form.disabled),
                FormButton::Cancel => ("Cancelar", true),
                FormButton::Preview => ("Vista previa", true),
            };
            let style = if *i == form.selected {
                if enabled {
                    crate::theme::list_cursor_style()
                } else {
                    crate::theme::text_muted().bg(crate::theme::ACCENT)
                }
            } else if enabled {
                crate::theme::text_active_bold()
            } else {
                crate::theme::text_muted()
            };
            spans.push(Span::styled(format!("  {label}"), style));
        }
        lines.push(Line::from(spans));
    }

    if let Some(confirm) = &form.confirm {
        let text = match confirm {
            ConfirmAction::Reset => "¿Descartar los cambios y restablecer? Enter confirma · Esc vuelve",
            ConfirmAction::Cancel => "¿Salir sin guardar? Enter confirma · Esc vuelve",
        };
        lines.push(Line::from(Span::styled(
            text.to_string(),
            crate::theme::text_error().add_modifier(Modifier::BOLD),
        )));
    } else if let Some(msg) = &form.message {
        lines.push(Line::from(Span::styled(
            msg.clone(),
            crate::theme::text_muted(),
        )));
    }

    let err_count = form.validation.error_count();
    let mut title = form.config.title.clone();
    if form.editing {
        title.push_str(" — editando");
    }
    if err_count > 0 {
        title.push_str(&format!(" — {err_count} error(es)"));
    }
    // Keep the selected row inside the viewport.
    let inner_h = area.height.saturating_sub(2) as usize;
    let scroll = if inner_h > 0 && sel_line >= inner_h {
        (sel_line + 1 - inner_h) as u16
    } else {
        0
    };
    let block = panel_block(&title, focused);
    let p = Paragraph::new(lines).block(block).scroll((scroll, 0));
    f.render_widget(p, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DependsOn, FieldRules, FieldWidth, FormOptions};
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;
    use serde_json::json;

    fn field(key: &str, kind: FieldKind, required: bool) -> FieldSchema {
        FieldSchema {
            key: key.into(),
            label: key.into(),
            kind,
            required,
            validation: FieldRules::default(),
            group: None,
            depends_on: None,
            default: None,
            width: FieldWidth::Full,
            placeholder: None,
            options: vec![],
            options_cmd: None,
            unwrap: None,
            multiple: false,
            item_schema: vec![],
        }
    }

    fn config(fields: Vec<FieldSchema>) -> FormConfig {
        FormConfig {
            title: "Editor".into(),
            fields,
            options: FormOptions::default(),
            ..Default::default()
        }
    }

    fn buffer_text(terminal: &Terminal<TestBackend>) -> String {
        let buf = terminal.backend().buffer();
        let mut out = String::new();
        for y in 0..buf.area.height {
            for x in 0..buf.area.width {
                out.push_str(buf[(x, y)].symbol());
            }
            out.push('\n');
        }
        out
    }

    #[test]
    fn seeding_applies_defaults_once() {
        let mut title = field("title", FieldKind::Text, true);
        title.default = Some(json!("Sin título"));
        let mut cfg = config(vec![title]);
        cfg.initial = Some(json!({}));
        let form = FormState::new(cfg);
        assert_eq!(path::get(&form.doc, "title"), Some(&json!("Sin título")));
        assert!(!form.dirty);
    }

    #[test]
    fn set_value_clears_error_optimistically() {
        let cfg = config(vec![field("title", FieldKind::Text, true)]);
        let mut form = FormState::new(cfg);
        let errors = form.validate_all();
        assert_eq!(errors.len(), 1);
        assert!(form.validation.error_for("title").is_some());
        form.set_value("title", json!("Hola"));
        assert!(form.validation.error_for("title").is_none());
        assert!(form.dirty);
    }

    #[test]
    fn validate_all_touches_nested_array_fields() {
        let mut team = field("team", FieldKind::Array, false);
        team.item_schema = vec![field("name", FieldKind::Text, true)];
        let mut cfg = config(vec![team]);
        cfg.initial = Some(json!({"team": [{}]}));
        let mut form = FormState::new(cfg);
        let errors = form.validate_all();
        assert_eq!(errors.keys().collect::<Vec<_>>(), vec!["team.0.name"]);
        assert!(form.validation.is_touched("team.0.name"));
    }

    #[test]
    fn hiding_a_field_drops_its_stale_error() {
        let variant = field("variant", FieldKind::Text, false);
        let mut grad = field("gradient", FieldKind::Text, true);
        grad.depends_on = Some(DependsOn {
            field: "variant".into(),
            value: json!("gradient"),
        });
        let mut form = FormState::new(config(vec![variant, grad]));
        form.set_value("variant", json!("gradient"));
        let errors = form.validate_all();
        assert!(errors.contains_key("gradient"));
        assert_eq!(form.validation.error_count(), 1);

        // hide the dependent field; the panel count must follow the map
        form.set_value("variant", json!("plain"));
        let errors = form.validate_all();
        assert!(errors.is_empty());
        assert_eq!(form.validation.error_count(), 0);
    }

    #[test]
    fn load_record_replaces_document_and_clears_state() {
        let cfg = config(vec![field("title", FieldKind::Text, true)]);
        let mut form = FormState::new(cfg);
        form.set_value("title", json!("borrador"));
        form.validate_all();
        form.load_record(json!({"title": "Cargado"}));
        assert_eq!(path::get(&form.doc, "title"), Some(&json!("Cargado")));
        assert!(!form.dirty);
        assert_eq!(form.validation.error_count(), 0);
    }

    #[test]
    fn commit_coerces_numbers_and_tags() {
        let cfg = config(vec![
            field("year", FieldKind::Number, false),
            field("tags", FieldKind::Tags, false),
        ]);
        let mut form = FormState::new(cfg);
        let year = form.config.fields[0].clone();
        let tags = form.config.fields[1].clone();
        commit_editor(&mut form, &year, "year", Editor::Line { buf: "1994".into() });
        assert_eq!(path::get(&form.doc, "year"), Some(&json!(1994.0)));
        commit_editor(
            &mut form,
            &tags,
            "tags",
            Editor::Line { buf: "iso, calidad , ".into() },
        );
        assert_eq!(
            path::get(&form.doc, "tags"),
            Some(&json!(["iso", "calidad"]))
        );
        // unparseable numbers are kept raw for the validator to flag
        commit_editor(&mut form, &year, "year", Editor::Line { buf: "abc".into() });
        assert_eq!(path::get(&form.doc, "year"), Some(&json!("abc")));
        assert!(form.validation.error_for("year").is_some());
    }

    #[test]
    fn empty_select_commit_still_counts_as_blur() {
        let sel = field("category", FieldKind::Select, true);
        let mut form = FormState::new(config(vec![sel]));
        let f = form.config.fields[0].clone();
        let committed = commit_editor(
            &mut form,
            &f,
            "category",
            Editor::Select { cursor: 0, offset: 0 },
        );
        assert!(!committed);
        assert!(form.validation.is_touched("category"));
        // the lenient window for untouched selects is over
        assert!(form.validation.error_for("category").is_some());
    }

    #[test]
    fn value_summary_dispatches_per_kind() {
        let pw = field("pw", FieldKind::Password, false);
        assert_eq!(value_summary(&pw, Some(&json!("abc")), &[]), "•••");
        let sel = field("variant", FieldKind::Select, false);
        let opts = vec![SelectOption::Pair {
            label: "Degradado".into(),
            value: "gradient".into(),
        }];
        assert_eq!(value_summary(&sel, Some(&json!("gradient")), &opts), "Degradado");
        assert_eq!(value_summary(&sel, None, &opts), "(ninguno)");
        let arr = field("team", FieldKind::Array, false);
        assert_eq!(value_summary(&arr, Some(&json!([{}, {}])), &[]), "2 elementos");
        let ta = field("body", FieldKind::Textarea, false);
        assert_eq!(
            value_summary(&ta, Some(&json!("uno\ndos\ntres")), &[]),
            "uno … (+2 líneas)"
        );
        let media = field("cover", FieldKind::MediaReference, false);
        assert_eq!(value_summary(&media, None, &[]), "(sin medio)");
    }

    #[test]
    fn draw_form_renders_labels_errors_and_buttons() {
        let mut title = field("title", FieldKind::Text, true);
        title.label = "Título".into();
        let cfg = config(vec![title]);
        let mut form = FormState::new(cfg);
        form.validate_all();
        let backend = TestBackend::new(60, 12);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal
            .draw(|f| {
                let area = f.area();
                draw_form(f, area, &mut form, None, true, false);
            })
            .unwrap();
        let text = buffer_text(&terminal);
        assert!(text.contains("Título *:"));
        assert!(text.contains("! Título es requerido"));
        assert!(text.contains("[ Guardar ]"));
        assert!(text.contains("Cancelar"));
    }

    #[test]
    fn draw_form_lists_array_items_with_display_names() {
        let mut team = field("team", FieldKind::Array, false);
        team.label = "Equipo".into();
        team.item_schema = vec![field("name", FieldKind::Text, true)];
        let mut cfg = config(vec![team]);
        cfg.initial = Some(json!({"team": [{"name": "Ada"}, {"name": "Bea"}]}));
        let mut form = FormState::new(cfg);
        let backend = TestBackend::new(60, 14);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal
            .draw(|f| {
                let area = f.area();
                draw_form(f, area, &mut form, None, true, false);
            })
            .unwrap();
        let text = buffer_text(&terminal);
        assert!(text.contains("Equipo: 2 elementos"));
        assert!(text.contains("▸ Ada"));
        assert!(text.contains("▸ Bea"));
        assert!(text.contains("+ Añadir elemento"));
    }
}
