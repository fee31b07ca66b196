use crate::app::Effect;
use crate::engine::path;
use crate::model::{FieldKind, FieldSchema, FormConfig};
use crate::nav::flatten::{FormButton, Row};
use crate::ui::ToastLevel;
use crate::widgets::array_editor::{self, ArrayUiState};
use crate::widgets::form::{
    commit_editor, draw_form, editor_for, ConfirmAction, Editor, FormState, OPTIONS_VISIBLE,
};
use crate::widgets::layout::LayoutMode;
use crate::widgets::{centered_rect, chrome};
use crossterm::event::KeyCode;
use ratatui::crossterm::event as rt_event;
use ratatui::prelude::*;
use ratatui::widgets::Clear;
use serde_json::Value as JsonValue;
use std::any::Any;

/// The form itself plus the transient editor for the selected row. All key
/// handling for the main view lives here; `ui` only routes global
/// shortcuts and overlay focus.
pub struct FormWidget {
    pub form: FormState,
    pub editor: Option<Editor>,
}

impl FormWidget {
    pub fn new(config: FormConfig) -> Self {
        Self {
            form: FormState::new(config),
            editor: None,
        }
    }

    fn selected_field(&self) -> Option<(String, FieldSchema)> {
        match self.form.selected_row() {
            Some(Row::Field { path, field, .. }) => Some((path.clone(), field.clone())),
            _ => None,
        }
    }

    fn commit_current(&mut self) -> Vec<Effect> {
        let Some((path, field)) = self.selected_field() else {
            self.editor = None;
            self.form.editing = false;
            return Vec::new();
        };
        let Some(editor) = self.editor.take() else {
            return Vec::new();
        };
        self.form.editing = false;
        commit_editor(&mut self.form, &field, &path, editor);
        vec![Effect::DocChanged]
    }

    fn cancel_editor(&mut self) {
        if let Some((path, field)) = self.selected_field() {
            self.form.blur(&path, &field);
        }
        self.editor = None;
        self.form.editing = false;
    }

    /// Commit a multi-line editor from the global Ctrl+S handler; the key
    /// dispatch here only sees plain `KeyCode`s.
    pub fn commit_area(&mut self) -> Vec<Effect> {
        if matches!(self.editor, Some(Editor::Area(_))) {
            self.commit_current()
        } else {
            Vec::new()
        }
    }

    fn refresh_effect(&self, path: &str, field: &FieldSchema, force: bool) -> Option<Effect> {
        field.options_cmd.clone().map(|cmdline| Effect::LoadFormOptions {
            field: path.to_string(),
            cmdline,
            unwrap: field.unwrap.clone(),
            force,
        })
    }

    fn toggle_checkbox(&mut self, path: &str) -> Vec<Effect> {
        let cur = path::get(&self.form.doc, path)
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        self.form.set_value(path, JsonValue::Bool(!cur));
        vec![Effect::DocChanged]
    }

    fn on_confirm_key(&mut self, key: KeyCode) -> Vec<Effect> {
        match key {
            KeyCode::Enter => match self.form.confirm.take() {
                Some(ConfirmAction::Reset) => {
                    self.form.reset_to_initial();
                    vec![Effect::DocChanged]
                }
                Some(ConfirmAction::Cancel) => vec![Effect::Quit],
                None => Vec::new(),
            },
            KeyCode::Esc => {
                self.form.confirm = None;
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    fn on_editor_key(&mut self, key: KeyCode) -> Vec<Effect> {
        let is_area = matches!(self.editor, Some(Editor::Area(_)));
        match key {
            KeyCode::Esc => {
                self.cancel_editor();
                return Vec::new();
            }
            // The multi-line editor takes Enter as a newline; everything
            // else commits on it.
            KeyCode::Enter if !is_area => return self.commit_current(),
            _ => {}
        }
        let Some(mut editor) = self.editor.take() else {
            return Vec::new();
        };
        let opts_len = self
            .selected_field()
            .map(|(p, f)| self.form.options_for(&f, &p).len())
            .unwrap_or(0);
        let mut effects = Vec::new();
        match &mut editor {
            Editor::Line { buf } => match key {
                KeyCode::Char(c) => buf.push(c),
                KeyCode::Backspace => {
                    buf.pop();
                }
                _ => {}
            },
            Editor::Select { cursor, offset } => match key {
                KeyCode::Up | KeyCode::Down => {
                    move_option_cursor(cursor, offset, opts_len, key == KeyCode::Up);
                }
                KeyCode::Char('r') => {
                    if let Some(eff) = self
                        .selected_field()
                        .and_then(|(p, f)| self.refresh_effect(&p, &f, true))
                    {
                        effects.push(eff);
                    }
                }
                _ => {}
            },
            Editor::Multi { cursor, offset, chosen } => match key {
                KeyCode::Up | KeyCode::Down => {
                    move_option_cursor(cursor, offset, opts_len, key == KeyCode::Up);
                }
                KeyCode::Char(' ') => {
                    if let Some((p, f)) = self.selected_field() {
                        let opts = self.form.options_for(&f, &p);
                        if let Some(opt) = opts.get(*cursor) {
                            let val = opt.value().to_string();
                            if let Some(pos) = chosen.iter().position(|c| *c == val) {
                                chosen.remove(pos);
                            } else {
                                chosen.push(val);
                            }
                        }
                    }
                }
                _ => {}
            },
            Editor::Area(ta) => {
                // tui-textarea speaks ratatui's bundled crossterm
                if let Some(code) = rt_key(key) {
                    let _ = ta.input(rt_event::KeyEvent::new(code, rt_event::KeyModifiers::NONE));
                }
            }
        }
        self.editor = Some(editor);
        effects
    }

    fn enter_row(&mut self) -> Vec<Effect> {
        let Some(row) = self.form.selected_row().cloned() else {
            return Vec::new();
        };
        match row {
            Row::GroupHeader { name, collapsible, .. } => {
                if collapsible {
                    self.form.layout.toggle(&name);
                    self.form.refresh_rows();
                }
                Vec::new()
            }
            Row::Field { path, field, .. } => match field.kind {
                FieldKind::Checkbox => self.toggle_checkbox(&path),
                FieldKind::MediaReference => vec![Effect::OpenMedia {
                    path,
                    multiple: field.multiple,
                }],
                FieldKind::Array | FieldKind::Custom => Vec::new(),
                _ => {
                    let mut effects = Vec::new();
                    if field.options_cmd.is_some()
                        && !self.form.dyn_options.contains_key(&path)
                    {
                        if let Some(eff) = self.refresh_effect(&path, &field, false) {
                            effects.push(eff);
                        }
                    }
                    if let Some(editor) = editor_for(&self.form, &field, &path) {
                        self.editor = Some(editor);
                        self.form.editing = true;
                        self.form.message = None;
                    }
                    effects
                }
            },
            Row::ArrayItem { path, index, .. } => {
                self.form
                    .array_ui
                    .entry(path)
                    .or_insert_with(ArrayUiState::default)
                    .toggle(index);
                self.form.refresh_rows();
                Vec::new()
            }
            Row::ArrayAdd { path, item_schema, .. } => {
                let st = self
                    .form
                    .array_ui
                    .entry(path.clone())
                    .or_insert_with(ArrayUiState::default);
                array_editor::insert_item(&mut self.form.doc, &path, &item_schema, st);
                self.form.dirty = self.form.doc != self.form.initial;
                self.form.refresh_rows();
                vec![Effect::DocChanged]
            }
            Row::Button(b) => self.press_button(b),
        }
    }

    fn press_button(&mut self, button: FormButton) -> Vec<Effect> {
        match button {
            FormButton::Submit => {
                if self.form.disabled {
                    return Vec::new();
                }
                let errors = self.form.validate_all();
                if errors.is_empty() {
                    self.form.message = None;
                    vec![Effect::SubmitDoc]
                } else {
                    self.form.message = Some("Corrige los errores marcados".to_string());
                    self.form.refresh_rows();
                    if let Some(i) = self.form.first_error_row() {
                        self.form.selected = i;
                    }
                    vec![Effect::ShowToast {
                        text: format!("{} campo(s) con errores", errors.len()),
                        level: ToastLevel::Error,
                        seconds: 4,
                    }]
                }
            }
            FormButton::Reset => {
                if self.form.dirty && !self.form.disabled {
                    self.form.confirm = Some(ConfirmAction::Reset);
                }
                Vec::new()
            }
            FormButton::Cancel => {
                if self.form.dirty {
                    self.form.confirm = Some(ConfirmAction::Cancel);
                    Vec::new()
                } else {
                    vec![Effect::Quit]
                }
            }
            FormButton::Preview => vec![Effect::OpenPreview],
        }
    }

    fn on_array_item_key(&mut self, key: KeyCode) -> Vec<Effect> {
        let Some(Row::ArrayItem { path, index, .. }) = self.form.selected_row().cloned() else {
            return Vec::new();
        };
        let st = self
            .form
            .array_ui
            .entry(path.clone())
            .or_insert_with(ArrayUiState::default);
        let changed = match key {
            KeyCode::Char('d') => {
                array_editor::remove_item(&mut self.form.doc, &path, index, st);
                true
            }
            KeyCode::Char('K') => {
                array_editor::move_item(&mut self.form.doc, &path, index, index.wrapping_sub(1), st)
            }
            KeyCode::Char('J') => {
                array_editor::move_item(&mut self.form.doc, &path, index, index + 1, st)
            }
            _ => false,
        };
        if changed {
            self.form.dirty = self.form.doc != self.form.initial;
            self.form.refresh_rows();
            vec![Effect::DocChanged]
        } else {
            Vec::new()
        }
    }
}

fn rt_key(key: KeyCode) -> Option<rt_event::KeyCode> {
    use rt_event::KeyCode as Rt;
    Some(match key {
        KeyCode::Char(c) => Rt::Char(c),
        KeyCode::Enter => Rt::Enter,
        KeyCode::Backspace => Rt::Backspace,
        KeyCode::Delete => Rt::Delete,
        KeyCode::Tab => Rt::Tab,
        KeyCode::Up => Rt::Up,
        KeyCode::Down => Rt::Down,
        KeyCode::Left => Rt::Left,
        KeyCode::Right => Rt::Right,
        KeyCode::Home => Rt::Home,
        KeyCode::End => Rt::End,
        KeyCode::PageUp => Rt::PageUp,
        KeyCode::PageDown => Rt::PageDown,
        _ => return None,
    })
}

fn move_option_cursor(cursor: &mut usize, offset: &mut usize, total: usize, up: bool) {
    if total == 0 {
        return;
    }
    if up {
        *cursor = cursor.saturating_sub(1);
    } else {
        *cursor = (*cursor + 1).min(total - 1);
    }
    if *cursor < *offset {
        *offset = *cursor;
    } else if *cursor >= *offset + OPTIONS_VISIBLE {
        *offset = *cursor + 1 - OPTIONS_VISIBLE;
    }
}

impl super::Widget for FormWidget {
    fn render(&mut self, f: &mut Frame, area: Rect, focused: bool, tick: u64) {
        let cursor_on = tick % 4 < 2;
        draw_form(f, area, &mut self.form, self.editor.as_ref(), focused, cursor_on);
        if let Some(Editor::Area(ta)) = self.editor.as_mut() {
            let rect = centered_rect(80, 60, area);
            f.render_widget(Clear, rect);
            let block = chrome::panel_block("Editor — Ctrl+S guarda · Esc cancela", true);
            let inner = block.inner(rect);
            f.render_widget(block, rect);
            f.render_widget(&**ta, inner);
        }
    }

    fn on_key(&mut self, key: KeyCode) -> Vec<Effect> {
        if self.form.confirm.is_some() {
            return self.on_confirm_key(key);
        }
        if self.editor.is_some() {
            return self.on_editor_key(key);
        }
        match key {
            KeyCode::Up => {
                self.form.move_selection(-1);
                Vec::new()
            }
            KeyCode::Down => {
                self.form.move_selection(1);
                Vec::new()
            }
            KeyCode::Tab | KeyCode::BackTab => {
                if self.form.mode == LayoutMode::Tabs {
                    if key == KeyCode::Tab {
                        self.form.layout.next_tab();
                    } else {
                        self.form.layout.prev_tab();
                    }
                    self.form.refresh_rows();
                    self.form.selected = self.form.first_selectable().unwrap_or(0);
                }
                Vec::new()
            }
            KeyCode::Enter => self.enter_row(),
            KeyCode::Char(' ') => {
                if let Some((path, field)) = self.selected_field() {
                    if field.kind == FieldKind::Checkbox {
                        return self.toggle_checkbox(&path);
                    }
                }
                Vec::new()
            }
            KeyCode::Char('r') => {
                if let Some((path, field)) = self.selected_field() {
                    if let Some(eff) = self.refresh_effect(&path, &field, true) {
                        return vec![eff];
                    }
                }
                Vec::new()
            }
            KeyCode::Char('d') | KeyCode::Char('K') | KeyCode::Char('J') => {
                self.on_array_item_key(key)
            }
            _ => Vec::new(),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldRules, FieldWidth, FormOptions};
    use crate::widgets::Widget as _;
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

    fn widget(fields: Vec<FieldSchema>) -> FormWidget {
        FormWidget::new(FormConfig {
            title: "Editor".into(),
            fields,
            options: FormOptions::default(),
            submit_cmd: Some("${APP_BIN} save".into()),
            ..Default::default()
        })
    }

    fn select_button(w: &mut FormWidget, b: FormButton) {
        let i = w
            .form
            .rows
            .iter()
            .position(|r| matches!(r, Row::Button(x) if *x == b))
            .unwrap();
        w.form.selected = i;
    }

    #[test]
    fn typing_and_enter_commits_value() {
        let mut w = widget(vec![field("title", FieldKind::Text, true)]);
        w.on_key(KeyCode::Enter);
        assert!(w.form.editing);
        for c in "Hola".chars() {
            w.on_key(KeyCode::Char(c));
        }
        let effects = w.on_key(KeyCode::Enter);
        assert!(matches!(effects.as_slice(), [Effect::DocChanged]));
        assert_eq!(path::get(&w.form.doc, "title"), Some(&json!("Hola")));
        assert!(!w.form.editing);
    }

    #[test]
    fn escape_discards_edit_but_marks_touched() {
        let mut w = widget(vec![field("title", FieldKind::Text, true)]);
        w.on_key(KeyCode::Enter);
        w.on_key(KeyCode::Char('x'));
        w.on_key(KeyCode::Esc);
        assert_eq!(path::get(&w.form.doc, "title"), None);
        assert!(w.form.validation.is_touched("title"));
        // smart validation reports the required error on blur
        assert!(w.form.validation.error_for("title").is_some());
    }

    #[test]
    fn checkbox_toggles_in_place() {
        let mut w = widget(vec![field("featured", FieldKind::Checkbox, false)]);
        let effects = w.on_key(KeyCode::Enter);
        assert!(matches!(effects.as_slice(), [Effect::DocChanged]));
        assert_eq!(path::get(&w.form.doc, "featured"), Some(&json!(true)));
        w.on_key(KeyCode::Char(' '));
        assert_eq!(path::get(&w.form.doc, "featured"), Some(&json!(false)));
    }

    #[test]
    fn submit_blocked_until_valid() {
        let mut w = widget(vec![field("title", FieldKind::Text, true)]);
        select_button(&mut w, FormButton::Submit);
        let effects = w.on_key(KeyCode::Enter);
        assert!(!effects.iter().any(|e| matches!(e, Effect::SubmitDoc)));
        assert!(effects
            .iter()
            .any(|e| matches!(e, Effect::ShowToast { level: ToastLevel::Error, .. })));
        // selection jumped to the offending field
        assert!(matches!(
            w.form.selected_row(),
            Some(Row::Field { path, .. }) if path == "title"
        ));

        w.form.set_value("title", json!("Listo"));
        select_button(&mut w, FormButton::Submit);
        let effects = w.on_key(KeyCode::Enter);
        assert!(effects.iter().any(|e| matches!(e, Effect::SubmitDoc)));
    }

    #[test]
    fn cancel_with_changes_requires_confirmation() {
        let mut w = widget(vec![field("title", FieldKind::Text, false)]);
        select_button(&mut w, FormButton::Cancel);
        let effects = w.on_key(KeyCode::Enter);
        assert!(effects.iter().any(|e| matches!(e, Effect::Quit)));

        let mut w = widget(vec![field("title", FieldKind::Text, false)]);
        w.form.set_value("title", json!("sucio"));
        select_button(&mut w, FormButton::Cancel);
        let effects = w.on_key(KeyCode::Enter);
        assert!(effects.is_empty());
        assert_eq!(w.form.confirm, Some(ConfirmAction::Cancel));
        // Esc keeps editing, Enter quits
        w.on_key(KeyCode::Esc);
        assert!(w.form.confirm.is_none());
        select_button(&mut w, FormButton::Cancel);
        w.on_key(KeyCode::Enter);
        let effects = w.on_key(KeyCode::Enter);
        assert!(effects.iter().any(|e| matches!(e, Effect::Quit)));
    }

    #[test]
    fn reset_restores_initial_document() {
        let mut w = widget(vec![field("title", FieldKind::Text, false)]);
        w.form.set_value("title", json!("cambiado"));
        assert!(w.form.dirty);
        select_button(&mut w, FormButton::Reset);
        w.on_key(KeyCode::Enter);
        assert_eq!(w.form.confirm, Some(ConfirmAction::Reset));
        let effects = w.on_key(KeyCode::Enter);
        assert!(effects.iter().any(|e| matches!(e, Effect::DocChanged)));
        assert_eq!(path::get(&w.form.doc, "title"), None);
        assert!(!w.form.dirty);
    }

    #[test]
    fn array_rows_support_add_remove_and_reorder() {
        let mut team = field("team", FieldKind::Array, false);
        team.item_schema = vec![field("name", FieldKind::Text, false)];
        let mut w = widget(vec![team]);

        // select the add row and press Enter twice
        let add = |w: &FormWidget| {
            w.form
                .rows
                .iter()
                .position(|r| matches!(r, Row::ArrayAdd { .. }))
                .unwrap()
        };
        w.form.selected = add(&w);
        w.on_key(KeyCode::Enter);
        w.form.selected = add(&w);
        w.on_key(KeyCode::Enter);
        assert_eq!(
            path::get(&w.form.doc, "team").and_then(|v| v.as_array()).map(Vec::len),
            Some(2)
        );

        // name them so reorder is observable
        w.form.set_value("team.0.name", json!("Ada"));
        w.form.set_value("team.1.name", json!("Bea"));
        let item1 = w
            .form
            .rows
            .iter()
            .position(|r| matches!(r, Row::ArrayItem { index: 1, .. }))
            .unwrap();
        w.form.selected = item1;
        w.on_key(KeyCode::Char('K'));
        assert_eq!(path::get(&w.form.doc, "team.0.name"), Some(&json!("Bea")));

        let item0 = w
            .form
            .rows
            .iter()
            .position(|r| matches!(r, Row::ArrayItem { index: 0, .. }))
            .unwrap();
        w.form.selected = item0;
        w.on_key(KeyCode::Char('d'));
        assert_eq!(
            path::get(&w.form.doc, "team").and_then(|v| v.as_array()).map(Vec::len),
            Some(1)
        );
        assert_eq!(path::get(&w.form.doc, "team.0.name"), Some(&json!("Ada")));
    }

    #[test]
    fn media_field_opens_picker_effect() {
        let mut media = field("cover", FieldKind::MediaReference, false);
        media.multiple = false;
        let mut w = widget(vec![media]);
        let effects = w.on_key(KeyCode::Enter);
        assert!(matches!(
            effects.as_slice(),
            [Effect::OpenMedia { path, multiple: false }] if path == "cover"
        ));
    }

    #[test]
    fn dynamic_select_requests_options_on_open() {
        let mut sel = field("category", FieldKind::Select, false);
        sel.options_cmd = Some("${APP_BIN} categories".into());
        sel.unwrap = Some("data.items[].id/title".into());
        let mut w = widget(vec![sel]);
        let effects = w.on_key(KeyCode::Enter);
        assert!(effects.iter().any(|e| matches!(
            e,
            Effect::LoadFormOptions { field, force: false, .. } if field == "category"
        )));
        assert!(w.form.editing);
        // a manual refresh while the list is open forces the cache
        let effects = w.on_key(KeyCode::Char('r'));
        assert!(effects.iter().any(|e| matches!(
            e,
            Effect::LoadFormOptions { force: true, .. }
        )));
    }
}
