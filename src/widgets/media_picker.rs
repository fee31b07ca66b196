use crate::app::Effect;
use crate::ui::MediaItem;
use crate::widgets::chrome::panel_block;
use crossterm::event::KeyCode;
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;
use std::any::Any;

const SPINNER: [&str; 6] = ["⠋", "⠙", "⠸", "⠴", "⠦", "⠇"];
const VISIBLE: usize = 12;

/// Overlay for media-reference fields. Items come from the configured
/// media command; Enter writes the choice back through `Effect::MediaChosen`
/// and Esc leaves the document untouched.
pub struct MediaPickerWidget {
    target_path: String,
    multiple: bool,
    current: Vec<String>,
    items: Vec<MediaItem>,
    chosen: Vec<bool>,
    cursor: usize,
    offset: usize,
    loading: bool,
    error: Option<String>,
}

impl MediaPickerWidget {
    pub fn new(target_path: String, multiple: bool, current: Vec<String>) -> Self {
        Self {
            target_path,
            multiple,
            current,
            items: Vec::new(),
            chosen: Vec::new(),
            cursor: 0,
            offset: 0,
            loading: true,
            error: None,
        }
    }

    /// Library loaded: preselect whatever the document already references.
    pub fn set_items(&mut self, items: Vec<MediaItem>) {
        self.chosen = items
            .iter()
            .map(|it| self.current.iter().any(|c| *c == it.url))
            .collect();
        self.items = items;
        self.cursor = 0;
        self.offset = 0;
        self.loading = false;
        self.error = None;
    }

    pub fn set_error(&mut self, err: String) {
        self.loading = false;
        self.error = Some(err);
    }

    fn move_cursor(&mut self, up: bool) {
        if self.items.is_empty() {
            return;
        }
        if up {
            self.cursor = self.cursor.saturating_sub(1);
        } else {
            self.cursor = (self.cursor + 1).min(self.items.len() - 1);
        }
        if self.cursor < self.offset {
            self.offset = self.cursor;
        } else if self.cursor >= self.offset + VISIBLE {
            self.offset = self.cursor + 1 - VISIBLE;
        }
    }

    fn chosen_urls(&self) -> Vec<String> {
        if self.multiple {
            self.items
                .iter()
                .zip(&self.chosen)
                .filter(|(_, c)| **c)
                .map(|(it, _)| it.url.clone())
                .collect()
        } else {
            self.items
                .get(self.cursor)
                .map(|it| vec![it.url.clone()])
                .unwrap_or_default()
        }
    }
}

impl super::Widget for MediaPickerWidget {
    fn render(&mut self, f: &mut Frame, area: Rect, focused: bool, tick: u64) {
        let block = panel_block("Biblioteca de medios", focused);
        let inner = block.inner(area);
        f.render_widget(block, area);

        let mut lines: Vec<Line> = Vec::new();
        if self.loading {
            let frame = SPINNER[(tick as usize) % SPINNER.len()];
            lines.push(Line::from(Span::styled(
                format!("{frame} cargando medios…"),
                crate::theme::text_muted(),
            )));
        } else if let Some(err) = &self.error {
            lines.push(Line::from(Span::styled(
                err.clone(),
                crate::theme::text_error(),
            )));
        } else if self.items.is_empty() {
            lines.push(Line::from(Span::styled(
                "(biblioteca vacía)",
                crate::theme::text_muted(),
            )));
        } else {
            let end = (self.offset + VISIBLE).min(self.items.len());
            for (i, item) in self.items.iter().enumerate().take(end).skip(self.offset) {
                let cur = if i == self.cursor { '›' } else { ' ' };
                let mark = if self.multiple {
                    if self.chosen.get(i).copied().unwrap_or(false) {
                        "[x]"
                    } else {
                        "[ ]"
                    }
                } else if self.current.iter().any(|c| *c == item.url) {
                    "(•)"
                } else {
                    "( )"
                };
                let label = match &item.title {
                    Some(t) => format!("{t}  ({})", item.url),
                    None => item.url.clone(),
                };
                let st = if i == self.cursor {
                    crate::theme::list_cursor_style()
                } else {
                    Style::default()
                };
                lines.push(Line::from(Span::styled(format!("{cur} {mark} {label}"), st)));
            }
        }
        let help = if self.multiple {
            "Espacio marca · Enter acepta · Esc cancela"
        } else {
            "Enter elige · Esc cancela"
        };
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(help, crate::theme::text_muted())));
        f.render_widget(Paragraph::new(lines), inner);
    }

    fn on_key(&mut self, key: KeyCode) -> Vec<Effect> {
        match key {
            KeyCode::Up => {
                self.move_cursor(true);
                Vec::new()
            }
            KeyCode::Down => {
                self.move_cursor(false);
                Vec::new()
            }
            KeyCode::Char(' ') if self.multiple => {
                if let Some(c) = self.chosen.get_mut(self.cursor) {
                    *c = !*c;
                }
                Vec::new()
            }
            KeyCode::Enter => {
                if self.loading || self.error.is_some() {
                    return Vec::new();
                }
                vec![Effect::MediaChosen {
                    path: self.target_path.clone(),
                    urls: self.chosen_urls(),
                    multiple: self.multiple,
                }]
            }
            KeyCode::Esc => vec![Effect::CloseOverlay],
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
    use crate::widgets::Widget as _;

    fn items() -> Vec<MediaItem> {
        vec![
            MediaItem {
                url: "https://cdn/a.png".into(),
                title: Some("A".into()),
            },
            MediaItem {
                url: "https://cdn/b.png".into(),
                title: None,
            },
        ]
    }

    #[test]
    fn single_mode_enter_picks_cursor_item() {
        let mut w = MediaPickerWidget::new("cover".into(), false, vec![]);
        w.set_items(items());
        w.on_key(KeyCode::Down);
        let effects = w.on_key(KeyCode::Enter);
        assert!(matches!(
            effects.as_slice(),
            [Effect::MediaChosen { path, urls, multiple: false }]
                if path == "cover" && urls == &vec!["https://cdn/b.png".to_string()]
        ));
    }

    #[test]
    fn multiple_mode_collects_marked_items() {
        let mut w = MediaPickerWidget::new("gallery".into(), true, vec![]);
        w.set_items(items());
        w.on_key(KeyCode::Char(' '));
        w.on_key(KeyCode::Down);
        w.on_key(KeyCode::Char(' '));
        let effects = w.on_key(KeyCode::Enter);
        assert!(matches!(
            effects.as_slice(),
            [Effect::MediaChosen { urls, multiple: true, .. }] if urls.len() == 2
        ));
    }

    #[test]
    fn current_references_are_preselected() {
        let mut w =
            MediaPickerWidget::new("gallery".into(), true, vec!["https://cdn/b.png".into()]);
        w.set_items(items());
        assert_eq!(w.chosen, vec![false, true]);
    }

    #[test]
    fn escape_cancels_without_choice() {
        let mut w = MediaPickerWidget::new("cover".into(), false, vec![]);
        w.set_items(items());
        let effects = w.on_key(KeyCode::Esc);
        assert!(matches!(effects.as_slice(), [Effect::CloseOverlay]));
    }

    #[test]
    fn enter_while_loading_is_inert() {
        let mut w = MediaPickerWidget::new("cover".into(), false, vec![]);
        assert!(w.on_key(KeyCode::Enter).is_empty());
    }
}
