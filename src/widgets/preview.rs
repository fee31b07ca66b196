use crate::app::Effect;
use crate::ui::ToastLevel;
use crate::widgets::chrome::panel_block;
use crossterm::event::KeyCode;
use ratatui::prelude::*;
use ratatui::widgets::*;
use serde_json::Value as JsonValue;
use std::sync::OnceLock;

use syntect::easy::HighlightLines;
use syntect::highlighting::{Style as SynStyle, Theme, ThemeSet};
use syntect::parsing::SyntaxSet;

/// Read-only preview of the current document as highlighted JSON. `y`
/// copies the raw text to the clipboard; Esc returns to the form.
pub struct PreviewWidget {
    title: String,
    lines: Vec<Line<'static>>,
    raw: String,
    scroll_y: u16,
    last_viewport_h: u16,
}

impl PreviewWidget {
    pub fn new(doc: &JsonValue, template: Option<&str>) -> Self {
        let raw = serde_json::to_string_pretty(doc).unwrap_or_else(|_| doc.to_string());
        let lines = highlight_json(&raw);
        let title = match template {
            Some(t) => format!("Vista previa — {t}"),
            None => "Vista previa".to_string(),
        };
        Self {
            title,
            lines,
            raw,
            scroll_y: 0,
            last_viewport_h: 0,
        }
    }
}

static SYNTAX_SET: OnceLock<SyntaxSet> = OnceLock::new();
static THEME_SET: OnceLock<ThemeSet> = OnceLock::new();
static THEME: OnceLock<Theme> = OnceLock::new();

fn get_syntax_set() -> &'static SyntaxSet {
    SYNTAX_SET.get_or_init(SyntaxSet::load_defaults_newlines)
}
fn get_theme() -> &'static Theme {
    THEME.get_or_init(|| {
        let ts = THEME_SET.get_or_init(ThemeSet::load_defaults);
        ts.themes
            .get("base16-ocean.dark")
            .cloned()
            .unwrap_or_else(|| ts.themes.values().next().cloned().unwrap_or_default())
    })
}

fn syn_to_tui_color(c: syntect::highlighting::Color) -> Color {
    Color::Rgb(c.r, c.g, c.b)
}

fn highlight_json(text: &str) -> Vec<Line<'static>> {
    let ps = get_syntax_set();
    let syn = ps
        .find_syntax_by_token("json")
        .unwrap_or_else(|| ps.find_syntax_plain_text());
    let mut high = HighlightLines::new(syn, get_theme());
    let mut out: Vec<Line<'static>> = Vec::new();
    for line in text.split('\n') {
        let regions: Vec<(SynStyle, &str)> = high.highlight_line(line, ps).unwrap_or_default();
        let mut spans: Vec<Span<'static>> = Vec::new();
        for (st, seg) in regions {
            let mut style = Style::default().fg(syn_to_tui_color(st.foreground));
            if st
                .font_style
                .contains(syntect::highlighting::FontStyle::BOLD)
            {
                style = style.add_modifier(Modifier::BOLD);
            }
            spans.push(Span::styled(seg.to_string(), style));
        }
        out.push(Line::from(spans));
    }
    out
}

impl super::Widget for PreviewWidget {
    fn render(&mut self, f: &mut Frame, area: Rect, focused: bool, _tick: u64) {
        self.last_viewport_h = area.height.saturating_sub(2);
        let max_scroll = (self.lines.len() as u16).saturating_sub(self.last_viewport_h);
        if self.scroll_y > max_scroll {
            self.scroll_y = max_scroll;
        }
        let block = panel_block(&self.title, focused);
        let p = Paragraph::new(self.lines.clone())
            .block(block)
            .scroll((self.scroll_y, 0));
        f.render_widget(p, area);
    }

    fn on_key(&mut self, key: KeyCode) -> Vec<Effect> {
        match key {
            KeyCode::Up => {
                self.scroll_y = self.scroll_y.saturating_sub(1);
            }
            KeyCode::Down => {
                self.scroll_y = self.scroll_y.saturating_add(1);
            }
            KeyCode::PageUp => {
                self.scroll_y = self.scroll_y.saturating_sub(self.last_viewport_h);
            }
            KeyCode::PageDown => {
                self.scroll_y = self.scroll_y.saturating_add(self.last_viewport_h);
            }
            KeyCode::Home => {
                self.scroll_y = 0;
            }
            KeyCode::End => {
                self.scroll_y = (self.lines.len() as u16).saturating_sub(self.last_viewport_h);
            }
            KeyCode::Char('y') => {
                let copied = arboard::Clipboard::new()
                    .and_then(|mut cb| cb.set_text(self.raw.clone()))
                    .is_ok();
                let (text, level) = if copied {
                    ("Documento copiado al portapapeles".to_string(), ToastLevel::Success)
                } else {
                    ("No se pudo acceder al portapapeles".to_string(), ToastLevel::Error)
                };
                return vec![Effect::ShowToast {
                    text,
                    level,
                    seconds: 3,
                }];
            }
            KeyCode::Esc => return vec![Effect::CloseOverlay],
            _ => {}
        }
        Vec::new()
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::widgets::Widget as _;
    use serde_json::json;

    #[test]
    fn preview_renders_document_lines() {
        let doc = json!({"title": "Hola", "tags": ["a", "b"]});
        let w = PreviewWidget::new(&doc, Some("articulo"));
        assert!(w.title.contains("articulo"));
        assert!(w.raw.contains("\"title\""));
        assert!(w.lines.len() >= 4);
    }

    #[test]
    fn escape_closes_overlay() {
        let mut w = PreviewWidget::new(&json!({}), None);
        let effects = w.on_key(KeyCode::Esc);
        assert!(matches!(effects.as_slice(), [Effect::CloseOverlay]));
    }

    #[test]
    fn scroll_keys_move_viewport() {
        let doc = json!({"a": 1, "b": 2, "c": 3});
        let mut w = PreviewWidget::new(&doc, None);
        w.last_viewport_h = 2;
        w.on_key(KeyCode::Down);
        assert_eq!(w.scroll_y, 1);
        w.on_key(KeyCode::Home);
        assert_eq!(w.scroll_y, 0);
    }
}
