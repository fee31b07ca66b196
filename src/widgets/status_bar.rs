use ratatui::prelude::*;
use ratatui::text::{Line, Span};
use ratatui::widgets::*;

use crate::engine::autosave::SavePhase;
use crate::ui::AppState;

/// One-line footer: spinner for in-flight work, autosave indicator, toast,
/// editing flag, then the help text.
pub fn draw_footer(f: &mut Frame, area: Rect, state: &AppState, help_text: &str) {
    let mut spans: Vec<Span> = Vec::new();
    if state.saving || state.submitting || state.status_text.is_some() {
        let spinner = ["⠋", "⠙", "⠸", "⠴", "⠦", "⠇"][state.tick as usize % 6];
        let msg = state.status_text.as_deref().unwrap_or(if state.submitting {
            "guardando…"
        } else {
            "autoguardado…"
        });
        spans.push(Span::raw(format!(" {spinner} {msg}")));
        spans.push(Span::raw("  |  "));
    }

    match state.autosave.phase() {
        SavePhase::Error => {
            let err = state
                .autosave
                .last_error
                .as_deref()
                .unwrap_or("error de guardado");
            spans.push(Span::styled(
                format!("✗ {err}"),
                crate::theme::text_error(),
            ));
            spans.push(Span::raw("  |  "));
        }
        _ => {
            if state.autosave.has_unsaved_changes() || state.form.form.dirty {
                spans.push(Span::styled("● sin guardar", crate::theme::text_muted()));
                spans.push(Span::raw("  |  "));
            } else if state.autosave.last_saved_at.is_some() {
                spans.push(Span::styled("✓ guardado", crate::theme::text_success()));
                spans.push(Span::raw("  |  "));
            }
        }
    }

    if let Some(t) = &state.toast {
        let color = crate::theme::toast_color(t.level);
        let tag = match t.level {
            crate::ui::ToastLevel::Success => "[OK]",
            crate::ui::ToastLevel::Error => "[ERROR]",
            crate::ui::ToastLevel::Info => "[INFO]",
        };
        spans.push(Span::styled(
            format!("{tag} "),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ));
        spans.push(Span::styled(
            format!("{}  |  ", t.text),
            Style::default().fg(color),
        ));
    }

    if state.form.form.editing {
        spans.push(Span::raw("editando  |  "));
    }

    spans.push(Span::styled(
        help_text.to_string(),
        Style::default().fg(Color::DarkGray),
    ));
    let p = Paragraph::new(Line::from(spans));
    f.render_widget(p, area);
}
