use crate::app::{media_value, update, AppMsg, Effect};
use crate::engine::autosave::Autosave;
use crate::engine::path;
use crate::model::{validate_form_config, FormConfig, FormMode};
use crate::widgets::chrome::panel_block;
use crate::widgets::form_widget::FormWidget;
use crate::widgets::media_picker::MediaPickerWidget;
use crate::widgets::preview::PreviewWidget;
use crate::widgets::status_bar::draw_footer;
use crate::widgets::{centered_rect, Widget};
use anyhow::{anyhow, Context, Result};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::prelude::*;
use ratatui::widgets::*;
use serde_json::Value as JsonValue;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Success,
    Error,
}

pub struct Toast {
    pub text: String,
    pub level: ToastLevel,
    pub expires_at_tick: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadKind {
    Record,
    Save,
    Submit,
    FormOptions,
    Media,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MediaItem {
    pub url: String,
    pub title: Option<String>,
}

/// Result payloads from the worker threads in `services::loader`.
pub enum LoadOutcome {
    Record(JsonValue),
    Saved(bool),
    Submitted(JsonValue),
    Options(Vec<(String, String)>),
    Media(Vec<MediaItem>),
}

pub struct LoadMsg {
    pub key: String,
    pub outcome: Result<LoadOutcome, String>,
    pub kind: LoadKind,
}

pub(crate) struct AppState {
    pub(crate) form: FormWidget,
    pub(crate) overlay: Option<Box<dyn Widget>>,
    pub(crate) autosave: Autosave,
    pub(crate) saving: bool,
    pub(crate) submitting: bool,
    pub(crate) status_text: Option<String>,
    pub(crate) toast: Option<Toast>,
    pub(crate) tick: u64,
    pub(crate) should_quit: bool,
    pub(crate) boot_load_done: bool,
    tx: Option<Sender<LoadMsg>>,
    rx: Option<Receiver<LoadMsg>>,
    pub(crate) debug_log: VecDeque<String>,
}

impl AppState {
    pub(crate) fn new(config: FormConfig) -> Self {
        let autosave = Autosave::new(
            Duration::from_millis(config.options.auto_save_interval_ms),
            config.options.enable_auto_save && config.save_cmd.is_some(),
        );
        Self {
            form: FormWidget::new(config),
            overlay: None,
            autosave,
            saving: false,
            submitting: false,
            status_text: None,
            toast: None,
            tick: 0,
            should_quit: false,
            boot_load_done: false,
            tx: None,
            rx: None,
            debug_log: VecDeque::new(),
        }
    }

    pub fn dbg(&mut self, msg: impl Into<String>) {
        const MAX_LOG_LINES: usize = 200;
        if self.debug_log.len() >= MAX_LOG_LINES {
            self.debug_log.pop_front();
        }
        self.debug_log.push_back(msg.into());
    }
}

fn start_save(state: &mut AppState) {
    let Some(cmdline) = state.form.form.config.save_cmd.clone() else {
        return;
    };
    state.saving = true;
    state.dbg("autosave: dispatching".to_string());
    if let Some(tx) = &state.tx {
        crate::services::loader::spawn_save_document(
            cmdline,
            state.form.form.doc.clone(),
            tx.clone(),
        );
    }
}

pub(crate) fn run_effects(state: &mut AppState, effects: Vec<Effect>) {
    for eff in effects {
        match eff {
            Effect::DocChanged => {
                state.autosave.note_mutation();
            }
            Effect::SaveNow => {
                if state.form.form.config.save_cmd.is_none() {
                    run_effects(
                        state,
                        vec![Effect::ShowToast {
                            text: "No hay comando de guardado configurado".to_string(),
                            level: ToastLevel::Info,
                            seconds: 3,
                        }],
                    );
                } else if state.autosave.force() {
                    start_save(state);
                }
            }
            Effect::SubmitDoc => {
                let Some(cmdline) = state.form.form.config.submit_cmd.clone() else {
                    run_effects(
                        state,
                        vec![Effect::ShowToast {
                            text: "No hay comando de envío configurado".to_string(),
                            level: ToastLevel::Error,
                            seconds: 4,
                        }],
                    );
                    continue;
                };
                state.dbg(format!("submit :: {cmdline}"));
                state.submitting = true;
                state.form.form.disabled = true;
                state.form.form.editing = false;
                state.form.form.message = Some("Guardando…".to_string());
                if let Some(tx) = &state.tx {
                    crate::services::loader::spawn_submit_document(
                        cmdline,
                        state.form.form.doc.clone(),
                        tx.clone(),
                    );
                }
            }
            Effect::LoadRecord { cmdline } => {
                state.dbg(format!("load record :: {cmdline}"));
                state.status_text = Some("Cargando registro…".to_string());
                if let Some(tx) = &state.tx {
                    crate::services::loader::spawn_load_record(cmdline, tx.clone());
                }
            }
            Effect::LoadFormOptions {
                field,
                cmdline,
                unwrap,
                force,
            } => {
                state.dbg(format!(
                    "load options field={field} cmd={cmdline} force={force}"
                ));
                if let Some(tx) = &state.tx {
                    state.status_text = Some(format!("Cargando opciones: {field}"));
                    crate::services::loader::spawn_load_options_cmd(
                        cmdline,
                        unwrap,
                        crate::nav::keys::options_key(&field),
                        force,
                        tx.clone(),
                    );
                }
            }
            Effect::OpenMedia { path, multiple } => {
                let Some(cmdline) = state.form.form.config.media_cmd.clone() else {
                    run_effects(
                        state,
                        vec![Effect::ShowToast {
                            text: "No hay comando de medios configurado".to_string(),
                            level: ToastLevel::Error,
                            seconds: 4,
                        }],
                    );
                    continue;
                };
                let current = match path::get(&state.form.form.doc, &path) {
                    Some(JsonValue::String(s)) => vec![s.clone()],
                    Some(JsonValue::Array(a)) => a
                        .iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect(),
                    _ => Vec::new(),
                };
                state.dbg(format!("open media picker for {path}"));
                state.overlay = Some(Box::new(MediaPickerWidget::new(path, multiple, current)));
                if let Some(tx) = &state.tx {
                    crate::services::loader::spawn_load_media(cmdline, tx.clone());
                }
            }
            Effect::MediaChosen {
                path,
                urls,
                multiple,
            } => {
                state.form.form.set_value(&path, media_value(urls, multiple));
                state.autosave.note_mutation();
                state.overlay = None;
            }
            Effect::OpenPreview => {
                let template = state.form.form.config.preview_template.clone();
                state.overlay = Some(Box::new(PreviewWidget::new(
                    &state.form.form.doc,
                    template.as_deref(),
                )));
            }
            Effect::CloseOverlay => {
                state.overlay = None;
            }
            Effect::ShowToast {
                text,
                level,
                seconds,
            } => {
                let ticks = seconds.saturating_mul(5); // ~200ms tick
                state.toast = Some(Toast {
                    text,
                    level,
                    expires_at_tick: state.tick.saturating_add(ticks),
                });
            }
            Effect::Quit => {
                state.should_quit = true;
            }
        }
    }
}

fn pump_messages(state: &mut AppState) {
    let mut drained: Vec<LoadMsg> = Vec::new();
    if let Some(rx) = &state.rx {
        while let Ok(msg) = rx.try_recv() {
            drained.push(msg);
        }
    }
    for msg in drained {
        let LoadMsg { key, outcome, kind } = msg;
        let effects = match kind {
            LoadKind::Record => update(state, AppMsg::LoadedRecord { outcome }),
            LoadKind::Save => update(state, AppMsg::SaveDone { outcome }),
            LoadKind::Submit => update(state, AppMsg::SubmitDone { outcome }),
            LoadKind::FormOptions => update(state, AppMsg::LoadedFormOptions { key, outcome }),
            LoadKind::Media => update(state, AppMsg::LoadedMedia { outcome }),
        };
        run_effects(state, effects);
    }
}

fn on_tick(state: &mut AppState) {
    state.tick = state.tick.wrapping_add(1);
    if let Some(t) = &state.toast {
        if t.expires_at_tick <= state.tick {
            state.toast = None;
        }
    }
    if state.autosave.take_due() {
        start_save(state);
    }
}

/// Resolve the form definition: FORMA_FORM wins, then FORMA_CONFIG_DIR/form.yaml,
/// then ./form.yaml.
fn config_path() -> PathBuf {
    if let Ok(p) = std::env::var("FORMA_FORM") {
        return PathBuf::from(p);
    }
    if let Ok(dir) = std::env::var("FORMA_CONFIG_DIR") {
        return PathBuf::from(dir).join("form.yaml");
    }
    PathBuf::from("form.yaml")
}

fn load_config() -> Result<FormConfig> {
    let path = config_path();
    let s = std::fs::read_to_string(&path)
        .with_context(|| format!("reading form config {}", path.display()))?;
    let cfg: FormConfig = serde_yaml::from_str(&s).map_err(|e| {
        if let Some(loc) = e.location() {
            anyhow!("{}:{}:{}: {}", path.display(), loc.line(), loc.column(), e)
        } else {
            anyhow!("{}: {}", path.display(), e)
        }
    })?;
    validate_form_config(&cfg).map_err(|e| anyhow!("{}: {}", path.display(), e))?;
    Ok(cfg)
}

fn help_text(state: &AppState) -> &'static str {
    if state.overlay.is_some() {
        "↑/↓ navega · Enter acepta · Esc cierra"
    } else if state.form.form.editing {
        "Enter guarda el campo · Esc cancela"
    } else {
        "↑/↓ navega · Enter edita · Tab grupo · Ctrl+S guarda · Ctrl+C sale"
    }
}

fn ui(f: &mut Frame, state: &mut AppState) {
    let chunks = Layout::vertical([Constraint::Min(3), Constraint::Length(1)]).split(f.area());

    let err_count = state.form.form.validation.error_count();
    let show_panel = state.form.form.config.options.show_validation_panel && err_count > 0;
    let body = chunks[0];
    let tick = state.tick;
    let focused = state.overlay.is_none();
    if show_panel {
        let cols =
            Layout::horizontal([Constraint::Percentage(70), Constraint::Percentage(30)])
                .split(body);
        state.form.render(f, cols[0], focused, tick);
        let errors = state.form.form.validation.errors();
        let mut lines: Vec<Line> = Vec::new();
        for (p, e) in &errors {
            lines.push(Line::from(vec![
                Span::styled(format!("{p}: "), crate::theme::text_muted()),
                Span::styled(e.clone(), crate::theme::text_error()),
            ]));
        }
        let block = panel_block("Errores", false);
        f.render_widget(Paragraph::new(lines).block(block).wrap(Wrap { trim: true }), cols[1]);
    } else {
        state.form.render(f, body, focused, tick);
    }

    if let Some(overlay) = state.overlay.as_mut() {
        let rect = centered_rect(70, 70, f.area());
        f.render_widget(Clear, rect);
        overlay.render(f, rect, true, tick);
    }

    draw_footer(f, chunks[1], state, help_text(state));
}

fn boot_effects(state: &AppState) -> Vec<Effect> {
    let cfg = &state.form.form.config;
    if cfg.options.mode == FormMode::Edit {
        if let Some(cmdline) = cfg.load_cmd.clone() {
            return vec![Effect::LoadRecord { cmdline }];
        }
    }
    Vec::new()
}

fn handle_key(state: &mut AppState, code: KeyCode, modifiers: KeyModifiers) {
    let shortcuts = state.form.form.config.options.enable_keyboard_shortcuts;
    if modifiers.contains(KeyModifiers::CONTROL) {
        match code {
            KeyCode::Char('s') => {
                // Inside the multi-line editor Ctrl+S commits the field;
                // that commit path stays live even with shortcuts off.
                // Only the manual save is gated by the flag.
                let effects = state.form.commit_area();
                if !effects.is_empty() {
                    run_effects(state, effects);
                } else if shortcuts {
                    run_effects(state, vec![Effect::SaveNow]);
                }
                return;
            }
            KeyCode::Char('p') if shortcuts && state.overlay.is_none() => {
                run_effects(state, vec![Effect::OpenPreview]);
                return;
            }
            _ => return,
        }
    }
    let effects = if let Some(overlay) = state.overlay.as_mut() {
        overlay.on_key(code)
    } else {
        state.form.on_key(code)
    };
    run_effects(state, effects);
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes"))
        .unwrap_or(false)
}

pub fn run() -> Result<()> {
    let cfg = load_config()?;
    let mut state = AppState::new(cfg);
    let (tx, rx) = mpsc::channel::<LoadMsg>();
    state.tx = Some(tx);
    state.rx = Some(rx);

    // Headless smoke mode: render to a test backend for N ticks and emit a
    // machine-readable summary, so CI can exercise the whole loop.
    let headless = env_flag("FORMA_HEADLESS");
    let headless_ticks: u64 = std::env::var("FORMA_TICKS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(10);
    let headless_summary = env_flag("FORMA_SMOKE_SUMMARY");
    if headless {
        let backend = ratatui::backend::TestBackend::new(80, 24);
        let mut terminal = Terminal::new(backend)?;
        for _ in 0..headless_ticks {
            if !state.boot_load_done {
                let effs = boot_effects(&state);
                run_effects(&mut state, effs);
                state.boot_load_done = true;
            }
            terminal.draw(|f| ui(f, &mut state))?;
            pump_messages(&mut state);
            on_tick(&mut state);
            std::thread::sleep(Duration::from_millis(200));
        }
        if headless_summary {
            let form = &state.form.form;
            let summary = serde_json::json!({
                "ok": true,
                "title": form.config.title,
                "rows": form.rows.len(),
                "errors": form.validation.error_count(),
                "dirty": form.dirty,
                "saved": state.autosave.last_saved_at.is_some(),
            });
            println!("{summary}");
        }
        return Ok(());
    }

    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    let tick_rate = Duration::from_millis(200);
    let mut last_tick = Instant::now();
    let res = loop {
        if !state.boot_load_done {
            let effs = boot_effects(&state);
            run_effects(&mut state, effs);
            state.boot_load_done = true;
        }
        if let Err(e) = terminal.draw(|f| ui(f, &mut state)) {
            break Err(e.into());
        }
        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_millis(0));
        match event::poll(timeout) {
            Ok(true) => match event::read() {
                Ok(Event::Key(key)) => {
                    if key.code == KeyCode::Char('c')
                        && key.modifiers.contains(KeyModifiers::CONTROL)
                    {
                        break Ok(());
                    }
                    handle_key(&mut state, key.code, key.modifiers);
                }
                Ok(_) => {}
                Err(e) => break Err(e.into()),
            },
            Ok(false) => {}
            Err(e) => break Err(e.into()),
        }
        pump_messages(&mut state);
        if last_tick.elapsed() >= tick_rate {
            on_tick(&mut state);
            last_tick = Instant::now();
        }
        if state.should_quit {
            break Ok(());
        }
    };
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    res
}
