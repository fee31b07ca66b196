use crate::ui::{AppState, LoadOutcome, ToastLevel};
use serde_json::Value as JsonValue;


/// Messages pumped from worker threads back into the update loop.
pub enum AppMsg {
    LoadedRecord {
        outcome: Result<LoadOutcome, String>,
    },
    SaveDone {
        outcome: Result<LoadOutcome, String>,
    },
    SubmitDone {
        outcome: Result<LoadOutcome, String>,
    },
    LoadedFormOptions {
        key: String,
        outcome: Result<LoadOutcome, String>,
    },
    LoadedMedia {
        outcome: Result<LoadOutcome, String>,
    },
}

/// Side effects requested by `update` or by widget key handlers. The loop
/// in `ui::run_effects` executes them; anything that talks to a backend
/// command runs on a worker thread.
pub enum Effect {
    /// The document changed; arms the autosave debounce.
    DocChanged,
    /// Manual save (Ctrl+S): bypasses the debounce.
    SaveNow,
    /// Validated submit of the full document.
    SubmitDoc,
    LoadRecord {
        cmdline: String,
    },
    LoadFormOptions {
        field: String,
        cmdline: String,
        unwrap: Option<String>,
        force: bool,
    },
    OpenMedia {
        path: String,
        multiple: bool,
    },
    MediaChosen {
        path: String,
        urls: Vec<String>,
        multiple: bool,
    },
    OpenPreview,
    CloseOverlay,
    ShowToast {
        text: String,
        level: ToastLevel,
        seconds: u64,
    },
    Quit,
}

pub fn update(state: &mut AppState, msg: AppMsg) -> Vec<Effect> {
    use AppMsg::*;
    let mut effects: Vec<Effect> = Vec::new();
    match msg {
        LoadedRecord { outcome } => match outcome {
            Ok(LoadOutcome::Record(v)) => {
                state.dbg("loaded record".to_string());
                state.form.form.load_record(v);
                state.autosave.reset();
                state.status_text = None;
            }
            Ok(_) => {
                state.dbg("load record: unexpected payload".to_string());
                state.status_text = None;
            }
            Err(e) => {
                state.dbg(format!("load record error: {e}"));
                state.status_text = None;
                effects.push(Effect::ShowToast {
                    text: format!("No se pudo cargar el registro: {e}"),
                    level: ToastLevel::Error,
                    seconds: 5,
                });
            }
        },
        SaveDone { outcome } => {
            state.saving = false;
            match outcome {
                Ok(LoadOutcome::Saved(true)) => {
                    state.dbg("autosave ok".to_string());
                    state.autosave.complete(Ok(()));
                    state.form.form.capture_initial();
                }
                Ok(LoadOutcome::Saved(false)) => {
                    state.dbg("autosave rejected".to_string());
                    state
                        .autosave
                        .complete(Err("guardado rechazado".to_string()));
                }
                Ok(_) => {
                    state.autosave.complete(Err("respuesta inesperada".to_string()));
                }
                Err(e) => {
                    // Footer indicator only; a toast per failed autosave would
                    // nag while the backend is down.
                    state.dbg(format!("autosave error: {e}"));
                    state.autosave.complete(Err(e));
                }
            }
        }
        SubmitDone { outcome } => {
            state.submitting = false;
            state.form.form.disabled = false;
            match outcome {
                Ok(LoadOutcome::Submitted(_)) => {
                    state.form.form.capture_initial();
                    state.form.form.message = None;
                    state.autosave.reset();
                    effects.push(Effect::ShowToast {
                        text: "Guardado correctamente".to_string(),
                        level: ToastLevel::Success,
                        seconds: 3,
                    });
                }
                Ok(_) | Err(_) => {
                    let e = match outcome {
                        Err(e) => e,
                        _ => "respuesta inesperada".to_string(),
                    };
                    state.dbg(format!("submit error: {e}"));
                    effects.push(Effect::ShowToast {
                        text: format!("Error al guardar: {e}"),
                        level: ToastLevel::Error,
                        seconds: 5,
                    });
                }
            }
        }
        LoadedFormOptions { key, outcome } => {
            if let Some(field_path) = crate::nav::keys::field_from_options_key(&key) {
                match outcome {
                    Ok(LoadOutcome::Options(pairs)) => {
                        state.dbg(format!(
                            "options for {field_path}: {} items",
                            pairs.len()
                        ));
                        let options = pairs
                            .into_iter()
                            .map(|(value, label)| crate::model::SelectOption::Pair {
                                label,
                                value,
                            })
                            .collect();
                        state.form.form.dyn_options.insert(
                            field_path.to_string(),
                            crate::widgets::form::DynOptions {
                                options,
                                loaded_at: std::time::Instant::now(),
                            },
                        );
                    }
                    Ok(_) => {}
                    Err(e) => {
                        state.dbg(format!("options error for {field_path}: {e}"));
                        effects.push(Effect::ShowToast {
                            text: format!("No se pudieron cargar opciones: {e}"),
                            level: ToastLevel::Error,
                            seconds: 4,
                        });
                    }
                }
            }
            state.status_text = None;
        }
        LoadedMedia { outcome } => {
            if let Some(overlay) = state.overlay.as_mut() {
                if let Some(picker) = overlay
                    .as_any_mut()
                    .downcast_mut::<crate::widgets::media_picker::MediaPickerWidget>()
                {
                    match outcome {
                        Ok(LoadOutcome::Media(items)) => picker.set_items(items),
                        Ok(_) => picker.set_error("respuesta inesperada".to_string()),
                        Err(e) => picker.set_error(e),
                    }
                }
            }
        }
    }
    effects
}

/// Apply a media picker choice to the document. Single-reference fields
/// take the first URL as a plain string; multi-reference fields take the
/// whole list.
pub fn media_value(urls: Vec<String>, multiple: bool) -> JsonValue {
    if multiple {
        JsonValue::Array(urls.into_iter().map(JsonValue::String).collect())
    } else {
        urls.into_iter()
            .next()
            .map(JsonValue::String)
            .unwrap_or(JsonValue::Null)
    }
}
