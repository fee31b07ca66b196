use crate::engine::path;
use crate::services::cli_runner::{run_cmdline_to_json, run_cmdline_with_stdin_json};
use crate::ui::{LoadKind, LoadMsg, LoadOutcome, MediaItem};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::mpsc::Sender;
use std::sync::{Mutex, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

#[cfg(test)]
mod loader_tests;

/// Pull the record object out of a load envelope: `data.record`, then
/// `data`, then the whole payload.
fn record_from_envelope(v: JsonValue) -> JsonValue {
    if let Some(rec) = v.get("data").and_then(|d| d.get("record")) {
        return rec.clone();
    }
    if let Some(data) = v.get("data") {
        if data.is_object() {
            return data.clone();
        }
    }
    v
}

fn envelope_ok(v: &JsonValue) -> bool {
    v.get("ok").and_then(|b| b.as_bool()).unwrap_or(true)
}

fn envelope_error(v: &JsonValue) -> String {
    v.get("error")
        .and_then(|e| e.get("message"))
        .and_then(|m| m.as_str())
        .map(|s| s.to_string())
        .unwrap_or_else(|| v.to_string())
}

pub fn spawn_load_record(cmdline: String, tx: Sender<LoadMsg>) {
    thread::spawn(move || {
        let outcome = (|| -> Result<LoadOutcome, String> {
            let v = run_cmdline_to_json(&cmdline).map_err(|e| format!("{e}"))?;
            if !envelope_ok(&v) {
                return Err(envelope_error(&v));
            }
            Ok(LoadOutcome::Record(record_from_envelope(v)))
        })();
        let _ = tx.send(LoadMsg {
            key: "form:record".to_string(),
            outcome,
            kind: LoadKind::Record,
        });
    });
}

/// Autosave: stream the document to the save command on stdin. A backend
/// envelope with `ok: false` counts as a rejected save, not a transport
/// error.
pub fn spawn_save_document(cmdline: String, doc: JsonValue, tx: Sender<LoadMsg>) {
    thread::spawn(move || {
        let outcome = (|| -> Result<LoadOutcome, String> {
            let v = run_cmdline_with_stdin_json(&cmdline, &doc).map_err(|e| format!("{e}"))?;
            Ok(LoadOutcome::Saved(envelope_ok(&v)))
        })();
        let _ = tx.send(LoadMsg {
            key: "form:save".to_string(),
            outcome,
            kind: LoadKind::Save,
        });
    });
}

pub fn spawn_submit_document(cmdline: String, doc: JsonValue, tx: Sender<LoadMsg>) {
    thread::spawn(move || {
        let outcome = (|| -> Result<LoadOutcome, String> {
            let v = run_cmdline_with_stdin_json(&cmdline, &doc).map_err(|e| format!("{e}"))?;
            if !envelope_ok(&v) {
                return Err(envelope_error(&v));
            }
            Ok(LoadOutcome::Submitted(v))
        })();
        let _ = tx.send(LoadMsg {
            key: "form:submit".to_string(),
            outcome,
            kind: LoadKind::Submit,
        });
    });
}

// Dynamic select options fetched from a CLI command, with optional unwrap.
// unwrap formats supported:
// - None: defaults to data.items; array of strings or objects with id/title/name
// - "data.items": same as above
// - "data.items[].id/title": iterate array at data.items, value from id, label from title
static OPTIONS_CACHE: OnceLock<Mutex<HashMap<String, (Instant, Vec<(String, String)>)>>> =
    OnceLock::new();

fn options_cache() -> &'static Mutex<HashMap<String, (Instant, Vec<(String, String)>)>> {
    OPTIONS_CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

fn options_ttl() -> Option<Duration> {
    match std::env::var("FORMA_OPTIONS_TTL_SEC")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
    {
        Some(0) => None,
        Some(secs) => Some(Duration::from_secs(secs)),
        None => Some(Duration::from_secs(30)),
    }
}

pub fn spawn_load_options_cmd(
    cmdline: String,
    unwrap: Option<String>,
    key: String,
    force: bool,
    tx: Sender<LoadMsg>,
) {
    thread::spawn(move || {
        let outcome = (|| -> Result<LoadOutcome, String> {
            let cache_key = format!("{}|{}", cmdline, unwrap.clone().unwrap_or_default());
            let ttl = options_ttl();
            if !force {
                if let Some(ttl) = ttl {
                    if let Ok(map) = options_cache().lock() {
                        if let Some((ts, pairs)) = map.get(&cache_key) {
                            if ts.elapsed() <= ttl {
                                return Ok(LoadOutcome::Options(pairs.clone()));
                            }
                        }
                    }
                }
            }
            let v = run_cmdline_to_json(&cmdline).map_err(|e| format!("{e}"))?;
            let pairs = parse_options_from_json(&v, unwrap.as_deref());
            if ttl.is_some() {
                if let Ok(mut map) = options_cache().lock() {
                    map.insert(cache_key, (Instant::now(), pairs.clone()));
                }
            }
            Ok(LoadOutcome::Options(pairs))
        })();
        let _ = tx.send(LoadMsg {
            key,
            outcome,
            kind: LoadKind::FormOptions,
        });
    });
}

fn scalar_at(item: &JsonValue, p: &str) -> Option<String> {
    let v = path::get(item, p)?;
    v.as_str()
        .map(|s| s.to_string())
        .or_else(|| v.as_i64().map(|n| n.to_string()))
        .or_else(|| v.as_f64().map(|f| f.to_string()))
}

/// `(value, label)` pairs out of an options payload.
pub(crate) fn parse_options_from_json(
    v: &JsonValue,
    unwrap: Option<&str>,
) -> Vec<(String, String)> {
    let uw = unwrap.unwrap_or("data.items");
    let mut out: Vec<(String, String)> = Vec::new();
    if let Some(idx) = uw.find("[]") {
        let base = &uw[..idx];
        let rest = uw[idx + 2..].trim_start_matches('.');
        let (val_path, lbl_path) = if rest.is_empty() {
            ("id", "title")
        } else if let Some(slash) = rest.find('/') {
            (&rest[..slash], &rest[slash + 1..])
        } else {
            (rest, rest)
        };
        if let Some(arr) = path::get(v, base).and_then(|x| x.as_array()) {
            for item in arr {
                let val = scalar_at(item, val_path).unwrap_or_else(|| item.to_string());
                let lbl = scalar_at(item, lbl_path).unwrap_or_else(|| val.clone());
                out.push((val, lbl));
            }
        }
        return out;
    }
    if let Some(arr) = path::get(v, uw)
        .or_else(|| v.get("data").and_then(|d| d.get("items")))
        .and_then(|x| x.as_array())
    {
        for item in arr {
            if let Some(s) = item.as_str() {
                out.push((s.to_string(), s.to_string()));
            } else if let Some(obj) = item.as_object() {
                let val = obj
                    .get("id")
                    .and_then(|x| x.as_str())
                    .or_else(|| obj.get("value").and_then(|x| x.as_str()))
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| item.to_string());
                let lbl = obj
                    .get("title")
                    .and_then(|x| x.as_str())
                    .or_else(|| obj.get("name").and_then(|x| x.as_str()))
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| val.clone());
                out.push((val, lbl));
            }
        }
    }
    out
}

pub(crate) fn parse_media_from_json(v: &JsonValue) -> Vec<MediaItem> {
    let arr = v
        .get("data")
        .and_then(|d| d.get("items"))
        .or_else(|| v.get("items"))
        .and_then(|x| x.as_array());
    let mut out = Vec::new();
    if let Some(arr) = arr {
        for item in arr {
            if let Some(url) = item.as_str() {
                out.push(MediaItem {
                    url: url.to_string(),
                    title: None,
                });
            } else if let Some(url) = item.get("url").and_then(|u| u.as_str()) {
                out.push(MediaItem {
                    url: url.to_string(),
                    title: item
                        .get("title")
                        .and_then(|t| t.as_str())
                        .map(|s| s.to_string()),
                });
            }
        }
    }
    out
}

pub fn spawn_load_media(cmdline: String, tx: Sender<LoadMsg>) {
    thread::spawn(move || {
        let outcome = (|| -> Result<LoadOutcome, String> {
            let v = run_cmdline_to_json(&cmdline).map_err(|e| format!("{e}"))?;
            if !envelope_ok(&v) {
                return Err(envelope_error(&v));
            }
            Ok(LoadOutcome::Media(parse_media_from_json(&v)))
        })();
        let _ = tx.send(LoadMsg {
            key: "form:media".to_string(),
            outcome,
            kind: LoadKind::Media,
        });
    });
}
