use anyhow::{anyhow, Context, Result};
use regex::Regex;
use serde_json::Value as JsonValue;
use std::io::Write;
use std::process::{Command, Stdio};
use std::{collections::HashMap, env};

/// Expand `${VAR}` from the environment; `${APP_BIN}` maps to FORMA_APP_BIN
/// (quoted if it contains whitespace) or the default backend binary.
pub fn expand_cmdline_env(cmdline: &str) -> String {
    let re = Regex::new(r"\$\{([A-Z0-9_]+)\}").unwrap();
    let env_map: HashMap<String, String> = env::vars().collect();
    re.replace_all(cmdline, |caps: &regex::Captures| {
        let key = &caps[1];
        if key == "APP_BIN" {
            if let Some(v) = env_map.get("FORMA_APP_BIN") {
                // Quote so shlex keeps it a single argument
                let needs_quote = v.chars().any(|c| c.is_whitespace());
                if needs_quote {
                    let escaped = v.replace('"', "\\\"");
                    return format!("\"{escaped}\"");
                }
                return v.to_string();
            }
            return "forma-backend".to_string();
        }
        env_map.get(key).cloned().unwrap_or_default()
    })
    .to_string()
}

fn split_cmdline(cmdline: &str) -> Result<Vec<String>> {
    let expanded = expand_cmdline_env(cmdline);
    let parts = shlex::split(&expanded).ok_or_else(|| anyhow!("Failed to parse command line"))?;
    if parts.is_empty() {
        return Err(anyhow!("Empty command line"));
    }
    Ok(parts)
}

pub fn run_cmdline_to_json(cmdline: &str) -> Result<JsonValue> {
    let parts = split_cmdline(cmdline)?;
    let output = Command::new(&parts[0])
        .args(&parts[1..])
        .env("FORMA_JSON", "1")
        .output()
        .with_context(|| format!("spawning {cmdline}"))?;
    if !output.status.success() {
        let err = String::from_utf8_lossy(&output.stderr).to_string();
        return Err(anyhow!("Command failed: {}\n{}", cmdline, err));
    }
    let text = String::from_utf8_lossy(&output.stdout).to_string();
    let v: JsonValue = serde_json::from_str(&text).with_context(|| "parsing command JSON")?;
    Ok(v)
}

/// Run a backend command feeding `payload` as JSON on stdin. Used for save
/// and submit, where the whole document travels to the collaborator.
///
/// An empty stdout from a zero exit is treated as `{"ok": true}`. On a
/// nonzero exit, stderr is tried as a JSON error envelope first so the
/// caller can surface the backend's own message.
pub fn run_cmdline_with_stdin_json(cmdline: &str, payload: &JsonValue) -> Result<JsonValue> {
    let parts = split_cmdline(cmdline)?;
    let mut child = Command::new(&parts[0])
        .args(&parts[1..])
        .env("FORMA_JSON", "1")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("spawning {cmdline}"))?;
    if let Some(mut stdin) = child.stdin.take() {
        let body = serde_json::to_string(payload)?;
        stdin
            .write_all(body.as_bytes())
            .with_context(|| "writing document to stdin")?;
    }
    let output = child
        .wait_with_output()
        .with_context(|| format!("waiting for {cmdline}"))?;
    if output.status.success() {
        let text = String::from_utf8_lossy(&output.stdout);
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(serde_json::json!({"ok": true}));
        }
        let v: JsonValue =
            serde_json::from_str(trimmed).with_context(|| "parsing command JSON")?;
        Ok(v)
    } else {
        let err_text = String::from_utf8_lossy(&output.stderr).to_string();
        if let Ok(v) = serde_json::from_str::<JsonValue>(&err_text) {
            Ok(v)
        } else {
            Err(anyhow!("Command failed: {}\n{}", cmdline, err_text))
        }
    }
}
