//! Notify command: the producer side of the bridge.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde_json::{Map, Value};

use crate::cli::args::NotifyEvent;
use crate::hooks::{EventKind, HookEvent, write_event};

/// Exit codes become integers when they parse, strings otherwise.
/// Empty values (an unset `$EXIT_CODE`) are dropped.
fn exit_code_value(raw: Option<String>) -> Option<Value> {
    let raw = raw?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(match trimmed.parse::<i64>() {
        Ok(code) => Value::from(code),
        Err(_) => Value::from(raw),
    })
}

/// Tool input is kept as structured JSON when it is valid JSON.
fn input_value(raw: Option<String>) -> Option<Value> {
    let raw = raw?;
    if raw.trim().is_empty() {
        return None;
    }
    Some(serde_json::from_str(&raw).unwrap_or(Value::String(raw)))
}

fn parse_extra_data(raw: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str::<Value>(raw).context("--data is not valid JSON")? {
        Value::Object(map) => Ok(map),
        other => bail!("--data must be a JSON object, got {other}"),
    }
}

/// Build the event for `verb`, merging `extra` (verb keys win).
pub fn build_event(
    session: Option<&str>,
    extra: Option<&str>,
    verb: NotifyEvent,
) -> Result<HookEvent> {
    let (kind, fields): (EventKind, Vec<(&str, Option<Value>)>) = match verb {
        NotifyEvent::SessionStart => (EventKind::SessionStart, vec![]),
        NotifyEvent::SessionStop { exit_code } => (
            EventKind::SessionStop,
            vec![("exit_code", exit_code_value(exit_code))],
        ),
        NotifyEvent::Prompt { text } => (
            EventKind::PromptSubmit,
            vec![("prompt", Some(Value::String(text)))],
        ),
        NotifyEvent::ToolStart { tool, input } => (
            EventKind::ToolStart,
            vec![
                ("tool", Some(Value::String(tool))),
                ("input", input_value(input)),
            ],
        ),
        NotifyEvent::ToolComplete { tool, exit_code } => (
            EventKind::ToolComplete,
            vec![
                ("tool", Some(Value::String(tool))),
                ("exit_code", exit_code_value(exit_code)),
            ],
        ),
        NotifyEvent::Error { message } => (
            EventKind::Error,
            vec![("message", Some(Value::String(message)))],
        ),
        NotifyEvent::Heartbeat => (EventKind::Heartbeat, vec![]),
    };

    let mut event = HookEvent::new(kind);
    if let Some(session) = session {
        event = event.with_session(session);
    }
    if let Some(raw) = extra {
        event.data = parse_extra_data(raw)?;
    }
    for (key, value) in fields {
        if let Some(value) = value {
            event.data.insert(key.to_string(), value);
        }
    }

    Ok(event)
}

/// Run notify command - write one event file into `hooks_dir`.
pub fn run(
    session: Option<&str>,
    hooks_dir: &Path,
    data: Option<&str>,
    verb: NotifyEvent,
) -> Result<PathBuf> {
    let event = build_event(session, data, verb)?;
    let kind = event.kind.clone();

    let path = write_event(hooks_dir, event)
        .with_context(|| format!("failed to deliver {kind} event"))?;

    crate::debug_event!("notify", "wrote", "{}", path.display());
    Ok(path)
}
