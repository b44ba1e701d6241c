//! Hook event model and the producer side of the file contract.
//!
//! External tools emit one JSON file per notification into a session
//! directory. File names are `<nanos>_<type>.json`, where `<nanos>` is a
//! strictly increasing key so lexicographic order matches write order.

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::error::HookError;

/// Extension recognised by the scanner. Matched exactly, case-sensitive.
pub const EVENT_FILE_EXTENSION: &str = "json";

/// Attempts at finding a free file name before giving up.
const MAX_NAME_ATTEMPTS: usize = 16;

/// Last key handed out by [`next_file_key`].
static LAST_FILE_KEY: AtomicI64 = AtomicI64::new(0);

/// Kind of lifecycle notification.
///
/// Strings that do not name a known kind are kept verbatim in
/// [`EventKind::Other`] so newer producers still flow through.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    SessionStart,
    SessionStop,
    PromptSubmit,
    ToolStart,
    ToolComplete,
    Error,
    Heartbeat,
    Other(String),
}

impl EventKind {
    /// Wire name of this kind.
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::SessionStart => "session_start",
            EventKind::SessionStop => "session_stop",
            EventKind::PromptSubmit => "prompt_submit",
            EventKind::ToolStart => "tool_start",
            EventKind::ToolComplete => "tool_complete",
            EventKind::Error => "error",
            EventKind::Heartbeat => "heartbeat",
            EventKind::Other(name) => name,
        }
    }

    /// Whether this kind is one the bridge knows about.
    pub fn is_known(&self) -> bool {
        !matches!(self, EventKind::Other(_))
    }
}

impl From<&str> for EventKind {
    fn from(s: &str) -> Self {
        match s {
            "session_start" => EventKind::SessionStart,
            "session_stop" => EventKind::SessionStop,
            "prompt_submit" => EventKind::PromptSubmit,
            "tool_start" => EventKind::ToolStart,
            "tool_complete" => EventKind::ToolComplete,
            "error" => EventKind::Error,
            "heartbeat" => EventKind::Heartbeat,
            other => EventKind::Other(other.to_string()),
        }
    }
}

impl From<String> for EventKind {
    fn from(s: String) -> Self {
        match EventKind::from(s.as_str()) {
            EventKind::Other(_) => EventKind::Other(s),
            known => known,
        }
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        match kind {
            EventKind::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured notification from an external agent.
///
/// `timestamp` and `session_id` may be absent on disk. The producer fills the
/// timestamp before writing and the watcher fills both before dispatch, so a
/// handler never sees the unset values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,

    /// Unset is represented by the UNIX epoch.
    #[serde(default)]
    pub timestamp: DateTime<Utc>,

    #[serde(default)]
    pub session_id: String,

    /// Open payload; its shape depends on `kind` and is not validated.
    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "Map::is_empty"
    )]
    pub data: Map<String, Value>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default())
}

impl HookEvent {
    /// Create an event with an unset timestamp and session id.
    pub fn new(kind: impl Into<EventKind>) -> Self {
        Self {
            kind: kind.into(),
            timestamp: DateTime::<Utc>::default(),
            session_id: String::new(),
            data: Map::new(),
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Insert one payload entry.
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Whether the timestamp holds a real instant.
    pub fn has_timestamp(&self) -> bool {
        self.timestamp != DateTime::<Utc>::default()
    }

    /// Parse an event from raw file contents.
    pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    /// Fill in whatever the producer left out.
    pub(crate) fn fill_defaults(&mut self, session_id: &str) {
        if self.session_id.is_empty() {
            self.session_id = session_id.to_string();
        }
        if !self.has_timestamp() {
            self.timestamp = Utc::now();
        }
    }
}

/// Next strictly increasing nanosecond key for this process.
///
/// Follows the wall clock, but never repeats or goes backwards when several
/// events are written within the same clock tick.
fn next_file_key() -> i64 {
    let now = Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX - 1);
    let previous = LAST_FILE_KEY
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
            Some(now.max(last + 1))
        })
        .unwrap_or_else(|last| last);
    now.max(previous + 1)
}

/// File name for an event written with `key`.
///
/// The kind is reduced to `[A-Za-z0-9_-]` so unknown kinds cannot escape the
/// session directory or change the extension.
pub fn event_file_name(key: i64, kind: &EventKind) -> String {
    let mut label: String = kind
        .as_str()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if label.is_empty() {
        label.push_str("event");
    }
    format!("{key}_{label}.{EVENT_FILE_EXTENSION}")
}

/// Atomically write `event` as a new file inside `dir`.
///
/// The payload goes to a hidden `.tmp` file first and is then linked onto its
/// final name, so a scanner never observes a partial event. An unset
/// timestamp is replaced with the current time. Returns the final path.
pub fn write_event(dir: &Path, mut event: HookEvent) -> Result<PathBuf, HookError> {
    if !event.has_timestamp() {
        event.timestamp = Utc::now();
    }

    let payload = serde_json::to_vec(&event)?;

    let mut staged = tempfile::Builder::new()
        .prefix(".")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| HookError::io(dir, e))?;
    staged
        .write_all(&payload)
        .and_then(|()| staged.as_file().sync_data())
        .map_err(|e| HookError::io(staged.path(), e))?;

    for _ in 0..MAX_NAME_ATTEMPTS {
        let target = dir.join(event_file_name(next_file_key(), &event.kind));
        match staged.persist_noclobber(&target) {
            Ok(_) => {
                crate::debug_event!("producer", "wrote", "{}", target.display());
                return Ok(target);
            }
            Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
                staged = e.file;
            }
            Err(e) => return Err(HookError::io(target, e.error)),
        }
    }

    Err(HookError::io(
        dir,
        std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            "no free event file name available",
        ),
    ))
}
