//! Claude Code `hooks.json` generation.
//!
//! The generated commands call `hookbridge notify`, which writes event files
//! into the watcher's session directory.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::HookError;
use super::watcher::{HooksWatcher, WatcherConfig};
use crate::shell::shell_quote;

/// Program name embedded in generated commands.
pub const DEFAULT_PROGRAM: &str = "hookbridge";

/// Hook points written into every generated config.
pub const HOOK_POINTS: [&str; 5] = [
    "SessionStart",
    "UserPromptSubmit",
    "ToolUse",
    "ToolComplete",
    "Stop",
];

/// Claude Code hooks.json document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaudeCodeConfig {
    pub hooks: BTreeMap<String, Vec<ClaudeHookEntry>>,
}

/// A single hook command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaudeHookEntry {
    pub command: String,
}

/// Generate a config whose commands run [`DEFAULT_PROGRAM`].
pub fn generate_claude_code_config(hooks_dir: &Path, session_id: &str) -> ClaudeCodeConfig {
    generate_claude_code_config_for(DEFAULT_PROGRAM, hooks_dir, session_id)
}

/// Generate a config whose commands run `program`.
///
/// The session id and directory are shell-quoted; the `$PROMPT`-style
/// placeholders are left for the agent's shell to expand, after a `--` so
/// expanded values starting with `-` are never read as flags.
pub fn generate_claude_code_config_for(
    program: &str,
    hooks_dir: &Path,
    session_id: &str,
) -> ClaudeCodeConfig {
    let base = format!(
        "{} notify --session {} --hooks-dir {}",
        shell_quote(program),
        shell_quote(session_id),
        shell_quote(&hooks_dir.to_string_lossy())
    );

    let commands = [
        format!("{base} session-start"),
        format!(r#"{base} prompt -- "$PROMPT""#),
        format!(r#"{base} tool-start -- "$TOOL_NAME" "$TOOL_INPUT""#),
        format!(r#"{base} tool-complete -- "$TOOL_NAME" "$EXIT_CODE""#),
        format!(r#"{base} session-stop -- "$EXIT_CODE""#),
    ];

    let hooks = HOOK_POINTS
        .iter()
        .zip(commands)
        .map(|(point, command)| (point.to_string(), vec![ClaudeHookEntry { command }]))
        .collect();

    ClaudeCodeConfig { hooks }
}

/// Write `config` as pretty JSON, creating parent directories.
pub fn write_claude_code_config(path: &Path, config: &ClaudeCodeConfig) -> Result<(), HookError> {
    let data = serde_json::to_string_pretty(config)?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| HookError::io(parent, e))?;
    }

    fs::write(path, data).map_err(|e| HookError::io(path, e))
}

/// Provision a session and write `<workdir>/.claude/hooks.json` for it.
///
/// Returns the config path and the (not yet started) watcher. If the config
/// cannot be written the session directory is removed again.
pub fn setup_claude_code_hooks(
    workdir: &Path,
    config: WatcherConfig,
) -> Result<(PathBuf, HooksWatcher), HookError> {
    setup_claude_code_hooks_for(DEFAULT_PROGRAM, workdir, config)
}

/// [`setup_claude_code_hooks`] with a custom program name.
pub fn setup_claude_code_hooks_for(
    program: &str,
    workdir: &Path,
    config: WatcherConfig,
) -> Result<(PathBuf, HooksWatcher), HookError> {
    let watcher = HooksWatcher::new(config)?;
    let hooks_config =
        generate_claude_code_config_for(program, watcher.hooks_dir(), watcher.session_id());

    let config_path = workdir.join(".claude").join("hooks.json");
    if let Err(e) = write_claude_code_config(&config_path, &hooks_config) {
        if let Err(cleanup_err) = watcher.cleanup() {
            tracing::warn!("[setup] failed to remove session directory: {cleanup_err}");
        }
        return Err(e);
    }

    crate::log_event!("setup", "wrote", "{}", config_path.display());
    Ok((config_path, watcher))
}
