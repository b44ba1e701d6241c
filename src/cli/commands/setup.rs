//! Setup command: provision a session for Claude Code.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::config::Settings;
use crate::hooks::claude::setup_claude_code_hooks_for;

/// Run setup command - create the session directory and `.claude/hooks.json`.
///
/// Returns the written config path and the session directory.
pub fn run(
    settings: &Settings,
    session: &str,
    workdir: &Path,
    base_dir: Option<PathBuf>,
) -> Result<(PathBuf, PathBuf)> {
    let mut config = settings.watcher_config(session);
    if base_dir.is_some() {
        config.base_dir = base_dir;
    }

    let (config_path, watcher) = setup_claude_code_hooks_for(&settings.hooks.program, workdir, config)?;
    let hooks_dir = watcher.hooks_dir().to_path_buf();

    println!("Wrote hooks config: {}", config_path.display());
    println!("Session directory:  {}", hooks_dir.display());
    println!("Run `hookbridge watch --session {session}` to receive events.");

    Ok((config_path, hooks_dir))
}
