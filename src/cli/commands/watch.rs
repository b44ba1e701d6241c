//! Watch command: stream a session's events to stdout.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio::sync::broadcast::error::RecvError;

use crate::config::Settings;
use crate::hooks::{HooksWatcher, SourceKind};

/// Run watch command until Ctrl-C.
///
/// Each event is printed as one JSON line on stdout. The session directory
/// is removed on exit unless `keep` is set.
pub async fn run(
    settings: &Settings,
    session: &str,
    base_dir: Option<PathBuf>,
    backend: Option<SourceKind>,
    keep: bool,
) -> Result<()> {
    let mut config = settings.watcher_config(session);
    if base_dir.is_some() {
        config.base_dir = base_dir;
    }
    if let Some(backend) = backend {
        config.source = backend;
    }

    let watcher = HooksWatcher::new(config)?;
    let mut events = watcher.subscribe();
    watcher.start()?;

    eprintln!("Watching {} (Ctrl-C to stop)", watcher.hooks_dir().display());

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let outcome = loop {
        tokio::select! {
            signal = &mut shutdown => {
                break signal.context("failed to listen for Ctrl-C");
            }
            received = events.recv() => match received {
                Ok(event) => {
                    let line = match serde_json::to_string(&event) {
                        Ok(line) => line,
                        Err(e) => break Err(e.into()),
                    };
                    let mut stdout = std::io::stdout().lock();
                    if let Err(e) = writeln!(stdout, "{line}").and_then(|()| stdout.flush()) {
                        // Reader went away (e.g. closed pipe)
                        break Err(e).context("failed to write to stdout");
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!("[watch] output fell behind, {missed} events not printed");
                }
                Err(RecvError::Closed) => break Ok(()),
            }
        }
    };

    watcher.stop();
    if keep {
        eprintln!("Kept {}", watcher.hooks_dir().display());
    } else {
        watcher.cleanup()?;
    }

    outcome
}
