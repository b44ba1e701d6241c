//! Command implementations for the CLI.
//!
//! Each command is implemented in its own module.

pub mod init;
pub mod notify;
pub mod setup;
pub mod watch;

use std::path::Path;

use anyhow::Result;

use super::args::Commands;
use crate::config::Settings;

/// Dispatch a parsed command.
pub async fn run(command: Commands, settings: &Settings) -> Result<()> {
    match command {
        Commands::Init { force } => init::run_init(Path::new("."), force),
        Commands::Config => init::run_config(settings),
        Commands::Notify {
            session,
            hooks_dir,
            data,
            event,
        } => notify::run(session.as_deref(), &hooks_dir, data.as_deref(), event).map(|_| ()),
        Commands::Watch {
            session,
            base_dir,
            backend,
            keep,
        } => watch::run(settings, &session, base_dir, backend, keep).await,
        Commands::Setup {
            session,
            workdir,
            base_dir,
        } => setup::run(settings, &session, &workdir, base_dir).map(|_| ()),
    }
}
