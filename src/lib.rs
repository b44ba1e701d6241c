//! Hooks event bridge.
//!
//! An external coding agent runs `hookbridge notify ...` from its hook
//! points; each call drops one JSON event file into a per-session
//! directory. A [`HooksWatcher`] in the host process picks those files up,
//! hands each event to every registered handler exactly once and deletes
//! the file.
//!
//! ```no_run
//! use hookbridge::{EventKind, HooksWatcher};
//!
//! # async fn demo() -> Result<(), hookbridge::HookError> {
//! let watcher = HooksWatcher::builder("session-1").build()?;
//! watcher.on_event(|event| {
//!     if event.kind == EventKind::ToolComplete {
//!         println!("tool finished: {:?}", event.data.get("tool"));
//!     }
//! });
//! watcher.start()?;
//! // ... run the agent ...
//! watcher.stop();
//! watcher.cleanup()?;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod hooks;
pub mod logging;
pub mod shell;

pub use config::Settings;
pub use hooks::{
    EventHandler, EventKind, HookError, HookEvent, HooksWatcher, HooksWatcherBuilder, SourceKind,
    WatcherConfig, write_event,
};
