//! Hooks event bridge.
//!
//! External agents are configured to run `hookbridge notify`, which drops one
//! JSON file per notification into a session directory. A [`HooksWatcher`]
//! owns that directory, picks the files up, and hands each event to every
//! registered handler exactly once.
//!
//! # Architecture
//!
//! ```text
//! agent hook -> hookbridge notify -> write_event()
//!                                        |
//!                           <base>/<session>/<nanos>_<type>.json
//!                                        |
//! HooksWatcher
//!   - EventSource (native notify or fixed-interval poll)
//!   - Scanner (parse, fill defaults, quarantine, delete)
//!   - Handlers + broadcast subscribers
//! ```

pub mod claude;
mod error;
mod event;
mod handler;
mod scan;
mod source;
mod watcher;

pub use claude::{
    ClaudeCodeConfig, ClaudeHookEntry, generate_claude_code_config, setup_claude_code_hooks,
    write_claude_code_config,
};
pub use error::HookError;
pub use event::{EventKind, HookEvent, event_file_name, write_event};
pub use handler::EventHandler;
pub use scan::{QUARANTINE_SUFFIX, ScanReport, Scanner, is_event_file};
pub use source::{EventSource, NativeSource, PollSource, SourceKind, open_source};
pub use watcher::{
    DEFAULT_POLL_INTERVAL, DEFAULT_RESCAN_INTERVAL, HooksWatcher, HooksWatcherBuilder,
    WatcherConfig, default_base_dir,
};
