//! CLI argument parsing using clap.
//!
//! Contains the Cli struct, Commands enum, and the notify verb enum.

use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;

use crate::hooks::SourceKind;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Bridge coding-agent hook events into a watching process
#[derive(Parser, Debug)]
#[command(
    name = "hookbridge",
    version = env!("CARGO_PKG_VERSION"),
    about = "Bridge coding-agent hook events into a watching process",
    long_about = "Writes hook events into per-session directories and delivers them to a watcher.",
    next_line_help = true,
    styles = clap_cargo_style()
)]
pub struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize project
    #[command(about = "Set up .hookbridge directory with default configuration")]
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Write one event file (invoked by generated hook commands)
    #[command(
        about = "Write a hook event into a session directory",
        after_help = "Examples:\n  hookbridge notify --session abc --hooks-dir /tmp/hookbridge/hooks/abc session-start\n  hookbridge notify --session abc --hooks-dir DIR tool-complete read 0\n  hookbridge notify --hooks-dir DIR --data '{\"model\":\"x\"}' prompt \"hello\""
    )]
    Notify {
        /// Session id recorded in the event (filled by the watcher when omitted)
        #[arg(long)]
        session: Option<String>,

        /// Session directory to write into
        #[arg(long, value_name = "DIR")]
        hooks_dir: PathBuf,

        /// Extra payload as a JSON object, merged into the event data
        #[arg(long, value_name = "JSON")]
        data: Option<String>,

        #[command(subcommand)]
        event: NotifyEvent,
    },

    /// Watch a session and print events as JSON lines
    #[command(about = "Run a watcher and stream events to stdout until Ctrl-C")]
    Watch {
        /// Session id (directory name under the base directory)
        #[arg(long)]
        session: String,

        /// Parent of session directories (overrides config)
        #[arg(long, value_name = "DIR")]
        base_dir: Option<PathBuf>,

        /// How new files are noticed (overrides config)
        #[arg(long, value_enum)]
        backend: Option<SourceKind>,

        /// Leave the session directory in place on exit
        #[arg(long)]
        keep: bool,
    },

    /// Provision a session and write Claude Code hooks config
    #[command(about = "Create the session directory and write .claude/hooks.json")]
    Setup {
        /// Session id
        #[arg(long)]
        session: String,

        /// Project directory receiving .claude/hooks.json
        #[arg(long, default_value = ".")]
        workdir: PathBuf,

        /// Parent of session directories (overrides config)
        #[arg(long, value_name = "DIR")]
        base_dir: Option<PathBuf>,
    },

    /// Show current configuration settings
    #[command(about = "Display active settings")]
    Config,
}

/// Event verbs accepted by `notify`
///
/// Arguments are free text from the agent, so values may start with `-`.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum NotifyEvent {
    /// The agent session started
    SessionStart,

    /// The agent session ended
    SessionStop {
        /// Exit code of the session
        #[arg(allow_hyphen_values = true)]
        exit_code: Option<String>,
    },

    /// A prompt was submitted
    Prompt {
        /// Prompt text
        #[arg(allow_hyphen_values = true)]
        text: String,
    },

    /// A tool invocation started
    ToolStart {
        /// Tool name
        #[arg(allow_hyphen_values = true)]
        tool: String,
        /// Tool input (JSON or plain text)
        #[arg(allow_hyphen_values = true)]
        input: Option<String>,
    },

    /// A tool invocation finished
    ToolComplete {
        /// Tool name
        #[arg(allow_hyphen_values = true)]
        tool: String,
        /// Exit code of the tool
        #[arg(allow_hyphen_values = true)]
        exit_code: Option<String>,
    },

    /// The agent reported an error
    Error {
        /// Error message
        #[arg(allow_hyphen_values = true)]
        message: String,
    },

    /// Liveness signal
    Heartbeat,
}
