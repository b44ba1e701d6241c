//! Session-scoped hooks watcher.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use super::error::HookError;
use super::event::HookEvent;
use super::handler::EventHandler;
use super::scan::Scanner;
use super::source::{EventSource, SourceKind, open_source};

/// Default delay between scans when polling.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default backstop rescan when native notifications are in use.
pub const DEFAULT_RESCAN_INTERVAL: Duration = Duration::from_millis(1000);

/// Buffered events per [`HooksWatcher::subscribe`] receiver.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Base directory used when none is configured: `<tmp>/hookbridge/hooks`.
pub fn default_base_dir() -> PathBuf {
    std::env::temp_dir().join("hookbridge").join("hooks")
}

/// Construction parameters for a [`HooksWatcher`].
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Session this watcher serves. Required.
    pub session_id: String,
    /// Parent of the session directory. `None` means [`default_base_dir`].
    pub base_dir: Option<PathBuf>,
    pub poll_interval: Duration,
    pub rescan_interval: Duration,
    pub source: SourceKind,
}

impl WatcherConfig {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            ..Self::default()
        }
    }

    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            session_id: String::new(),
            base_dir: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            rescan_interval: DEFAULT_RESCAN_INTERVAL,
            source: SourceKind::default(),
        }
    }
}

/// State shared between the watcher handle and its background task.
#[derive(Default)]
struct Shared {
    handlers: Vec<EventHandler>,
    /// `Some` while running.
    cancel: Option<CancellationToken>,
    broadcaster: Option<broadcast::Sender<HookEvent>>,
}

/// Watches one session directory and fans events out to handlers.
///
/// Lifecycle: [`new`](Self::new) provisions the directory, handlers are
/// registered with [`on_event`](Self::on_event), [`start`](Self::start)
/// spawns the background task, [`stop`](Self::stop) cancels it and
/// [`cleanup`](Self::cleanup) removes the directory. A stopped watcher can be
/// started again. Dropping the watcher stops the task but keeps the
/// directory.
pub struct HooksWatcher {
    session_id: String,
    hooks_dir: PathBuf,
    poll_interval: Duration,
    rescan_interval: Duration,
    source: SourceKind,
    shared: Arc<Mutex<Shared>>,
    /// Serialises passes across restarts and keeps the stuck-file record.
    scanner: Arc<Mutex<Scanner>>,
}

impl HooksWatcher {
    /// Create a watcher and its session directory.
    pub fn new(config: WatcherConfig) -> Result<Self, HookError> {
        validate_session_id(&config.session_id)?;
        if config.poll_interval.is_zero() || config.rescan_interval.is_zero() {
            return Err(HookError::Config {
                reason: "scan intervals must be greater than zero".to_string(),
            });
        }

        let base_dir = config.base_dir.unwrap_or_else(default_base_dir);
        let session_dir = base_dir.join(&config.session_id);
        let hooks_dir =
            std::path::absolute(&session_dir).map_err(|e| HookError::io(&session_dir, e))?;

        fs::create_dir_all(&hooks_dir).map_err(|e| HookError::io(&hooks_dir, e))?;
        crate::log_event!("hooks", "provisioned", "{}", hooks_dir.display());

        Ok(Self {
            scanner: Arc::new(Mutex::new(Scanner::new(
                config.session_id.clone(),
                hooks_dir.clone(),
            ))),
            session_id: config.session_id,
            hooks_dir,
            poll_interval: config.poll_interval,
            rescan_interval: config.rescan_interval,
            source: config.source,
            shared: Arc::new(Mutex::new(Shared::default())),
        })
    }

    /// Create a builder for configuring the watcher.
    pub fn builder(session_id: impl Into<String>) -> HooksWatcherBuilder {
        HooksWatcherBuilder::new(session_id)
    }

    /// Register a handler for every event. Allowed before or after `start`.
    pub fn on_event<F>(&self, handler: F)
    where
        F: Fn(&HookEvent) + Send + Sync + 'static,
    {
        self.shared.lock().handlers.push(Arc::new(handler));
    }

    /// Receive every dispatched event on a channel.
    ///
    /// The first call registers a forwarding handler; later calls share it.
    /// A receiver that falls more than 256 events behind observes `Lagged`.
    pub fn subscribe(&self) -> broadcast::Receiver<HookEvent> {
        let mut shared = self.shared.lock();
        if let Some(sender) = &shared.broadcaster {
            return sender.subscribe();
        }

        let (sender, receiver) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let forward = sender.clone();
        shared.handlers.push(Arc::new(move |event: &HookEvent| {
            // No receivers left is fine.
            let _ = forward.send(event.clone());
        }));
        shared.broadcaster = Some(sender);
        receiver
    }

    /// Spawn the background task on the current Tokio runtime.
    ///
    /// Returns immediately. Fails if already running or if no runtime is
    /// available.
    pub fn start(&self) -> Result<(), HookError> {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(HookError::NoRuntime);
        }

        let mut shared = self.shared.lock();
        if shared.cancel.is_some() {
            return Err(HookError::AlreadyRunning {
                session_id: self.session_id.clone(),
            });
        }

        let source = open_source(
            self.source,
            &self.hooks_dir,
            self.poll_interval,
            self.rescan_interval,
        )?;
        let token = CancellationToken::new();
        shared.cancel = Some(token.clone());
        drop(shared);

        crate::log_event!(
            "hooks",
            "started",
            "{} via {}",
            self.session_id,
            source.name()
        );

        tokio::spawn(run(
            source,
            token,
            Arc::clone(&self.scanner),
            Arc::clone(&self.shared),
        ));
        Ok(())
    }

    /// Cancel the background task. A no-op when not running.
    ///
    /// Does not wait: a pass already in progress finishes its dispatches.
    pub fn stop(&self) {
        if let Some(token) = self.shared.lock().cancel.take() {
            token.cancel();
            crate::log_event!("hooks", "stopped", "{}", self.session_id);
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.lock().cancel.is_some()
    }

    /// Absolute path of the session directory.
    pub fn hooks_dir(&self) -> &Path {
        &self.hooks_dir
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Number of registered handlers, including the `subscribe` forwarder.
    pub fn handler_count(&self) -> usize {
        self.shared.lock().handlers.len()
    }

    /// Remove the session directory and everything in it.
    ///
    /// Works whether or not the watcher is running; an already missing
    /// directory is not an error.
    pub fn cleanup(&self) -> Result<(), HookError> {
        match fs::remove_dir_all(&self.hooks_dir) {
            Ok(()) => {
                crate::log_event!("hooks", "removed", "{}", self.hooks_dir.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(HookError::io(&self.hooks_dir, e)),
        }
    }
}

impl Drop for HooksWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for HooksWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HooksWatcher")
            .field("session_id", &self.session_id)
            .field("hooks_dir", &self.hooks_dir)
            .field("source", &self.source)
            .field("running", &self.is_running())
            .finish()
    }
}

/// Background task: wait for the source, scan, repeat until cancelled.
async fn run(
    mut source: Box<dyn EventSource>,
    token: CancellationToken,
    scanner: Arc<Mutex<Scanner>>,
    shared: Arc<Mutex<Shared>>,
) {
    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = source.ready() => {}
        }

        // Directory I/O and handlers are synchronous; keep them off the runtime.
        let pass_scanner = Arc::clone(&scanner);
        let pass_shared = Arc::clone(&shared);
        let pass = tokio::task::spawn_blocking(move || {
            pass_scanner
                .lock()
                .scan(|| pass_shared.lock().handlers.clone())
        })
        .await;

        let report = match pass {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!("[hooks] scan pass aborted: {e}");
                continue;
            }
        };
        if !report.is_empty() {
            crate::debug_event!(
                "hooks",
                "pass",
                "{} dispatched, {} quarantined, {} skipped",
                report.dispatched,
                report.quarantined,
                report.skipped
            );
        }
    }
    crate::debug_event!("hooks", "task exited");
}

/// Session ids become directory names, so they must be a single component.
fn validate_session_id(session_id: &str) -> Result<(), HookError> {
    if session_id.is_empty() {
        return Err(HookError::Config {
            reason: "session ID is required".to_string(),
        });
    }
    if session_id == "."
        || session_id == ".."
        || session_id.contains(['/', '\\'])
        || session_id.contains('\0')
    {
        return Err(HookError::Config {
            reason: format!("session ID '{session_id}' is not a valid directory name"),
        });
    }
    Ok(())
}

/// Builder for constructing a [`HooksWatcher`].
pub struct HooksWatcherBuilder {
    config: WatcherConfig,
}

impl HooksWatcherBuilder {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            config: WatcherConfig::new(session_id),
        }
    }

    /// Parent directory for the session directory.
    pub fn base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.config.base_dir = Some(base_dir.into());
        self
    }

    /// Scan interval for the poll source.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Backstop rescan interval for the native source.
    pub fn rescan_interval(mut self, interval: Duration) -> Self {
        self.config.rescan_interval = interval;
        self
    }

    pub fn source(mut self, source: SourceKind) -> Self {
        self.config.source = source;
        self
    }

    /// Build the watcher, provisioning its directory.
    pub fn build(self) -> Result<HooksWatcher, HookError> {
        HooksWatcher::new(self.config)
    }
}
