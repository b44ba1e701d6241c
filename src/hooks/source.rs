//! Wake-up strategies for the scan loop.
//!
//! An [`EventSource`] only decides *when* the session directory is scanned.
//! Discovery, parsing and dispatch are identical for every strategy.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use notify::{RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::{Interval, MissedTickBehavior, interval};

use super::error::HookError;

/// Which strategy a watcher uses to notice new event files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Native notifications when available, polling otherwise.
    Auto,
    /// Native filesystem notifications only.
    Native,
    /// Fixed-interval directory scan.
    #[default]
    Poll,
}

/// Resolves whenever the session directory should be scanned.
#[async_trait]
pub trait EventSource: Send {
    /// Strategy name for logging.
    fn name(&self) -> &'static str;

    /// Wait until the next scan is due.
    ///
    /// The first call resolves immediately so files written before the
    /// watcher started are picked up.
    async fn ready(&mut self);
}

/// Fixed-interval scanning. Works everywhere.
pub struct PollSource {
    ticker: Interval,
}

impl PollSource {
    /// Must be called from within a Tokio runtime.
    pub fn new(period: Duration) -> Self {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { ticker }
    }
}

#[async_trait]
impl EventSource for PollSource {
    fn name(&self) -> &'static str {
        "poll"
    }

    async fn ready(&mut self) {
        self.ticker.tick().await;
    }
}

/// Native filesystem notifications with a slow rescan as backstop.
pub struct NativeSource {
    wake_rx: mpsc::Receiver<()>,
    backstop: Interval,
    /// Kept alive for as long as notifications are wanted.
    _watcher: notify::RecommendedWatcher,
}

impl NativeSource {
    /// Must be called from within a Tokio runtime.
    pub fn new(dir: &Path, rescan: Duration) -> Result<Self, HookError> {
        // Capacity 1: wake-ups coalesce, a pending one is enough.
        let (tx, rx) = mpsc::channel(1);

        let mut watcher =
            notify::recommended_watcher(move |res: notify::Result<notify::Event>| match res {
                Ok(event) if is_relevant(&event.kind) => {
                    let _ = tx.try_send(());
                }
                Ok(_) => {}
                Err(e) => {
                    crate::debug_event!("source", "notify error", "{e}");
                    let _ = tx.try_send(());
                }
            })?;
        watcher.watch(dir, RecursiveMode::NonRecursive)?;

        let mut backstop = interval(rescan);
        backstop.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Ok(Self {
            wake_rx: rx,
            backstop,
            _watcher: watcher,
        })
    }
}

#[async_trait]
impl EventSource for NativeSource {
    fn name(&self) -> &'static str {
        "native"
    }

    async fn ready(&mut self) {
        tokio::select! {
            Some(()) = self.wake_rx.recv() => {}
            _ = self.backstop.tick() => {}
        }
    }
}

/// Creations and renames matter; reads and removals do not.
fn is_relevant(kind: &notify::EventKind) -> bool {
    matches!(
        kind,
        notify::EventKind::Create(_)
            | notify::EventKind::Modify(_)
            | notify::EventKind::Any
            | notify::EventKind::Other
    )
}

/// Open the strategy requested by `kind` for `dir`.
///
/// `Auto` falls back to polling when native notifications cannot be set up;
/// an explicit `Native` request surfaces the failure instead.
pub fn open_source(
    kind: SourceKind,
    dir: &Path,
    poll_interval: Duration,
    rescan_interval: Duration,
) -> Result<Box<dyn EventSource>, HookError> {
    match kind {
        SourceKind::Poll => Ok(Box::new(PollSource::new(poll_interval))),
        SourceKind::Native => Ok(Box::new(NativeSource::new(dir, rescan_interval)?)),
        SourceKind::Auto => match NativeSource::new(dir, rescan_interval) {
            Ok(source) => Ok(Box::new(source)),
            Err(e) => {
                tracing::warn!("[source] native notifications unavailable, polling instead: {e}");
                Ok(Box::new(PollSource::new(poll_interval)))
            }
        },
    }
}
