//! One pass over a session directory.
//!
//! Deleting a file is what marks it processed, so no per-file history is
//! kept. Malformed files are quarantined under a non-`.json` name. Only
//! files that could be neither deleted nor quarantined are remembered, and
//! that record never outgrows the directory listing.

use std::collections::HashSet;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use super::event::{EVENT_FILE_EXTENSION, HookEvent};
use super::handler::{EventHandler, dispatch};

/// Suffix appended to malformed event files.
pub const QUARANTINE_SUFFIX: &str = ".invalid";

/// Counters for one scan pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanReport {
    /// Events handed to the handlers.
    pub dispatched: usize,
    /// Files that failed to parse and were set aside.
    pub quarantined: usize,
    /// Files that vanished mid-pass or are already known to be stuck.
    pub skipped: usize,
}

impl ScanReport {
    pub fn is_empty(&self) -> bool {
        self.dispatched == 0 && self.quarantined == 0 && self.skipped == 0
    }
}

/// Scans one session directory and dispatches what it finds.
#[derive(Debug)]
pub struct Scanner {
    session_id: String,
    dir: PathBuf,
    /// Names that could not be removed after handling.
    stuck: HashSet<OsString>,
    /// Deletes a handled file.
    remove: fn(&Path) -> io::Result<()>,
}

/// Whether `name` looks like an event file.
pub fn is_event_file(name: &OsStr) -> bool {
    Path::new(name).extension() == Some(OsStr::new(EVENT_FILE_EXTENSION))
}

impl Scanner {
    pub fn new(session_id: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            session_id: session_id.into(),
            dir: dir.into(),
            stuck: HashSet::new(),
            remove: |path| fs::remove_file(path),
        }
    }

    /// Replace how handled files are deleted.
    #[cfg(test)]
    fn with_remover(mut self, remove: fn(&Path) -> io::Result<()>) -> Self {
        self.remove = remove;
        self
    }

    /// Number of files currently remembered as stuck.
    pub fn stuck_count(&self) -> usize {
        self.stuck.len()
    }

    /// Run one pass.
    ///
    /// `handlers` is called once per event to take a fresh snapshot of the
    /// registered handlers, so handlers added mid-pass see later events.
    /// Directory errors end the pass quietly; nothing here returns an error.
    pub fn scan<F>(&mut self, handlers: F) -> ScanReport
    where
        F: Fn() -> Vec<EventHandler>,
    {
        let mut report = ScanReport::default();

        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::trace!("[scan] cannot list {}: {e}", self.dir.display());
                return report;
            }
        };

        let mut names: Vec<OsString> = entries
            .flatten()
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .map(|entry| entry.file_name())
            .filter(|name| is_event_file(name))
            .collect();
        names.sort();

        self.stuck.retain(|name| names.binary_search(name).is_ok());

        for name in names {
            if self.stuck.contains(&name) {
                report.skipped += 1;
                continue;
            }
            self.process(name, &handlers, &mut report);
        }

        report
    }

    fn process<F>(&mut self, name: OsString, handlers: &F, report: &mut ScanReport)
    where
        F: Fn() -> Vec<EventHandler>,
    {
        let path = self.dir.join(&name);

        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                crate::debug_event!("scan", "vanished", "{}", path.display());
                report.skipped += 1;
                return;
            }
            Err(e) => {
                crate::debug_event!("scan", "unreadable", "{}: {e}", path.display());
                self.quarantine(name, &path);
                report.quarantined += 1;
                return;
            }
        };

        let mut event = match HookEvent::from_slice(&bytes) {
            Ok(event) => event,
            Err(e) => {
                crate::debug_event!("scan", "malformed", "{}: {e}", path.display());
                self.quarantine(name, &path);
                report.quarantined += 1;
                return;
            }
        };
        event.fill_defaults(&self.session_id);

        let snapshot = handlers();
        let delivered = dispatch(&snapshot, &event);
        crate::debug_event!(
            "scan",
            "dispatched",
            "{} to {delivered}/{} handlers",
            event.kind,
            snapshot.len()
        );
        report.dispatched += 1;

        match (self.remove)(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!("[scan] cannot remove {}: {e}", path.display());
                self.stuck.insert(name);
            }
        }
    }

    /// Move a malformed file out of the `.json` namespace.
    fn quarantine(&mut self, name: OsString, path: &Path) {
        let mut target = name.clone();
        target.push(QUARANTINE_SUFFIX);

        match fs::rename(path, self.dir.join(&target)) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!("[scan] cannot quarantine {}: {e}", path.display());
                self.stuck.insert(name);
            }
        }
    }
}
