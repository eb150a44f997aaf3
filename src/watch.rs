//! Polling change feed for the watched script.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

use notify::event::ModifyKind;
use notify::{Config, Event, EventKind, PollWatcher, RecursiveMode, Watcher};
use tracing::{debug, warn};

/// Notifications arriving within this window of each other are read as one
/// change.
const SETTLE: Duration = Duration::from_millis(50);

/// Full text of the watched file after a change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub source: String,
}

impl ChangeEvent {
    pub fn new(path: impl Into<PathBuf>, source: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            source: source.into(),
        }
    }
}

/// Yields the file's current content once, then once per detected
/// modification. Ends when the underlying watcher goes away.
pub struct FileWatcher {
    path: PathBuf,
    notify_rx: Receiver<notify::Result<Event>>,
    /// Watcher handle (must be kept alive)
    _watcher: PollWatcher,
    started: bool,
}

impl FileWatcher {
    pub fn new(path: impl Into<PathBuf>, poll_interval: Duration) -> notify::Result<Self> {
        let path = path.into();
        let (notify_tx, notify_rx) = std::sync::mpsc::channel();
        let config = Config::default()
            .with_poll_interval(poll_interval)
            .with_compare_contents(true);
        let mut watcher = PollWatcher::new(
            move |res| {
                let _ = notify_tx.send(res);
            },
            config,
        )?;
        watcher.watch(&path, RecursiveMode::NonRecursive)?;
        debug!(path = %path.display(), ?poll_interval, "watching");

        Ok(Self {
            path,
            notify_rx,
            _watcher: watcher,
            started: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Waits for the next change. `None` on timeout or once the watcher is
    /// gone.
    pub fn next_change(&mut self, timeout: Option<Duration>) -> Option<ChangeEvent> {
        if !self.started {
            self.started = true;
            if let Some(event) = self.read() {
                return Some(event);
            }
        }

        loop {
            let received = match timeout {
                Some(timeout) => self.notify_rx.recv_timeout(timeout),
                None => self
                    .notify_rx
                    .recv()
                    .map_err(|_| RecvTimeoutError::Disconnected),
            };
            let event = match received {
                Ok(Ok(event)) => event,
                Ok(Err(error)) => {
                    warn!(path = %self.path.display(), %error, "watch error");
                    continue;
                }
                Err(_) => return None,
            };
            if !is_content_change(&event) {
                continue;
            }

            // Drain the rest of a burst so it is read once.
            while let Ok(extra) = self.notify_rx.recv_timeout(SETTLE) {
                debug!(?extra, "coalesced notification");
            }

            if let Some(event) = self.read() {
                return Some(event);
            }
        }
    }

    fn read(&self) -> Option<ChangeEvent> {
        match fs::read_to_string(&self.path) {
            Ok(source) => Some(ChangeEvent::new(&self.path, source)),
            Err(error) => {
                warn!(path = %self.path.display(), %error, "failed to read watched file");
                None
            }
        }
    }
}

impl Iterator for FileWatcher {
    type Item = ChangeEvent;

    fn next(&mut self) -> Option<ChangeEvent> {
        self.next_change(None)
    }
}

fn is_content_change(event: &Event) -> bool {
    match event.kind {
        // Metadata-only changes (mtime/atime/chmod) carry no new source.
        EventKind::Modify(ModifyKind::Metadata(_)) => false,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Any => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn yields_initial_content_then_modifications() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("script.py");
        fs::write(&path, "a = 1\n").expect("write initial");

        let mut watcher = FileWatcher::new(&path, Duration::from_millis(20)).expect("watcher");
        let first = watcher.next_change(Some(Duration::from_secs(5)));
        assert_eq!(first, Some(ChangeEvent::new(&path, "a = 1\n")));

        fs::write(&path, "a = 2\n").expect("write update");
        let second = watcher
            .next_change(Some(Duration::from_secs(10)))
            .expect("modification should be seen");
        assert_eq!(second.source, "a = 2\n");
    }

    #[test]
    fn metadata_changes_are_ignored() {
        let event = Event::new(EventKind::Modify(ModifyKind::Metadata(
            notify::event::MetadataKind::WriteTime,
        )));
        assert!(!is_content_change(&event));
        let event = Event::new(EventKind::Modify(ModifyKind::Data(
            notify::event::DataChange::Content,
        )));
        assert!(is_content_change(&event));
        assert!(!is_content_change(&Event::new(EventKind::Remove(
            notify::event::RemoveKind::File
        ))));
    }
}
