// SPDX-License-Identifier: MIT OR Apache-2.0
//! Debounced watcher for the editor's settings files.
//!
//! Watches the directories holding the configuration and chip files and
//! reports changes to those files only, so the app can reload them live.

use notify_debouncer_full::{
    new_debouncer,
    notify::{self, EventKind, RecommendedWatcher, RecursiveMode},
    DebounceEventResult, Debouncer, RecommendedCache,
};
use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::time::Duration;

/// Events emitted by the watcher
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    /// A watched file was created or written
    Changed(PathBuf),
    /// A watched file was deleted
    Removed(PathBuf),
    /// The watcher reported an error
    Error(String),
}

/// Watches a fixed set of files
pub struct ConfigWatcher {
    _watcher: Debouncer<RecommendedWatcher, RecommendedCache>,
    event_rx: Receiver<WatchEvent>,
}

impl ConfigWatcher {
    /// Start watching `files`. Their parent directories must exist.
    pub fn new(files: &[PathBuf], debounce: Duration) -> Result<Self, notify::Error> {
        let (event_tx, event_rx) = mpsc::channel();
        let names: HashSet<OsString> = files.iter().filter_map(|f| f.file_name().map(OsString::from)).collect();

        let mut watcher = new_debouncer(debounce, None, move |result: DebounceEventResult| match result {
            Ok(events) => {
                for event in events {
                    let paths = event.paths.iter().filter(|p| is_watched(&names, p)).cloned();
                    for path in paths {
                        let message = match event.kind {
                            EventKind::Create(_) | EventKind::Modify(_) => WatchEvent::Changed(path),
                            EventKind::Remove(_) => WatchEvent::Removed(path),
                            EventKind::Any | EventKind::Access(_) | EventKind::Other => continue,
                        };
                        let _ = event_tx.send(message);
                    }
                }
            }
            Err(errors) => {
                for error in errors {
                    let _ = event_tx.send(WatchEvent::Error(error.to_string()));
                }
            }
        })?;

        let dirs: HashSet<&Path> = files.iter().filter_map(|f| f.parent()).collect();
        for dir in dirs {
            let dir = if dir.as_os_str().is_empty() { Path::new(".") } else { dir };
            watcher.watch(dir, RecursiveMode::NonRecursive)?;
            tracing::info!("Watching {:?} for settings changes", dir);
        }

        Ok(Self {
            _watcher: watcher,
            event_rx,
        })
    }

    /// Drain pending events (non-blocking)
    pub fn poll_events(&self) -> Vec<WatchEvent> {
        let mut events = Vec::new();
        loop {
            match self.event_rx.try_recv() {
                Ok(event) => {
                    if !events.contains(&event) {
                        events.push(event);
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    tracing::warn!("Settings watcher channel disconnected");
                    break;
                }
            }
        }
        events
    }
}

fn is_watched(names: &HashSet<OsString>, path: &Path) -> bool {
    path.file_name().is_some_and(|name| names.contains(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filters_by_file_name() {
        let names: HashSet<OsString> = [OsString::from("editor.ron")].into_iter().collect();
        assert!(is_watched(&names, Path::new("/tmp/settings/editor.ron")));
        assert!(!is_watched(&names, Path::new("/tmp/settings/editor.ron.swp")));
        assert!(!is_watched(&names, Path::new("/")));
    }

    #[test]
    fn test_poll_without_changes_is_empty() {
        let dir = std::env::temp_dir().join(format!("circuit-watch-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let watcher = ConfigWatcher::new(&[dir.join("editor.ron")], Duration::from_millis(50)).unwrap();
        assert!(watcher.poll_events().is_empty());
        drop(watcher);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
