pub mod event;

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{DebounceEventResult, Debouncer, new_debouncer};
use tokio::sync::mpsc as tokio_mpsc;
use tokio::task::JoinHandle;

use event::WatchEvent;

/// Debounce window for raw notify events.
const DEBOUNCE: Duration = Duration::from_millis(75);

/// Handle to a running watch on one file. Dropping it stops watching.
pub struct FileWatcher {
    debouncer: Debouncer<RecommendedWatcher>,
    target: PathBuf,
    /// Path currently registered with the OS: the target itself, or its parent
    /// directory while the target does not exist.
    watched: Option<PathBuf>,
    /// The bridge task forwarding events from the std channel to tokio.
    _bridge_task: JoinHandle<()>,
}

/// Start a debounced watch on `target`.
///
/// Returns a `FileWatcher` (must be kept alive) and a tokio receiver yielding
/// classified `WatchEvent`s for the target only.
pub fn start_watcher(
    target: &Path,
) -> anyhow::Result<(FileWatcher, tokio_mpsc::Receiver<WatchEvent>)> {
    let file_name = target
        .file_name()
        .map(|n| n.to_os_string())
        .with_context(|| format!("{} does not name a file", target.display()))?;

    let (std_tx, std_rx) = std::sync::mpsc::channel::<DebounceEventResult>();
    let debouncer = new_debouncer(DEBOUNCE, move |res| {
        let _ = std_tx.send(res);
    })?;

    let (tokio_tx, tokio_rx) = tokio_mpsc::channel::<WatchEvent>(64);

    let bridge_task = tokio::task::spawn_blocking(move || {
        while let Ok(result) = std_rx.recv() {
            match result {
                Ok(events) => {
                    for debounced_event in events {
                        if let Some(watch_event) = classify_event(&debounced_event.path, &file_name)
                        {
                            if tokio_tx.blocking_send(watch_event).is_err() {
                                return; // receiver dropped, shutdown
                            }
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, "watch backend error");
                }
            }
        }
    });

    let mut watcher = FileWatcher {
        debouncer,
        target: target.to_path_buf(),
        watched: None,
        _bridge_task: bridge_task,
    };
    watcher.rearm()?;

    Ok((watcher, tokio_rx))
}

impl FileWatcher {
    /// Drop the current registration and register again.
    ///
    /// Editors that save through a temp file and rename leave the old inode
    /// watch pointing at nothing, so this runs after every change.
    pub fn rearm(&mut self) -> notify::Result<()> {
        if let Some(old) = self.watched.take() {
            // Already gone when the watched inode was replaced.
            let _ = self.debouncer.watcher().unwatch(&old);
        }

        let desired = self.desired_watch_path();
        self.debouncer
            .watcher()
            .watch(&desired, RecursiveMode::NonRecursive)?;
        tracing::debug!(path = %desired.display(), "watch armed");
        self.watched = Some(desired);
        Ok(())
    }

    /// True when the registration does not match the target's current state,
    /// e.g. the parent directory is watched although the file exists again.
    pub fn needs_rearm(&self) -> bool {
        self.watched.as_deref() != Some(self.desired_watch_path().as_path())
    }

    pub fn watched_path(&self) -> Option<&Path> {
        self.watched.as_deref()
    }

    fn desired_watch_path(&self) -> PathBuf {
        if self.target.exists() {
            return self.target.clone();
        }
        match self.target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}

/// Classify a debounced event path, or `None` if it is not about the target.
///
/// Only the file name is compared: the registration is either the file itself
/// or its parent directory, watched non-recursively, and the backend may report
/// canonicalized paths.
fn classify_event(path: &Path, file_name: &OsString) -> Option<WatchEvent> {
    if path.file_name() != Some(file_name.as_os_str()) {
        return None;
    }
    if path.exists() {
        Some(WatchEvent::Changed(path.to_path_buf()))
    } else {
        Some(WatchEvent::Removed(path.to_path_buf()))
    }
}
