//! Filesystem change notifications for the workspace.

use std::path::{Path, PathBuf};

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::ServerError;

/// A change to one path, as seen by the indexes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FileEvent {
    /// A file appeared.
    Created(PathBuf),
    /// A file's content changed.
    Modified(PathBuf),
    /// A file or directory disappeared.
    Removed(PathBuf),
}

impl FileEvent {
    /// The path the event concerns.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Created(path) | Self::Modified(path) | Self::Removed(path) => path,
        }
    }
}

fn rename_events(mode: &RenameMode, paths: &[PathBuf]) -> Vec<FileEvent> {
    match mode {
        RenameMode::Both => {
            let mut events = Vec::with_capacity(2);
            if let Some(from) = paths.first() {
                events.push(FileEvent::Removed(from.clone()));
            }
            if let Some(to) = paths.get(1) {
                events.push(FileEvent::Created(to.clone()));
            }
            events
        }
        RenameMode::From => paths.iter().cloned().map(FileEvent::Removed).collect(),
        RenameMode::To => paths.iter().cloned().map(FileEvent::Created).collect(),
        RenameMode::Any | RenameMode::Other => paths
            .iter()
            .map(|path| {
                if path.exists() {
                    FileEvent::Created(path.clone())
                } else {
                    FileEvent::Removed(path.clone())
                }
            })
            .collect(),
    }
}

/// Translate a raw `notify` event into index events.
///
/// Renames become a removal of the old path plus a creation of the new one.
/// Access and metadata-only events are dropped.
#[must_use]
pub fn translate(event: &Event) -> Vec<FileEvent> {
    match &event.kind {
        EventKind::Create(_) => event.paths.iter().cloned().map(FileEvent::Created).collect(),
        EventKind::Remove(_) => event.paths.iter().cloned().map(FileEvent::Removed).collect(),
        EventKind::Modify(ModifyKind::Name(mode)) => rename_events(mode, &event.paths),
        EventKind::Modify(ModifyKind::Metadata(_)) | EventKind::Access(_) => Vec::new(),
        EventKind::Modify(_) => event.paths.iter().cloned().map(FileEvent::Modified).collect(),
        EventKind::Any | EventKind::Other => Vec::new(),
    }
}

/// Recursive watcher over a workspace root.
///
/// Events are delivered on the receiver returned by [`FileWatcher::start`]
/// until the watcher is dropped.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    root: PathBuf,
}

impl std::fmt::Debug for FileWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileWatcher")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl FileWatcher {
    /// Start watching `root` recursively.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Watch`] when the platform watcher cannot be
    /// created or cannot watch `root`.
    pub fn start(root: &Path) -> Result<(Self, mpsc::UnboundedReceiver<FileEvent>), ServerError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for file_event in translate(&event) {
                    if tx.send(file_event).is_err() {
                        debug!("file event receiver dropped");
                        return;
                    }
                }
            }
            Err(err) => warn!(error = %err, "file watcher error"),
        })?;
        watcher.watch(root, RecursiveMode::Recursive)?;
        debug!(root = %root.display(), "watching workspace");

        Ok((
            Self {
                _watcher: watcher,
                root: root.to_path_buf(),
            },
            rx,
        ))
    }

    /// The watched root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}
