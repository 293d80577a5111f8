//! Incremental, per-file indexes over a workspace.
//!
//! [`IncrementalIndex`] owns the scan lifecycle shared by both corpora: it
//! maps each file to the items parsed from it, keeps a lazily rebuilt flat
//! view, and coordinates scans so that no file is parsed by two tasks at
//! once. What an item is and how a file is parsed comes from an
//! [`IndexStrategy`]. [`StepDefinitionIndex`] and [`StepUsageIndex`] wrap an
//! `IncrementalIndex` with their own lookup layers.
//!
//! State sits behind a `std::sync::Mutex` that is released before every
//! `.await`, so scans of different files overlap freely while each file has
//! at most one scan in flight. A change observed during a scan is queued and
//! replayed once the scan finishes.

mod definitions;
mod usages;


use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::join_all;
use indexmap::IndexMap;
use tracing::{debug, info, trace, warn};

use crate::error::ScanError;
use crate::workspace::{CorpusGlobs, FileEvent, GlobFilter, SourceReader, find_matching_files};

pub use definitions::{StepDefinition, StepDefinitionIndex, StepPatternCompileError, parse_definitions};
pub use usages::{
    ScannedStep, StepOccurrence, StepScanner, StepUsageIndex, is_structural_header,
    parse_occurrences,
};

/// Tuning for full scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanSettings {
    /// Files read concurrently by [`IncrementalIndex::scan_all`].
    pub batch_size: usize,
    /// Queued re-scans of one file honoured before the scan gives up.
    pub max_rescan_depth: usize,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            batch_size: 20,
            max_rescan_depth: 5,
        }
    }
}

/// Parsing and change detection for one item type.
pub struct IndexStrategy<T> {
    /// Name of the corpus, used in log output.
    pub corpus: &'static str,
    /// Parse the full text of a file into items.
    pub parse: fn(&Path, &str) -> Vec<T>,
    /// Report whether two items are equivalent for change detection.
    pub same: fn(&T, &T) -> bool,
}

impl<T> Clone for IndexStrategy<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for IndexStrategy<T> {}

impl<T> std::fmt::Debug for IndexStrategy<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexStrategy")
            .field("corpus", &self.corpus)
            .finish_non_exhaustive()
    }
}

/// Notification delivered to subscribers after a committed change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexChange {
    /// Index version after the change.
    pub version: u64,
    /// The file that changed, or `None` for changes spanning many files.
    pub path: Option<PathBuf>,
}

/// Handle returned by [`IncrementalIndex::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber = Arc<dyn Fn(&IndexChange) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Created,
    Active,
    Disposed,
}

struct IndexState<T> {
    files: IndexMap<PathBuf, Vec<Arc<T>>>,
    flat: Option<Arc<[Arc<T>]>>,
    /// Files with a scan in flight, mapped to their queued-rescan flag.
    scanning: HashMap<PathBuf, bool>,
    version: u64,
    globs: CorpusGlobs,
    filter: Option<Arc<GlobFilter>>,
    rescan_running: bool,
    rescan_pending: bool,
    lifecycle: Lifecycle,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_subscription: u64,
}

/// Subscribers to call once the state lock has been released.
#[must_use]
struct Pending {
    change: IndexChange,
    subscribers: Vec<Subscriber>,
}

impl Pending {
    fn deliver(self) {
        for subscriber in &self.subscribers {
            subscriber(&self.change);
        }
    }
}

impl<T> IndexState<T> {
    fn commit_change(&mut self, path: Option<&Path>) -> Pending {
        self.flat = None;
        self.version += 1;
        Pending {
            change: IndexChange {
                version: self.version,
                path: path.map(Path::to_path_buf),
            },
            subscribers: self
                .subscribers
                .iter()
                .map(|(_, subscriber)| Arc::clone(subscriber))
                .collect(),
        }
    }
}

fn same_items<T>(previous: &[Arc<T>], next: &[T], same: fn(&T, &T) -> bool) -> bool {
    previous.len() == next.len()
        && previous
            .iter()
            .zip(next)
            .all(|(old, new)| same(old.as_ref(), new))
}

/// A file-to-items index kept in step with the workspace.
pub struct IncrementalIndex<T> {
    strategy: IndexStrategy<T>,
    reader: Arc<dyn SourceReader>,
    root: PathBuf,
    settings: ScanSettings,
    state: Mutex<IndexState<T>>,
}

impl<T> std::fmt::Debug for IncrementalIndex<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IncrementalIndex")
            .field("corpus", &self.strategy.corpus)
            .field("root", &self.root)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl<T: Send + Sync + 'static> IncrementalIndex<T> {
    /// Create an empty index over `root`.
    ///
    /// Nothing is read until [`initialize`](Self::initialize),
    /// [`scan_all`](Self::scan_all) or [`scan_file`](Self::scan_file) runs.
    #[must_use]
    pub fn new(
        strategy: IndexStrategy<T>,
        reader: Arc<dyn SourceReader>,
        root: impl Into<PathBuf>,
        globs: CorpusGlobs,
        settings: ScanSettings,
    ) -> Self {
        Self {
            strategy,
            reader,
            root: root.into(),
            settings,
            state: Mutex::new(IndexState {
                files: IndexMap::new(),
                flat: None,
                scanning: HashMap::new(),
                version: 0,
                globs,
                filter: None,
                rescan_running: false,
                rescan_pending: false,
                lifecycle: Lifecycle::Created,
                subscribers: Vec::new(),
                next_subscription: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, IndexState<T>> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn is_disposed(&self) -> bool {
        self.lock().lifecycle == Lifecycle::Disposed
    }

    /// Name of the indexed corpus.
    #[must_use]
    pub fn corpus(&self) -> &'static str {
        self.strategy.corpus
    }

    /// Workspace root the globs are resolved against.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The configured globs.
    #[must_use]
    pub fn globs(&self) -> CorpusGlobs {
        self.lock().globs.clone()
    }

    fn filter(&self) -> Arc<GlobFilter> {
        let mut state = self.lock();
        if let Some(filter) = &state.filter {
            return Arc::clone(filter);
        }
        let filter = Arc::new(GlobFilter::new(&self.root, &state.globs));
        state.filter = Some(Arc::clone(&filter));
        filter
    }

    /// Report whether `path` belongs to this index's corpus.
    #[must_use]
    pub fn matches(&self, path: &Path) -> bool {
        self.filter().accepts(path)
    }

    /// Parse one file and commit the result.
    ///
    /// If the file is already being scanned, the request is queued and this
    /// call returns at once; the running scan re-reads the file when it
    /// finishes, up to `max_rescan_depth` times. Read failures drop the file
    /// from the index and are logged, never returned.
    pub async fn scan_file(&self, path: &Path) {
        {
            let mut state = self.lock();
            if state.lifecycle == Lifecycle::Disposed {
                return;
            }
            if let Some(queued) = state.scanning.get_mut(path) {
                *queued = true;
                trace!(corpus = self.strategy.corpus, path = %path.display(), "scan queued");
                return;
            }
            state.scanning.insert(path.to_path_buf(), false);
        }

        let mut replays = 0usize;
        loop {
            self.scan_once(path).await;
            let replay = {
                let mut state = self.lock();
                let queued = state.scanning.get(path).copied().unwrap_or(false);
                if queued && replays < self.settings.max_rescan_depth {
                    state.scanning.insert(path.to_path_buf(), false);
                    true
                } else {
                    state.scanning.remove(path);
                    if queued {
                        warn!(
                            corpus = self.strategy.corpus,
                            path = %path.display(),
                            replays,
                            "file keeps changing; giving up until the next change"
                        );
                    }
                    false
                }
            };
            if !replay {
                break;
            }
            replays += 1;
        }
    }

    async fn scan_once(&self, path: &Path) {
        match self.reader.read_to_string(path).await {
            Ok(text) => {
                let items = (self.strategy.parse)(path, &text);
                self.commit(path, items);
            }
            Err(source) => {
                let err = ScanError::Read {
                    path: path.to_path_buf(),
                    source,
                };
                warn!(corpus = self.strategy.corpus, error = %err, "dropping unreadable file");
                self.evict(path, false);
            }
        }
    }

    fn commit(&self, path: &Path, items: Vec<T>) {
        let count = items.len();
        let pending = {
            let mut state = self.lock();
            if state.lifecycle == Lifecycle::Disposed {
                return;
            }
            if let Some(previous) = state.files.get(path) {
                if same_items(previous, &items, self.strategy.same) {
                    trace!(corpus = self.strategy.corpus, path = %path.display(), "unchanged");
                    return;
                }
            }
            state
                .files
                .insert(path.to_path_buf(), items.into_iter().map(Arc::new).collect());
            state.commit_change(Some(path))
        };
        debug!(
            corpus = self.strategy.corpus,
            path = %path.display(),
            items = count,
            version = pending.change.version,
            "indexed file"
        );
        pending.deliver();
    }

    /// Drop `path`, and every tracked file beneath it, without reading.
    ///
    /// A scan of an affected file that is still in flight is queued for a
    /// replay, so content it read before the removal is not left behind.
    /// Returns whether anything was removed.
    pub fn remove_file(&self, path: &Path) -> bool {
        self.evict(path, true)
    }

    fn evict(&self, path: &Path, requeue: bool) -> bool {
        let pending = {
            let mut state = self.lock();
            if requeue {
                for (scanning, queued) in &mut state.scanning {
                    if scanning.starts_with(path) {
                        *queued = true;
                    }
                }
            }
            let before = state.files.len();
            state.files.retain(|tracked, _| !tracked.starts_with(path));
            if state.files.len() == before {
                return false;
            }
            state.commit_change(Some(path))
        };
        debug!(corpus = self.strategy.corpus, path = %path.display(), "removed from index");
        pending.deliver();
        true
    }

    fn retain_only(&self, keep: &[PathBuf]) {
        let keep: HashSet<&Path> = keep.iter().map(PathBuf::as_path).collect();
        let pending = {
            let mut state = self.lock();
            let before = state.files.len();
            state.files.retain(|tracked, _| keep.contains(tracked.as_path()));
            let removed = before - state.files.len();
            if removed == 0 {
                return;
            }
            debug!(corpus = self.strategy.corpus, removed, "dropped files outside the glob set");
            state.commit_change(None)
        };
        pending.deliver();
    }

    /// Resolve the glob set and scan every matching file.
    ///
    /// Tracked files that no longer match are dropped. Files are read in
    /// batches of `batch_size`.
    pub async fn scan_all(&self) {
        if self.is_disposed() {
            return;
        }
        let paths = match find_matching_files(&self.root, self.filter()).await {
            Ok(paths) => paths,
            Err(err) => {
                warn!(corpus = self.strategy.corpus, error = %err, "failed to enumerate files");
                return;
            }
        };

        self.retain_only(&paths);
        info!(corpus = self.strategy.corpus, files = paths.len(), "scanning workspace");
        for batch in paths.chunks(self.settings.batch_size.max(1)) {
            join_all(batch.iter().map(|path| self.scan_file(path))).await;
        }
    }

    /// Rebuild the whole index.
    ///
    /// Calls made while a rebuild is running coalesce into exactly one
    /// further pass, which starts when the running pass completes.
    pub async fn rescan(&self) {
        {
            let mut state = self.lock();
            if state.lifecycle == Lifecycle::Disposed {
                return;
            }
            if state.rescan_running {
                state.rescan_pending = true;
                trace!(corpus = self.strategy.corpus, "rescan pending");
                return;
            }
            state.rescan_running = true;
        }

        loop {
            self.scan_all().await;
            let again = {
                let mut state = self.lock();
                let again = state.rescan_pending && state.lifecycle != Lifecycle::Disposed;
                state.rescan_pending = false;
                if !again {
                    state.rescan_running = false;
                }
                again
            };
            if !again {
                break;
            }
        }
    }

    /// Route a watcher event to this index.
    ///
    /// Creations and modifications of matching files are scanned; removals
    /// drop the path directly. A tracked file that stopped matching is
    /// dropped.
    pub async fn handle_file_event(&self, event: &FileEvent) {
        match event {
            FileEvent::Created(path) | FileEvent::Modified(path) => {
                if self.matches(path) {
                    self.scan_file(path).await;
                } else if self.is_tracked(path) {
                    self.remove_file(path);
                }
            }
            FileEvent::Removed(path) => {
                self.remove_file(path);
            }
        }
    }

    /// Replace the glob configuration and rebuild.
    ///
    /// Does nothing when `globs` equals the current configuration.
    pub async fn set_patterns(&self, globs: CorpusGlobs) {
        {
            let mut state = self.lock();
            if state.globs == globs {
                return;
            }
            state.globs = globs;
            state.filter = None;
        }
        info!(corpus = self.strategy.corpus, "glob patterns changed; rescanning");
        self.rescan().await;
    }

    /// Activate the index and run a full scan.
    ///
    /// Calling this on an active index does nothing. A disposed index is
    /// re-armed.
    pub async fn initialize(&self) {
        {
            let mut state = self.lock();
            if state.lifecycle == Lifecycle::Active {
                return;
            }
            state.lifecycle = Lifecycle::Active;
        }
        info!(corpus = self.strategy.corpus, root = %self.root.display(), "initialising index");
        self.rescan().await;
    }

    /// Clear all state and subscribers. Later scans are ignored until
    /// [`initialize`](Self::initialize) runs again.
    pub fn dispose(&self) {
        let mut state = self.lock();
        if state.lifecycle == Lifecycle::Disposed {
            return;
        }
        state.lifecycle = Lifecycle::Disposed;
        if !state.files.is_empty() {
            state.files.clear();
            state.flat = None;
            state.version += 1;
        }
        state.scanning.clear();
        state.rescan_pending = false;
        state.subscribers.clear();
        info!(corpus = self.strategy.corpus, "index disposed");
    }

    /// All items, concatenated in file-insertion order.
    ///
    /// The view is cached until the next change.
    #[must_use]
    pub fn flat_items(&self) -> Arc<[Arc<T>]> {
        self.snapshot().1
    }

    /// The current version together with the flat view it describes.
    #[must_use]
    pub fn snapshot(&self) -> (u64, Arc<[Arc<T>]>) {
        let mut state = self.lock();
        if let Some(flat) = &state.flat {
            return (state.version, Arc::clone(flat));
        }
        let flat: Arc<[Arc<T>]> = state.files.values().flatten().cloned().collect();
        state.flat = Some(Arc::clone(&flat));
        (state.version, flat)
    }

    /// Items parsed from `path`.
    #[must_use]
    pub fn items_for_file(&self, path: &Path) -> Vec<Arc<T>> {
        self.lock().files.get(path).cloned().unwrap_or_default()
    }

    /// Tracked files in insertion order.
    #[must_use]
    pub fn files(&self) -> Vec<PathBuf> {
        self.lock().files.keys().cloned().collect()
    }

    /// Report whether `path` is tracked.
    #[must_use]
    pub fn is_tracked(&self, path: &Path) -> bool {
        self.lock().files.contains_key(path)
    }

    /// Number of committed changes so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.lock().version
    }

    /// Call `subscriber` after every committed change.
    ///
    /// Subscribers run after the version has been bumped and the flat view
    /// invalidated, outside the index lock.
    pub fn subscribe(
        &self,
        subscriber: impl Fn(&IndexChange) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let mut state = self.lock();
        let id = SubscriptionId(state.next_subscription);
        state.next_subscription += 1;
        state.subscribers.push((id, Arc::new(subscriber)));
        id
    }

    /// Remove a subscriber. Returns whether it was registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut state = self.lock();
        let before = state.subscribers.len();
        state.subscribers.retain(|(registered, _)| *registered != id);
        state.subscribers.len() != before
    }
}
