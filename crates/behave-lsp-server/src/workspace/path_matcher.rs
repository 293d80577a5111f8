//! Glob matching for corpus membership.

use std::path::{Path, PathBuf};

use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};
use tracing::warn;

fn build_glob(pattern: &str) -> Result<Glob, globset::Error> {
    GlobBuilder::new(pattern)
        .case_insensitive(true)
        .literal_separator(true)
        .build()
}

fn build_sets<S: AsRef<str>>(patterns: &[S]) -> (GlobSet, GlobSet) {
    let mut full = GlobSetBuilder::new();
    let mut basename = GlobSetBuilder::new();
    for pattern in patterns {
        let pattern = pattern.as_ref();
        match build_glob(pattern) {
            Ok(glob) if pattern.contains('/') => {
                full.add(glob);
            }
            Ok(glob) => {
                full.add(glob.clone());
                basename.add(glob);
            }
            Err(err) => warn!(pattern, error = %err, "ignoring invalid glob"),
        }
    }
    let finish = |builder: GlobSetBuilder| {
        builder.build().unwrap_or_else(|err| {
            warn!(error = %err, "failed to build glob set");
            GlobSet::empty()
        })
    };
    (finish(full), finish(basename))
}

fn is_match_in(full: &GlobSet, basename: &GlobSet, path: &Path) -> bool {
    full.is_match(path)
        || path
            .file_name()
            .is_some_and(|name| basename.is_match(Path::new(name)))
}

/// Report whether `path` matches any of `patterns`.
///
/// Matching is case-insensitive. A pattern without `/` also matches the
/// file's base name anywhere in the tree. Patterns are compiled on every
/// call; hold a [`PathMatcher`] to reuse them.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use behave_lsp_server::workspace::matches;
///
/// assert!(matches(Path::new("features/steps/math_steps.py"), &["**/steps/**/*.py"]));
/// assert!(matches(Path::new("deep/tree/Login.FEATURE"), &["*.feature"]));
/// assert!(!matches(Path::new("src/app.py"), &["**/steps/**/*.py"]));
/// ```
#[must_use]
pub fn matches<S: AsRef<str>>(path: &Path, patterns: &[S]) -> bool {
    let (full, basename) = build_sets(patterns);
    is_match_in(&full, &basename, path)
}

/// A compiled glob set anchored at a workspace root.
#[derive(Debug, Clone)]
pub struct PathMatcher {
    root: PathBuf,
    full: GlobSet,
    basename: GlobSet,
}

impl PathMatcher {
    /// Compile `patterns` relative to `root`. Invalid globs are skipped.
    #[must_use]
    pub fn new<S: AsRef<str>>(root: impl Into<PathBuf>, patterns: &[S]) -> Self {
        let (full, basename) = build_sets(patterns);
        Self {
            root: root.into(),
            full,
            basename,
        }
    }

    /// Report whether `path` matches.
    ///
    /// Paths inside the root are matched relative to it; other paths are
    /// matched as given.
    #[must_use]
    pub fn is_match(&self, path: &Path) -> bool {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        is_match_in(&self.full, &self.basename, relative)
    }

    /// Report whether the matcher holds no usable globs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.full.is_empty()
    }
}

/// Include and exclude globs for one corpus.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorpusGlobs {
    /// Globs a file must match to be indexed.
    pub patterns: Vec<String>,
    /// Globs that keep a file out of the index.
    pub excludes: Vec<String>,
}

impl CorpusGlobs {
    /// Bundle include and exclude globs.
    #[must_use]
    pub fn new(patterns: Vec<String>, excludes: Vec<String>) -> Self {
        Self { patterns, excludes }
    }
}

/// Include/exclude filter deciding corpus membership.
#[derive(Debug, Clone)]
pub struct GlobFilter {
    include: PathMatcher,
    exclude: PathMatcher,
}

impl GlobFilter {
    /// Compile `globs` relative to `root`.
    #[must_use]
    pub fn new(root: &Path, globs: &CorpusGlobs) -> Self {
        Self {
            include: PathMatcher::new(root, &globs.patterns),
            exclude: PathMatcher::new(root, &globs.excludes),
        }
    }

    /// Report whether `path` belongs to the corpus.
    #[must_use]
    pub fn accepts(&self, path: &Path) -> bool {
        self.include.is_match(path) && !self.exclude.is_match(path)
    }

    /// Report whether a directory can be skipped during traversal.
    ///
    /// A directory is pruned when the exclude globs cover its contents.
    #[must_use]
    pub fn prunes(&self, dir: &Path) -> bool {
        self.exclude.is_match(&dir.join("_"))
    }
}
