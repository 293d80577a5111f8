//! Filesystem collaborators: glob matching, enumeration, reading, watching.

mod files;
mod path_matcher;
mod reader;
mod watcher;

pub use files::find_matching_files;
pub use path_matcher::{CorpusGlobs, GlobFilter, PathMatcher, matches};
pub use reader::{DiskReader, DocumentStore, OpenDocument, OverlayReader, SourceReader};
pub use watcher::{FileEvent, FileWatcher, translate};
