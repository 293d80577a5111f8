//! Step occurrences parsed from Gherkin feature files.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use behave_lsp_patterns::{
    DefinitionKeyword, StepKeyword, StepToken, compile_pattern, parse_step_line,
};
use lru::LruCache;
use regex::Regex;
use tracing::{debug, warn};

use super::{IncrementalIndex, IndexStrategy, ScanSettings};
use crate::util::{byte_to_utf16_col, line_u32, utf16_len};
use crate::workspace::{CorpusGlobs, SourceReader};

const STRUCTURAL_HEADERS: &[&str] = &[
    "Feature",
    "Rule",
    "Background",
    "Scenario",
    "Scenario Outline",
    "Scenario Template",
    "Example",
    "Examples",
    "Scenarios",
];

const DOCSTRING_FENCES: &[&str] = &["\"\"\"", "```"];

const PATTERN_CACHE_CAPACITY: NonZeroUsize = match NonZeroUsize::new(128) {
    Some(capacity) => capacity,
    None => NonZeroUsize::MIN,
};

/// Report whether `line` opens a feature, rule, background, scenario or
/// examples block.
#[must_use]
pub fn is_structural_header(line: &str) -> bool {
    let Some((head, _)) = line.trim_start().split_once(':') else {
        return false;
    };
    let head = head.trim_end();
    STRUCTURAL_HEADERS
        .iter()
        .any(|header| head.eq_ignore_ascii_case(header))
}

fn docstring_fence(line: &str) -> Option<&'static str> {
    let trimmed = line.trim_start();
    DOCSTRING_FENCES
        .iter()
        .copied()
        .find(|fence| trimmed.starts_with(fence))
}

/// A step line recognised by [`StepScanner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScannedStep<'a> {
    /// Zero-based line index.
    pub line: usize,
    /// The token opening the line.
    pub token: StepToken,
    /// The token as written.
    pub keyword: &'a str,
    /// Step text without the keyword, trimmed.
    pub text: &'a str,
    /// Byte offset of `text` within the line.
    pub text_offset: usize,
    /// Keyword inherited from the enclosing block, if any.
    pub effective_keyword: Option<StepKeyword>,
}

/// Line-by-line walker over a feature file.
///
/// Tracks the keyword context, which structural headers reset, and skips
/// doc-string blocks so their contents are never mistaken for steps.
#[derive(Debug, Default)]
pub struct StepScanner {
    context: Option<StepKeyword>,
    fence: Option<&'static str>,
}

impl StepScanner {
    /// Start a scan at the top of a document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next line; returns the step it holds, if any.
    pub fn feed<'a>(&mut self, line_index: usize, line: &'a str) -> Option<ScannedStep<'a>> {
        if let Some(open) = self.fence {
            if line.trim_start().starts_with(open) {
                self.fence = None;
            }
            return None;
        }
        if let Some(fence) = docstring_fence(line) {
            self.fence = Some(fence);
            return None;
        }
        if is_structural_header(line) {
            self.context = None;
            return None;
        }
        let step = parse_step_line(line)?;
        if step.text.is_empty() {
            return None;
        }
        let effective_keyword = step.token.resolve(&mut self.context);
        Some(ScannedStep {
            line: line_index,
            token: step.token,
            keyword: step.keyword,
            text: step.text,
            text_offset: step.text_offset,
            effective_keyword,
        })
    }
}

/// A step as it appears in a feature file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOccurrence {
    /// The token exactly as written.
    pub raw_keyword: String,
    /// The parsed token.
    pub token: StepToken,
    /// Step text without the keyword.
    pub text: String,
    /// Resolved keyword; `None` for a continuation with no antecedent in
    /// its block.
    pub effective_keyword: Option<StepKeyword>,
    /// Feature file containing the step.
    pub path: PathBuf,
    /// Zero-based line.
    pub line: u32,
    /// Zero-based UTF-16 column where `text` starts.
    pub column: u32,
    /// Length of `text` in UTF-16 code units.
    pub length: u32,
}

impl StepOccurrence {
    /// Change-detection equality. Occurrences from one file never differ by
    /// path.
    #[must_use]
    pub fn same_occurrence(&self, other: &Self) -> bool {
        self == other
    }
}

/// Parse every step line of a feature file.
#[must_use]
pub fn parse_occurrences(path: &Path, text: &str) -> Vec<StepOccurrence> {
    let mut scanner = StepScanner::new();
    text.lines()
        .enumerate()
        .filter_map(|(index, line)| {
            let step = scanner.feed(index, line)?;
            Some(StepOccurrence {
                raw_keyword: step.keyword.to_string(),
                token: step.token,
                text: step.text.to_string(),
                effective_keyword: step.effective_keyword,
                path: path.to_path_buf(),
                line: line_u32(index),
                column: byte_to_utf16_col(line, step.text_offset),
                length: utf16_len(step.text),
            })
        })
        .collect()
}

#[derive(Debug)]
struct OccurrenceBuckets {
    version: u64,
    all: Arc<[Arc<StepOccurrence>]>,
    by_keyword: HashMap<StepKeyword, Vec<Arc<StepOccurrence>>>,
}

impl OccurrenceBuckets {
    fn build(version: u64, all: Arc<[Arc<StepOccurrence>]>) -> Self {
        let mut by_keyword: HashMap<StepKeyword, Vec<Arc<StepOccurrence>>> = HashMap::new();
        for occurrence in all.iter() {
            if let Some(keyword) = occurrence.effective_keyword {
                by_keyword
                    .entry(keyword)
                    .or_default()
                    .push(Arc::clone(occurrence));
            }
        }
        Self {
            version,
            all,
            by_keyword,
        }
    }

    fn candidates(&self, keyword: Option<DefinitionKeyword>) -> &[Arc<StepOccurrence>] {
        let step_keyword = match keyword {
            Some(DefinitionKeyword::Given) => StepKeyword::Given,
            Some(DefinitionKeyword::When) => StepKeyword::When,
            Some(DefinitionKeyword::Then) => StepKeyword::Then,
            Some(DefinitionKeyword::Any) | None => return &self.all,
        };
        self.by_keyword
            .get(&step_keyword)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// Index of step occurrences across the workspace's feature files.
#[derive(Debug)]
pub struct StepUsageIndex {
    index: IncrementalIndex<StepOccurrence>,
    buckets: Mutex<Option<Arc<OccurrenceBuckets>>>,
    patterns: Mutex<LruCache<String, Option<Arc<Regex>>>>,
}

impl StepUsageIndex {
    /// Strategy used for feature files.
    pub const STRATEGY: IndexStrategy<StepOccurrence> = IndexStrategy {
        corpus: "step usages",
        parse: parse_occurrences,
        same: StepOccurrence::same_occurrence,
    };

    /// Create an empty index over `root`.
    #[must_use]
    pub fn new(
        reader: Arc<dyn SourceReader>,
        root: impl Into<PathBuf>,
        globs: CorpusGlobs,
        settings: ScanSettings,
    ) -> Self {
        Self {
            index: IncrementalIndex::new(Self::STRATEGY, reader, root, globs, settings),
            buckets: Mutex::new(None),
            patterns: Mutex::new(LruCache::new(PATTERN_CACHE_CAPACITY)),
        }
    }

    /// The underlying file index.
    #[must_use]
    pub fn index(&self) -> &IncrementalIndex<StepOccurrence> {
        &self.index
    }

    fn buckets(&self) -> Arc<OccurrenceBuckets> {
        let (version, all) = self.index.snapshot();
        let mut cached = match self.buckets.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(buckets) = cached.as_ref().filter(|buckets| buckets.version == version) {
            return Arc::clone(buckets);
        }
        let buckets = Arc::new(OccurrenceBuckets::build(version, all));
        *cached = Some(Arc::clone(&buckets));
        buckets
    }

    fn lock_patterns(&self) -> MutexGuard<'_, LruCache<String, Option<Arc<Regex>>>> {
        match self.patterns.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Compile `pattern` through the bounded cache.
    ///
    /// Failures are cached too, so a broken pattern is reported once.
    fn matcher(&self, pattern: &str) -> Option<Arc<Regex>> {
        let mut cache = self.lock_patterns();
        if let Some(cached) = cache.get(pattern) {
            return cached.clone();
        }
        let compiled = match compile_pattern(pattern) {
            Ok(regex) => Some(Arc::new(regex)),
            Err(err) => {
                warn!(pattern, error = %err, "cannot compile pattern for usage search");
                None
            }
        };
        cache.put(pattern.to_string(), compiled.clone());
        compiled
    }

    /// Occurrences whose text matches `pattern`.
    ///
    /// `keyword` narrows the search to occurrences resolved to the same
    /// keyword; `None` and [`DefinitionKeyword::Any`] search every
    /// occurrence, including unresolved ones.
    #[must_use]
    pub fn find_matching_occurrences(
        &self,
        pattern: &str,
        keyword: Option<DefinitionKeyword>,
    ) -> Vec<Arc<StepOccurrence>> {
        let Some(matcher) = self.matcher(pattern) else {
            return Vec::new();
        };
        let buckets = self.buckets();
        let found: Vec<_> = buckets
            .candidates(keyword)
            .iter()
            .filter(|occurrence| matcher.is_match(occurrence.text.trim()))
            .cloned()
            .collect();
        debug!(pattern, matches = found.len(), "usage search");
        found
    }

    /// Every occurrence in file-insertion order.
    #[must_use]
    pub fn all(&self) -> Arc<[Arc<StepOccurrence>]> {
        self.index.flat_items()
    }

    /// Current version of the underlying index.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.index.version()
    }

    /// Number of patterns held by the matcher cache.
    #[must_use]
    pub fn cached_patterns(&self) -> usize {
        self.lock_patterns().len()
    }
}
