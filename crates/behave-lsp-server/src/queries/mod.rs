//! Queries answered from the two step indexes.
//!
//! [`StepQueries`] is read-only with respect to the indexes: it looks items
//! up through their public methods and holds nothing but a small cache of
//! definition lookups, keyed by the definition index version so that a
//! committed change retires every stale entry.

#[cfg(test)]
mod tests;

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use behave_lsp_patterns::{
    DefinitionKeyword, LineAccess, StepAnnotation, StepKeyword, StepToken,
    compile_annotation_line, is_comment_or_blank, parse_step_line, resolve_effective_keyword,
    to_snippet,
};
use indexmap::IndexSet;
use lru::LruCache;
use thiserror::Error;
use tracing::debug;

use crate::indexing::{StepDefinition, StepDefinitionIndex, StepScanner, StepUsageIndex};
use crate::util::{byte_to_utf16_col, line_u32, utf16_len};

/// Lines scanned between checks that a diagnostics run is still wanted.
const CHECK_INTERVAL: usize = 200;

const LOOKUP_CACHE_CAPACITY: NonZeroUsize = match NonZeroUsize::new(256) {
    Some(capacity) => capacity,
    None => NonZeroUsize::MIN,
};

/// Where a step definition lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    /// Source file.
    pub path: PathBuf,
    /// Zero-based line of the decorator.
    pub line: u32,
    /// Zero-based UTF-16 column of the decorator.
    pub column: u32,
}

impl From<&StepDefinition> for SourceLocation {
    fn from(definition: &StepDefinition) -> Self {
        Self {
            path: definition.path.clone(),
            line: definition.line,
            column: definition.column,
        }
    }
}

/// Where a step is used.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UsageLocation {
    /// Feature file.
    pub path: PathBuf,
    /// Zero-based line.
    pub line: u32,
    /// Zero-based UTF-16 column of the step text.
    pub column: u32,
    /// Length of the step text in UTF-16 code units.
    pub length: u32,
}

/// A step with no matching definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepDiagnostic {
    /// Zero-based line.
    pub line: u32,
    /// UTF-16 column where the step text starts.
    pub column_start: u32,
    /// UTF-16 column where the step text ends.
    pub column_end: u32,
    /// Human-readable description.
    pub message: String,
}

/// A definition offered while typing a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionCandidate {
    /// Pattern as written in the decorator.
    pub pattern: String,
    /// Pattern in snippet syntax with one tab stop per placeholder.
    pub snippet: String,
    /// Where the definition lives.
    pub location: SourceLocation,
    /// Keyword class of the definition.
    pub keyword: DefinitionKeyword,
    /// Name of the decorated function, when known.
    pub function_name: Option<String>,
}

/// Precondition failures at the query boundary.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    /// The requested line is neither a step decorator nor the function
    /// directly below one.
    #[error("no step decorator at line {}", .line + 1)]
    NoStepDecorator {
        /// Zero-based line that was queried.
        line: usize,
    },
}

type LookupKey = (u64, Option<StepKeyword>, String);

/// Presents `line` of `lines` as a different text.
///
/// Used to resolve the keyword of a line the user is still typing.
struct LineOverride<'a, L: ?Sized> {
    lines: &'a L,
    line: usize,
    text: String,
}

impl<L: LineAccess + ?Sized> LineAccess for LineOverride<'_, L> {
    fn line_count(&self) -> usize {
        self.lines.line_count().max(self.line + 1)
    }

    fn line_at(&self, index: usize) -> Option<&str> {
        if index == self.line {
            Some(&self.text)
        } else {
            self.lines.line_at(index)
        }
    }
}

fn is_decorator(line: &str) -> bool {
    line.trim_start().starts_with('@')
}

/// Step decorators stacked above the function at or below `line`.
fn decorator_block<L: LineAccess + ?Sized>(lines: &L, line: usize) -> Vec<StepAnnotation> {
    let mut anchor = line;
    while let Some(text) = lines.line_at(anchor) {
        if !is_decorator(text) && !is_comment_or_blank(text) {
            break;
        }
        anchor += 1;
    }

    let mut annotations = Vec::new();
    for index in (0..anchor).rev() {
        let Some(text) = lines.line_at(index) else {
            break;
        };
        if is_comment_or_blank(text) {
            continue;
        }
        if !is_decorator(text) {
            break;
        }
        if let Some(annotation) = compile_annotation_line(text) {
            annotations.push(annotation);
        }
    }
    annotations.reverse();
    annotations
}

/// Query layer over a definition index and a usage index.
pub struct StepQueries {
    definitions: Arc<StepDefinitionIndex>,
    usages: Arc<StepUsageIndex>,
    lookups: Mutex<LruCache<LookupKey, Arc<[Arc<StepDefinition>]>>>,
}

impl std::fmt::Debug for StepQueries {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepQueries")
            .field("definitions", &self.definitions)
            .field("usages", &self.usages)
            .finish_non_exhaustive()
    }
}

impl StepQueries {
    /// Query the given indexes.
    #[must_use]
    pub fn new(definitions: Arc<StepDefinitionIndex>, usages: Arc<StepUsageIndex>) -> Self {
        Self {
            definitions,
            usages,
            lookups: Mutex::new(LruCache::new(LOOKUP_CACHE_CAPACITY)),
        }
    }

    /// The definition index.
    #[must_use]
    pub fn definitions(&self) -> &Arc<StepDefinitionIndex> {
        &self.definitions
    }

    /// The usage index.
    #[must_use]
    pub fn usages(&self) -> &Arc<StepUsageIndex> {
        &self.usages
    }

    fn lock_lookups(&self) -> MutexGuard<'_, LruCache<LookupKey, Arc<[Arc<StepDefinition>]>>> {
        match self.lookups.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Definitions accepting `text` under `keyword`, memoised per index
    /// version.
    fn lookup(&self, keyword: Option<StepKeyword>, text: &str) -> Arc<[Arc<StepDefinition>]> {
        let key = (self.definitions.version(), keyword, text.trim().to_string());
        if let Some(found) = self.lock_lookups().get(&key) {
            return Arc::clone(found);
        }
        let found: Arc<[Arc<StepDefinition>]> =
            self.definitions.definitions_matching(keyword, text).into();
        self.lock_lookups().put(key, Arc::clone(&found));
        found
    }

    /// Definitions implementing the step on `line`.
    ///
    /// Continuation steps take their keyword from the document; a step whose
    /// keyword cannot be resolved is checked against every definition. A
    /// line that is not a step yields nothing.
    #[must_use]
    pub fn find_definition<L: LineAccess + ?Sized>(
        &self,
        lines: &L,
        line: usize,
    ) -> Vec<SourceLocation> {
        let Some(step) = lines.line_at(line).and_then(parse_step_line) else {
            return Vec::new();
        };
        let keyword = resolve_effective_keyword(lines, line);
        self.lookup(keyword, step.text)
            .iter()
            .map(|definition| SourceLocation::from(definition.as_ref()))
            .collect()
    }

    /// Feature steps matched by the decorators of the function at `line`.
    ///
    /// `line` may point at any decorator of the block or at the `def` line
    /// directly below it. Results from several decorators are merged without
    /// duplicates, in discovery order.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::NoStepDecorator`] when no step decorator is
    /// attached to the function at `line`.
    pub fn find_usages<L: LineAccess + ?Sized>(
        &self,
        lines: &L,
        line: usize,
    ) -> Result<Vec<UsageLocation>, QueryError> {
        let annotations = decorator_block(lines, line);
        if annotations.is_empty() {
            return Err(QueryError::NoStepDecorator { line });
        }

        let mut found = IndexSet::new();
        for annotation in &annotations {
            for occurrence in self
                .usages
                .find_matching_occurrences(&annotation.pattern, Some(annotation.keyword))
            {
                found.insert(UsageLocation {
                    path: occurrence.path.clone(),
                    line: occurrence.line,
                    column: occurrence.column,
                    length: occurrence.length,
                });
            }
        }
        debug!(
            decorators = annotations.len(),
            usages = found.len(),
            "resolved step usages"
        );
        Ok(found.into_iter().collect())
    }

    /// Steps in `text` with no matching definition.
    #[must_use]
    pub fn compute_diagnostics(&self, text: &str) -> Vec<StepDiagnostic> {
        self.compute_diagnostics_checked(text, || true)
            .unwrap_or_default()
    }

    /// Steps in `text` with no matching definition, abandoning the run when
    /// the document moves on.
    ///
    /// `still_current` is polled every few hundred lines and once more before
    /// returning; when it reports `false` the partial result is discarded and
    /// `None` is returned.
    pub fn compute_diagnostics_checked(
        &self,
        text: &str,
        mut still_current: impl FnMut() -> bool,
    ) -> Option<Vec<StepDiagnostic>> {
        let lines: Vec<&str> = text.lines().collect();
        let mut scanner = StepScanner::new();
        let mut diagnostics = Vec::new();
        let mut until_check = CHECK_INTERVAL;

        for (index, line) in lines.iter().enumerate() {
            until_check -= 1;
            if until_check == 0 {
                if !still_current() {
                    debug!(line = index, "document changed; abandoning diagnostics");
                    return None;
                }
                until_check = CHECK_INTERVAL;
            }

            let Some(step) = scanner.feed(index, line) else {
                continue;
            };
            let keyword = resolve_effective_keyword(&lines, index);
            if !self.lookup(keyword, step.text).is_empty() {
                continue;
            }
            let column_start = byte_to_utf16_col(line, step.text_offset);
            diagnostics.push(StepDiagnostic {
                line: line_u32(index),
                column_start,
                column_end: column_start.saturating_add(utf16_len(step.text)),
                message: format!("Undefined step: {} {}", step.keyword, step.text),
            });
        }

        still_current().then_some(diagnostics)
    }

    /// Definitions offered for completion under `keyword`.
    ///
    /// Patterns are deduplicated (first definition wins) and sorted
    /// case-insensitively. A non-empty `partial_text` keeps only patterns
    /// containing it, case-insensitively, with prefix matches first.
    #[must_use]
    pub fn completion_candidates(
        &self,
        keyword: Option<StepKeyword>,
        partial_text: &str,
    ) -> Vec<CompletionCandidate> {
        let definitions = match keyword {
            Some(keyword) => self.definitions.definitions_for(keyword),
            None => self.definitions.all().to_vec(),
        };

        let mut seen = IndexSet::new();
        let mut unique: Vec<Arc<StepDefinition>> = definitions
            .into_iter()
            .filter(|definition| seen.insert(definition.pattern.clone()))
            .collect();
        unique.sort_by_cached_key(|definition| definition.pattern.to_lowercase());

        let needle = partial_text.trim().to_lowercase();
        if !needle.is_empty() {
            unique.retain(|definition| definition.pattern.to_lowercase().contains(&needle));
            unique.sort_by_key(|definition| !definition.pattern.to_lowercase().starts_with(&needle));
        }

        unique
            .iter()
            .map(|definition| CompletionCandidate {
                pattern: definition.pattern.clone(),
                snippet: to_snippet(&definition.pattern),
                location: SourceLocation::from(definition.as_ref()),
                keyword: definition.keyword,
                function_name: definition.function_name.clone(),
            })
            .collect()
    }

    /// Completion candidates for a step being typed on `line`.
    ///
    /// `partial_token` is the keyword typed so far. Direct keywords are used
    /// as they are; continuation keywords are resolved against the rest of
    /// the document, and one that resolves to nothing offers every
    /// definition. A token that is not a step keyword offers nothing.
    #[must_use]
    pub fn completion_candidates_at<L: LineAccess + ?Sized>(
        &self,
        lines: &L,
        line: usize,
        partial_token: &str,
        partial_text: &str,
    ) -> Vec<CompletionCandidate> {
        let Ok(token) = partial_token.parse::<StepToken>() else {
            return Vec::new();
        };
        let keyword = token.direct().or_else(|| {
            let typed = LineOverride {
                lines,
                line,
                text: format!("{} {partial_text}", token.as_str()),
            };
            resolve_effective_keyword(&typed, line)
        });
        self.completion_candidates(keyword, partial_text)
    }
}
