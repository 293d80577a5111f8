//! Step definitions parsed from Python step modules.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex, MutexGuard};

use behave_lsp_patterns::{
    DefinitionKeyword, PatternError, StepKeyword, compile_annotation_line, compile_pattern,
};
use regex::Regex;
use thiserror::Error;
use tracing::{debug, warn};

use super::{IncrementalIndex, IndexStrategy, ScanSettings};
use crate::util::{byte_to_utf16_col, line_u32};
use crate::workspace::{CorpusGlobs, SourceReader};

static FUNCTION_DEF: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\s*(?:async\s+)?def\s+([A-Za-z_]\w*)").ok());

/// A decorated step function.
#[derive(Debug, Clone)]
pub struct StepDefinition {
    /// Keyword class of the decorator.
    pub keyword: DefinitionKeyword,
    /// Pattern as written in the decorator.
    pub pattern: String,
    /// Compiled form of `pattern`.
    pub matcher: Regex,
    /// Source file containing the decorator.
    pub path: PathBuf,
    /// Zero-based line of the decorator.
    pub line: u32,
    /// Zero-based UTF-16 column of the `@`.
    pub column: u32,
    /// Name of the decorated function, when it could be found.
    pub function_name: Option<String>,
}

impl StepDefinition {
    /// Report whether the definition accepts a step's text.
    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        self.matcher.is_match(text.trim())
    }

    /// Change-detection equality: keyword, pattern, position and function
    /// name.
    ///
    /// The compiled matcher is derived from `pattern` and never compared.
    #[must_use]
    pub fn same_definition(&self, other: &Self) -> bool {
        self.keyword == other.keyword
            && self.pattern == other.pattern
            && self.line == other.line
            && self.column == other.column
            && self.function_name == other.function_name
    }
}

impl PartialEq for StepDefinition {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path && self.same_definition(other)
    }
}

impl Eq for StepDefinition {}

/// A decorator pattern that failed to compile.
#[derive(Debug, Error)]
#[error("cannot compile step pattern {pattern:?} at {}:{}: {source}", .path.display(), .line + 1)]
pub struct StepPatternCompileError {
    /// File containing the decorator.
    pub path: PathBuf,
    /// Zero-based line of the decorator.
    pub line: usize,
    /// The offending pattern.
    pub pattern: String,
    /// Why compilation failed.
    #[source]
    pub source: PatternError,
}

fn function_name_below(lines: &[&str], decorator: usize) -> Option<String> {
    let regex = FUNCTION_DEF.as_ref()?;
    let line = lines.iter().skip(decorator + 1).find(|line| {
        let trimmed = line.trim_start();
        !trimmed.is_empty() && !trimmed.starts_with('#') && !trimmed.starts_with('@')
    })?;
    regex
        .captures(line)
        .and_then(|captures| captures.get(1))
        .map(|name| name.as_str().to_string())
}

/// Parse every step decorator in a Python source file.
///
/// Each decorator produces its own definition, so a function stacked with
/// several decorators yields several. A decorator whose pattern does not
/// compile is logged and skipped; the rest of the file is still indexed.
/// Decorators spanning several physical lines are not recognised.
#[must_use]
pub fn parse_definitions(path: &Path, text: &str) -> Vec<StepDefinition> {
    let lines: Vec<&str> = text.lines().collect();
    let mut definitions = Vec::new();
    for (index, line) in lines.iter().enumerate() {
        let Some(annotation) = compile_annotation_line(line) else {
            continue;
        };
        match compile_pattern(&annotation.pattern) {
            Ok(matcher) => definitions.push(StepDefinition {
                keyword: annotation.keyword,
                matcher,
                path: path.to_path_buf(),
                line: line_u32(index),
                column: byte_to_utf16_col(line, annotation.column),
                function_name: function_name_below(&lines, index),
                pattern: annotation.pattern,
            }),
            Err(source) => {
                let err = StepPatternCompileError {
                    path: path.to_path_buf(),
                    line: index,
                    pattern: annotation.pattern,
                    source,
                };
                warn!(error = %err, "skipping step definition");
            }
        }
    }
    definitions
}

#[derive(Debug)]
struct KeywordBuckets {
    version: u64,
    by_keyword: HashMap<DefinitionKeyword, Vec<Arc<StepDefinition>>>,
}

impl KeywordBuckets {
    fn build(version: u64, definitions: &[Arc<StepDefinition>]) -> Self {
        let mut by_keyword: HashMap<DefinitionKeyword, Vec<Arc<StepDefinition>>> = HashMap::new();
        for definition in definitions {
            by_keyword
                .entry(definition.keyword)
                .or_default()
                .push(Arc::clone(definition));
        }
        Self {
            version,
            by_keyword,
        }
    }

    fn bucket(&self, keyword: DefinitionKeyword) -> &[Arc<StepDefinition>] {
        self.by_keyword
            .get(&keyword)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// Index of step definitions across the workspace's step modules.
///
/// Lookups by keyword go through buckets rebuilt lazily whenever the
/// underlying index version moves.
#[derive(Debug)]
pub struct StepDefinitionIndex {
    index: IncrementalIndex<StepDefinition>,
    buckets: Mutex<Option<Arc<KeywordBuckets>>>,
}

impl StepDefinitionIndex {
    /// Strategy used for step modules.
    pub const STRATEGY: IndexStrategy<StepDefinition> = IndexStrategy {
        corpus: "step definitions",
        parse: parse_definitions,
        same: StepDefinition::same_definition,
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
        }
    }

    /// The underlying file index.
    #[must_use]
    pub fn index(&self) -> &IncrementalIndex<StepDefinition> {
        &self.index
    }

    fn lock_buckets(&self) -> MutexGuard<'_, Option<Arc<KeywordBuckets>>> {
        match self.buckets.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn buckets(&self) -> Arc<KeywordBuckets> {
        let (version, definitions) = self.index.snapshot();
        let mut cached = self.lock_buckets();
        if let Some(buckets) = cached.as_ref().filter(|buckets| buckets.version == version) {
            return Arc::clone(buckets);
        }
        let buckets = Arc::new(KeywordBuckets::build(version, &definitions));
        debug!(version, definitions = definitions.len(), "rebuilt keyword buckets");
        *cached = Some(Arc::clone(&buckets));
        buckets
    }

    /// Definitions usable for steps resolved to `keyword`: that keyword's
    /// bucket followed by the `@step` bucket.
    #[must_use]
    pub fn definitions_for(&self, keyword: StepKeyword) -> Vec<Arc<StepDefinition>> {
        let buckets = self.buckets();
        buckets
            .bucket(keyword.into())
            .iter()
            .chain(buckets.bucket(DefinitionKeyword::Any))
            .cloned()
            .collect()
    }

    /// Definitions accepting `text` under `keyword`.
    ///
    /// An unresolved keyword (`None`) is checked against every definition.
    #[must_use]
    pub fn definitions_matching(
        &self,
        keyword: Option<StepKeyword>,
        text: &str,
    ) -> Vec<Arc<StepDefinition>> {
        let candidates = match keyword {
            Some(keyword) => self.definitions_for(keyword),
            None => self.index.flat_items().to_vec(),
        };
        candidates
            .into_iter()
            .filter(|definition| definition.matches(text))
            .collect()
    }

    /// Every definition in file-insertion order.
    #[must_use]
    pub fn all(&self) -> Arc<[Arc<StepDefinition>]> {
        self.index.flat_items()
    }

    /// Current version of the underlying index.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.index.version()
    }
}

#[cfg(test)]
#[expect(clippy::expect_used, reason = "tests fail fast on fixture setup")]
mod tests {
    use super::*;
    use crate::test_support::StaticReader;
    use rstest::rstest;

    const MATH_STEPS: &str = r#"from behave import given, when, then, step

@given("the first number is {number:d}")
def step_first_number(context, number):
    context.first = number


@given('a "{x}" value')
@given("a '{x}' value")
async def step_quoted(context, x):
    pass

@when(u"I add them")
# adds
def step_add(context):
    context.result = context.first + context.second

@then("the result is {result:d}")
def step_result(context, result):
    assert context.result == result

@step("the system is ready")
def step_ready(context):
    pass
"#;

    #[rstest]
    fn parses_every_decorator_with_positions() {
        let definitions = parse_definitions(Path::new("/w/steps/math_steps.py"), MATH_STEPS);
        let summary: Vec<_> = definitions
            .iter()
            .map(|d| (d.keyword, d.pattern.as_str(), d.line, d.function_name.as_deref()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (
                    DefinitionKeyword::Given,
                    "the first number is {number:d}",
                    2,
                    Some("step_first_number")
                ),
                (DefinitionKeyword::Given, "a \"{x}\" value", 7, Some("step_quoted")),
                (DefinitionKeyword::Given, "a '{x}' value", 8, Some("step_quoted")),
                (DefinitionKeyword::When, "I add them", 12, Some("step_add")),
                (DefinitionKeyword::Then, "the result is {result:d}", 17, Some("step_result")),
                (DefinitionKeyword::Any, "the system is ready", 21, Some("step_ready")),
            ]
        );
    }

    #[rstest]
    fn bad_pattern_skips_only_that_definition() {
        let text = "@given(\"a {broken value\")\ndef a(c): pass\n@given(\"fine\")\ndef b(c): pass\n";
        let definitions = parse_definitions(Path::new("steps.py"), text);
        assert_eq!(definitions.len(), 1);
        assert_eq!(definitions.first().map(|d| d.pattern.as_str()), Some("fine"));
    }

    #[rstest]
    fn change_detection_ignores_the_path() {
        let a = parse_definitions(Path::new("a.py"), "@then(\"done\")\n");
        let b = parse_definitions(Path::new("b.py"), "@then(\"done\")\n");
        let (a, b) = (a.first().expect("a"), b.first().expect("b"));
        assert!(a.same_definition(b));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn renaming_the_function_refreshes_its_label() {
        let path = Path::new("/w/steps/a.py");
        let reader = StaticReader::new([(path, "@given(\"one\")\ndef step_one(context):\n")]);
        let index = StepDefinitionIndex::new(
            Arc::new(reader.clone()),
            "/w",
            CorpusGlobs::new(vec!["**/steps/**/*.py".into()], Vec::new()),
            ScanSettings::default(),
        );
        index.index().scan_file(path).await;
        let before = index.version();

        reader.set(path, "@given(\"one\")\ndef step_first(context):\n");
        index.index().scan_file(path).await;

        assert!(index.version() > before);
        let names: Vec<Option<String>> = index
            .all()
            .iter()
            .map(|definition| definition.function_name.clone())
            .collect();
        assert_eq!(names, vec![Some("step_first".to_string())]);
    }

    #[tokio::test]
    async fn keyword_lookups_include_step_definitions() {
        let reader = StaticReader::new([("/w/steps/math_steps.py", MATH_STEPS)]);
        let index = StepDefinitionIndex::new(
            Arc::new(reader),
            "/w",
            CorpusGlobs::new(vec!["**/steps/**/*.py".into()], Vec::new()),
            ScanSettings::default(),
        );
        index.index().scan_file(Path::new("/w/steps/math_steps.py")).await;

        let patterns = |defs: Vec<Arc<StepDefinition>>| {
            defs.iter().map(|d| d.pattern.clone()).collect::<Vec<_>>()
        };
        assert_eq!(
            patterns(index.definitions_for(StepKeyword::When)),
            vec!["I add them", "the system is ready"]
        );
        assert_eq!(
            patterns(index.definitions_matching(Some(StepKeyword::Given), "the first number is 5")),
            vec!["the first number is {number:d}"]
        );
        assert!(
            index
                .definitions_matching(Some(StepKeyword::Given), "the first number is five")
                .is_empty()
        );
        assert_eq!(
            patterns(index.definitions_matching(None, "the result is 7")),
            vec!["the result is {result:d}"]
        );
        assert_eq!(
            patterns(index.definitions_matching(Some(StepKeyword::Then), "the system is ready")),
            vec!["the system is ready"]
        );
    }

    #[tokio::test]
    async fn buckets_follow_index_changes() {
        let reader = StaticReader::new([("/w/steps/a.py", "@given(\"one\")\n")]);
        let index = StepDefinitionIndex::new(
            Arc::new(reader.clone()),
            "/w",
            CorpusGlobs::new(vec!["**/steps/**/*.py".into()], Vec::new()),
            ScanSettings::default(),
        );
        let path = Path::new("/w/steps/a.py");
        index.index().scan_file(path).await;
        assert_eq!(index.definitions_for(StepKeyword::Given).len(), 1);

        reader.set(path, "@given(\"one\")\n@given(\"two\")\n");
        index.index().scan_file(path).await;
        assert_eq!(index.definitions_for(StepKeyword::Given).len(), 2);

        index.index().remove_file(path);
        assert!(index.definitions_for(StepKeyword::Given).is_empty());
    }
}
