//! Recognition of step decorator lines in Python step modules.
//!
//! Four shapes are understood, tried in this order:
//!
//! 1. `@given("pattern")`
//! 2. `@given('pattern')`
//! 3. `@given(parsers.parse("pattern"))` (any dotted wrapper call)
//! 4. `@given(parsers.parse('pattern'))`
//!
//! Each string literal may carry a short prefix such as `u` or `r`. The
//! decorator name is one of `given`, `when`, `then` or `step`, compared
//! case-insensitively. Escape sequences inside the literal are passed through
//! untouched; only the surrounding quotes are removed. Decorators whose
//! arguments span several physical lines are not recognised.

use std::sync::LazyLock;

use regex::Regex;

use crate::keyword::DefinitionKeyword;

/// A step decorator recognised on a single source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepAnnotation {
    /// Keyword class taken from the decorator name.
    pub keyword: DefinitionKeyword,
    /// The pattern text between the quotes, escapes left as written.
    pub pattern: String,
    /// Byte offset of the `@` within the line.
    pub column: usize,
}

const DECORATOR: &str = r"^\s*@((?i:given|when|then|step))\s*\(\s*";
const STRING_PREFIX: &str = r"[A-Za-z]{0,2}";
const WRAPPER: &str = r"[A-Za-z_][\w.]*\s*\(\s*";
const DOUBLE_QUOTED: &str = r#""((?:[^"\\]|\\.)*)""#;
const SINGLE_QUOTED: &str = r"'((?:[^'\\]|\\.)*)'";

fn build_shape(wrapped: bool, literal: &str) -> Regex {
    let wrapper = if wrapped { WRAPPER } else { "" };
    let source = format!("{DECORATOR}{wrapper}{STRING_PREFIX}{literal}");
    Regex::new(&source).unwrap_or_else(|_| unreachable!("decorator shapes are valid regexes"))
}

static SHAPES: LazyLock<[Regex; 4]> = LazyLock::new(|| {
    [
        build_shape(false, DOUBLE_QUOTED),
        build_shape(false, SINGLE_QUOTED),
        build_shape(true, DOUBLE_QUOTED),
        build_shape(true, SINGLE_QUOTED),
    ]
});

/// Recognise a step decorator on a single line.
///
/// Returns `None` for lines that are not step decorators. The first matching
/// shape wins; a line never yields more than one annotation.
///
/// # Examples
///
/// ```
/// use behave_lsp_patterns::{DefinitionKeyword, compile_annotation_line};
///
/// let found = compile_annotation_line("@given(\"the first number is {number:d}\")")
///     .expect("decorator line");
/// assert_eq!(found.keyword, DefinitionKeyword::Given);
/// assert_eq!(found.pattern, "the first number is {number:d}");
/// assert_eq!(found.column, 0);
///
/// let any = compile_annotation_line("    @step(u'the system is ready')").expect("decorator line");
/// assert_eq!(any.keyword, DefinitionKeyword::Any);
/// assert_eq!(any.column, 4);
///
/// assert!(compile_annotation_line("@fixture").is_none());
/// ```
#[must_use]
pub fn compile_annotation_line(line: &str) -> Option<StepAnnotation> {
    SHAPES.iter().find_map(|shape| {
        let captures = shape.captures(line)?;
        let keyword = captures.get(1)?.as_str().parse().ok()?;
        let pattern = captures.get(2)?.as_str().to_string();
        Some(StepAnnotation {
            keyword,
            pattern,
            column: line.len() - line.trim_start().len(),
        })
    })
}
