//! Step-pattern compilation and keyword resolution for behave step
//! definitions.
//!
//! The crate holds the pure text logic shared by the step indexes: turning a
//! human-authored step pattern such as `the price is {amount:f}` into an
//! anchored, case-insensitive matcher, recognising `@given(...)`-style
//! decorator lines, and working out which logical keyword an `And`/`But`/`*`
//! continuation line inherits.
//!
//! Nothing here performs I/O, so every function can be exercised directly in
//! unit tests.

mod annotation;
mod errors;
mod hint;
mod keyword;
mod pattern;
mod resolver;
mod snippet;

pub use annotation::{StepAnnotation, compile_annotation_line};
pub use errors::{PatternError, PlaceholderErrorInfo};
pub use hint::{OUTLINE_PLACEHOLDER_PATTERN, get_type_pattern};
pub use keyword::{
    DefinitionKeyword, StepKeyword, StepKeywordParseError, StepLine, StepToken, parse_step_line,
};
pub use pattern::{build_regex_from_pattern, compile_pattern};
pub use resolver::{LineAccess, is_comment_or_blank, resolve_effective_keyword};
pub use snippet::to_snippet;
