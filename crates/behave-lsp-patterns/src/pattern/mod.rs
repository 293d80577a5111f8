//! Step-pattern lexing and compilation helpers.

mod compiler;
mod lexer;
mod placeholder;
#[cfg(test)]
pub(crate) mod test_support;

use crate::errors::PatternError;
use regex::Regex;

pub use compiler::build_regex_from_pattern;
pub(crate) use lexer::{Token, lex_pattern};

/// Compile a step pattern into an anchored, case-insensitive matcher.
///
/// Compilation is deterministic: the same pattern always yields a matcher
/// with identical accept/reject behaviour.
///
/// # Errors
/// Returns [`PatternError`] when placeholder parsing fails or the generated
/// expression is rejected by the regex engine.
///
/// # Examples
/// ```
/// use behave_lsp_patterns::compile_pattern;
/// let matcher = compile_pattern("the first number is {number:d}").expect("valid pattern");
/// assert!(matcher.is_match("The first number is -5"));
/// assert!(matcher.is_match("the first number is <a>"));
/// assert!(!matcher.is_match("the first number is 4.2"));
/// ```
pub fn compile_pattern(pat: &str) -> Result<Regex, PatternError> {
    let source = build_regex_from_pattern(pat)?;
    Regex::new(&source).map_err(PatternError::from)
}
