//! Convert lexed tokens into anchored, case-insensitive regular-expression
//! sources.

use crate::errors::{PatternError, placeholder_error};
use crate::hint::{OUTLINE_PLACEHOLDER_PATTERN, get_type_pattern};

use super::lexer::{Token, lex_pattern};

/// Build an anchored regular expression source from a step pattern.
///
/// Literal text is escaped. Each placeholder becomes a capture group that
/// accepts either a value of its declared type or an outline variable such
/// as `<amount>`. The result is case-insensitive and matches whole strings
/// only.
///
/// # Errors
/// Returns [`PatternError`] when the pattern contains malformed placeholders
/// or unbalanced braces.
///
/// # Examples
/// ```
/// use behave_lsp_patterns::build_regex_from_pattern;
/// let source = build_regex_from_pattern("I add {number:d}").expect("valid pattern");
/// assert_eq!(source, r"(?i)^I add ((?:-?\d+)|<[^>]+>)$");
/// ```
pub fn build_regex_from_pattern(pat: &str) -> Result<String, PatternError> {
    let tokens = lex_pattern(pat)?;
    let mut regex = String::with_capacity(pat.len().saturating_mul(2) + 8);
    regex.push_str("(?i)^");
    let mut stray_depth = 0usize;

    for token in tokens {
        match token {
            Token::Literal(text) => regex.push_str(&regex::escape(&text)),
            Token::Placeholder { hint, .. } => {
                regex.push_str("((?:");
                regex.push_str(get_type_pattern(hint.as_deref()));
                regex.push_str(")|");
                regex.push_str(OUTLINE_PLACEHOLDER_PATTERN);
                regex.push(')');
            }
            Token::OpenBrace { .. } => {
                stray_depth = stray_depth.saturating_add(1);
                regex.push_str(&regex::escape("{"));
            }
            Token::CloseBrace { index } => {
                if stray_depth == 0 {
                    return Err(placeholder_error(
                        "unmatched closing brace '}' in step pattern",
                        index,
                        None,
                    ));
                }
                stray_depth -= 1;
                regex.push_str(&regex::escape("}"));
            }
        }
    }

    if stray_depth != 0 {
        return Err(placeholder_error(
            "unbalanced braces in step pattern",
            pat.len(),
            None,
        ));
    }

    regex.push('$');
    Ok(regex)
}
