//! Render step patterns as editor snippets.

use crate::pattern::{Token, lex_pattern};

fn push_escaped(out: &mut String, text: &str) {
    for ch in text.chars() {
        if matches!(ch, '$' | '}' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
}

/// Convert a step pattern into snippet syntax.
///
/// Each placeholder becomes a numbered tab stop whose default text is the
/// placeholder name; stops are numbered from 1 in pattern order. Literal text
/// is escaped for snippet syntax. Patterns that cannot be lexed are returned
/// as escaped literal text.
///
/// # Examples
///
/// ```
/// use behave_lsp_patterns::to_snippet;
///
/// assert_eq!(to_snippet("the price is {n:f}"), "the price is ${1:n}");
/// assert_eq!(
///     to_snippet("a rectangle with width {width:d} and height {height:d}"),
///     "a rectangle with width ${1:width} and height ${2:height}",
/// );
/// ```
#[must_use]
pub fn to_snippet(pattern: &str) -> String {
    let Ok(tokens) = lex_pattern(pattern) else {
        let mut out = String::with_capacity(pattern.len());
        push_escaped(&mut out, pattern);
        return out;
    };

    let mut out = String::with_capacity(pattern.len() + 8);
    let mut stop = 0usize;
    for token in tokens {
        match token {
            Token::Literal(text) => push_escaped(&mut out, &text),
            Token::Placeholder { name, .. } => {
                stop += 1;
                if name.is_empty() {
                    out.push_str(&format!("${{{stop}}}"));
                } else {
                    out.push_str(&format!("${{{stop}:{name}}}"));
                }
            }
            Token::OpenBrace { .. } => out.push('{'),
            Token::CloseBrace { .. } => out.push_str("\\}"),
        }
    }
    out
}
