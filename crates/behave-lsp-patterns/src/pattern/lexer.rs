//! Pattern lexer converting pattern strings into semantic tokens.

use crate::errors::PatternError;

use super::placeholder::{PlaceholderSpec, parse_placeholder};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token {
    Literal(String),
    Placeholder {
        start: usize,
        name: String,
        hint: Option<String>,
    },
    OpenBrace {
        index: usize,
    },
    CloseBrace {
        index: usize,
    },
}

/// A `{` opens a placeholder when followed by a name, a type separator, or
/// directly by `}` (an anonymous field such as `{}` or `{:d}`).
fn opens_placeholder(next: u8) -> bool {
    next.is_ascii_alphabetic() || next == b'_' || next == b':' || next == b'}'
}

pub(crate) fn lex_pattern(pattern: &str) -> Result<Vec<Token>, PatternError> {
    let bytes = pattern.as_bytes();
    let mut tokens = Vec::new();
    let mut literal = String::new();
    let mut pos = 0;

    let flush_literal = |literal: &mut String, tokens: &mut Vec<Token>| {
        if !literal.is_empty() {
            tokens.push(Token::Literal(std::mem::take(literal)));
        }
    };

    while let Some(&b) = bytes.get(pos) {
        match b {
            b'\\' => {
                let escaped = pattern.get(pos + 1..).and_then(|tail| tail.chars().next());
                if let Some(next) = escaped {
                    literal.push(next);
                    pos += 1 + next.len_utf8();
                } else {
                    literal.push('\\');
                    pos += 1;
                }
            }
            b'{' => {
                if bytes.get(pos + 1) == Some(&b'{') {
                    literal.push('{');
                    pos += 2;
                    continue;
                }
                if bytes.get(pos + 1).copied().is_some_and(opens_placeholder) {
                    flush_literal(&mut literal, &mut tokens);
                    let (
                        next_pos,
                        PlaceholderSpec {
                            start, name, hint, ..
                        },
                    ) = parse_placeholder(bytes, pos)?;
                    tokens.push(Token::Placeholder { start, name, hint });
                    pos = next_pos;
                    continue;
                }
                flush_literal(&mut literal, &mut tokens);
                tokens.push(Token::OpenBrace { index: pos });
                pos += 1;
            }
            b'}' => {
                if bytes.get(pos + 1) == Some(&b'}') {
                    literal.push('}');
                    pos += 2;
                    continue;
                }
                flush_literal(&mut literal, &mut tokens);
                tokens.push(Token::CloseBrace { index: pos });
                pos += 1;
            }
            _ => {
                let ch = pattern
                    .get(pos..)
                    .and_then(|tail| tail.chars().next())
                    .unwrap_or(char::REPLACEMENT_CHARACTER);
                literal.push(ch);
                pos += ch.len_utf8();
            }
        }
    }

    flush_literal(&mut literal, &mut tokens);
    Ok(tokens)
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "tests exercise lexing fallibility")]
mod tests {
    use super::*;

    #[test]
    fn tokenises_literals_and_placeholders() {
        let tokens = lex_pattern("the first number is {number:d}").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Literal("the first number is ".into()),
                Token::Placeholder {
                    start: 20,
                    name: "number".into(),
                    hint: Some("d".into()),
                },
            ]
        );
    }

    #[test]
    fn recognises_doubled_braces_as_literals() {
        let tokens = lex_pattern("{{outer}} {inner}").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Literal("{outer} ".into()),
                Token::Placeholder {
                    start: 10,
                    name: "inner".into(),
                    hint: None,
                },
            ]
        );
    }

    #[test]
    fn recognises_anonymous_placeholders() {
        let tokens = lex_pattern("{} and {:d}").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Placeholder {
                    start: 0,
                    name: String::new(),
                    hint: None,
                },
                Token::Literal(" and ".into()),
                Token::Placeholder {
                    start: 7,
                    name: String::new(),
                    hint: Some("d".into()),
                },
            ]
        );
    }

    #[test]
    fn backslash_makes_the_next_character_literal() {
        let tokens = lex_pattern(r#"the message is \"{message}\""#).unwrap();
        assert_eq!(
            tokens.first(),
            Some(&Token::Literal("the message is \"".into()))
        );
        assert_eq!(tokens.last(), Some(&Token::Literal("\"".into())));
    }

    #[test]
    fn keeps_multibyte_literals_intact() {
        let tokens = lex_pattern("café costs {n:d} €").unwrap();
        assert_eq!(tokens.first(), Some(&Token::Literal("café costs ".into())));
        assert_eq!(tokens.last(), Some(&Token::Literal(" €".into())));
    }

    #[test]
    fn records_stray_braces() {
        let tokens = lex_pattern("{ literal }").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::OpenBrace { index: 0 },
                Token::Literal(" literal ".into()),
                Token::CloseBrace { index: 10 },
            ]
        );
    }
}
