//! Placeholder parsing for `{name}`, `{name:type}` and anonymous `{}` fields.

use crate::errors::{PatternError, placeholder_error};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PlaceholderSpec {
    pub name: String,
    pub hint: Option<String>,
    pub start: usize,
    pub end: usize,
}

fn find_closing_brace(bytes: &[u8], from: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (offset, &b) in bytes.get(from..)?.iter().enumerate() {
        match b {
            b'{' => depth = depth.saturating_add(1),
            b'}' if depth == 0 => return Some(from + offset),
            b'}' => depth -= 1,
            _ => {}
        }
    }
    None
}

/// Read the field name starting at `from`, returning it with the index of
/// the first byte after it.
fn read_name(bytes: &[u8], from: usize) -> (String, usize) {
    let len = bytes
        .get(from..)
        .unwrap_or_default()
        .iter()
        .take_while(|b| b.is_ascii_alphanumeric() || **b == b'_')
        .count();
    let name = bytes
        .get(from..from + len)
        .map(|raw| String::from_utf8_lossy(raw).into_owned())
        .unwrap_or_default();
    (name, from + len)
}

fn skip_whitespace(bytes: &[u8], from: usize) -> usize {
    from + bytes
        .get(from..)
        .unwrap_or_default()
        .iter()
        .take_while(|b| b.is_ascii_whitespace())
        .count()
}

/// Read a `:type` tag; `from` points just past the colon. Returns the tag and
/// the index of the closing brace candidate.
fn read_type_tag(
    bytes: &[u8],
    from: usize,
    start: usize,
    name: &str,
) -> Result<(String, usize), PatternError> {
    let invalid = || {
        placeholder_error(
            "invalid placeholder in step pattern",
            start,
            Some(name.to_string()),
        )
    };
    let len = bytes
        .get(from..)
        .unwrap_or_default()
        .iter()
        .take_while(|b| **b != b'}')
        .count();
    let raw = bytes
        .get(from..from + len)
        .and_then(|raw| std::str::from_utf8(raw).ok())
        .ok_or_else(invalid)?;
    if raw.is_empty() || raw.chars().any(|c| c.is_ascii_whitespace() || c == '{') {
        return Err(invalid());
    }
    Ok((raw.to_string(), from + len))
}

pub(crate) fn parse_placeholder(
    bytes: &[u8],
    start: usize,
) -> Result<(usize, PlaceholderSpec), PatternError> {
    let (name, mut index) = read_name(bytes, start + 1);

    if bytes.get(index).is_some_and(u8::is_ascii_whitespace) {
        let ws_end = skip_whitespace(bytes, index);
        if matches!(bytes.get(ws_end), Some(b':' | b'}')) {
            return Err(placeholder_error(
                "invalid placeholder in step pattern",
                start,
                Some(name),
            ));
        }
        index = ws_end;
    }

    let mut hint = None;
    if bytes.get(index) == Some(&b':') {
        let (tag, end) = read_type_tag(bytes, index + 1, start, &name)?;
        hint = Some(tag);
        index = end;
    } else {
        index = find_closing_brace(bytes, index).ok_or_else(|| {
            placeholder_error(
                "missing closing '}' for placeholder",
                start,
                Some(name.clone()),
            )
        })?;
    }

    if bytes.get(index) != Some(&b'}') {
        return Err(placeholder_error(
            "missing closing '}' for placeholder",
            start,
            Some(name),
        ));
    }
    index += 1;

    Ok((
        index,
        PlaceholderSpec {
            name,
            hint,
            start,
            end: index,
        },
    ))
}
