//! Placeholder type-hint helpers used during matcher compilation.
//!
//! Type tags follow the `parse` library conventions used by behave step
//! definitions (`{count:d}`, `{price:f}`, `{name:w}` and so on).

/// Expression accepted in every placeholder slot in addition to its typed
/// value: a Scenario Outline variable such as `<amount>`.
pub const OUTLINE_PLACEHOLDER_PATTERN: &str = r"<[^>]+>";

/// Translate a placeholder type hint into a regular-expression fragment.
///
/// Unknown tags and untyped placeholders fall back to a lazy match of one or
/// more characters.
///
/// # Examples
/// ```
/// use behave_lsp_patterns::get_type_pattern;
/// assert_eq!(get_type_pattern(Some("d")), r"-?\d+");
/// assert_eq!(get_type_pattern(Some("S")), r"\S+");
/// assert_eq!(get_type_pattern(None), ".+?");
/// ```
#[must_use]
pub fn get_type_pattern(type_hint: Option<&str>) -> &'static str {
    match type_hint {
        Some("d") => r"-?\d+",
        Some("f") => r"-?\d+\.?\d*",
        Some("w") => r"\w+",
        Some("W") => r"\W+",
        Some("s") => r"\s+",
        Some("S") => r"\S+",
        _ => r".+?",
    }
}
