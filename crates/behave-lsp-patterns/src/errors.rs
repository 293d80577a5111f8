//! Error types raised while compiling step patterns.

use std::fmt;
use thiserror::Error;

/// Additional context for placeholder-related parsing errors.
///
/// # Examples
/// ```
/// use behave_lsp_patterns::PlaceholderErrorInfo;
/// let info = PlaceholderErrorInfo::new("invalid placeholder", 3, Some("amount".into()));
/// assert_eq!(info.placeholder.as_deref(), Some("amount"));
/// assert_eq!(info.position, 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderErrorInfo {
    /// Human-readable description of the failure.
    pub message: &'static str,
    /// Zero-based byte offset of the offending brace in the pattern.
    pub position: usize,
    /// Placeholder name, when one had been read before the failure.
    pub placeholder: Option<String>,
}

impl PlaceholderErrorInfo {
    /// Create a new error description for a placeholder failure.
    #[must_use]
    pub fn new(message: &'static str, position: usize, placeholder: Option<String>) -> Self {
        Self {
            message,
            position,
            placeholder,
        }
    }
}

impl fmt::Display for PlaceholderErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.placeholder {
            Some(name) if !name.is_empty() => write!(
                f,
                "{} for placeholder `{}` at byte {} (zero-based)",
                self.message, name, self.position
            ),
            _ => write!(f, "{} at byte {} (zero-based)", self.message, self.position),
        }
    }
}

/// Errors surfaced while converting step patterns into matchers.
///
/// Callers that index many definitions treat this as a per-definition
/// failure: the offending definition is skipped and logged while the rest of
/// the file stays indexed.
#[derive(Debug, Error)]
pub enum PatternError {
    /// The pattern contains a malformed `{placeholder}`.
    #[error("{0}")]
    Placeholder(PlaceholderErrorInfo),
    /// The generated expression was rejected by the regex engine.
    #[error(transparent)]
    Regex(#[from] regex::Error),
}

pub(crate) fn placeholder_error(
    message: &'static str,
    position: usize,
    placeholder: Option<String>,
) -> PatternError {
    PatternError::Placeholder(PlaceholderErrorInfo::new(message, position, placeholder))
}
