//! Effective-keyword resolution for continuation steps.
//!
//! Every caller that needs to know which logical keyword an `And`, `But` or
//! `*` line inherits goes through [`resolve_effective_keyword`]: the step
//! usage index, definition lookup, diagnostics, and completion.

use crate::keyword::{StepKeyword, parse_step_line};

/// Random access to the lines of a document.
pub trait LineAccess {
    /// Number of lines in the document.
    fn line_count(&self) -> usize;

    /// Return the line at `index`, without its terminator.
    fn line_at(&self, index: usize) -> Option<&str>;
}

impl<S: AsRef<str>> LineAccess for [S] {
    fn line_count(&self) -> usize {
        self.len()
    }

    fn line_at(&self, index: usize) -> Option<&str> {
        self.get(index).map(AsRef::as_ref)
    }
}

impl<S: AsRef<str>> LineAccess for Vec<S> {
    fn line_count(&self) -> usize {
        self.len()
    }

    fn line_at(&self, index: usize) -> Option<&str> {
        self.get(index).map(AsRef::as_ref)
    }
}

/// Report whether a line is blank or a Gherkin `#` comment.
#[must_use]
pub fn is_comment_or_blank(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.is_empty() || trimmed.starts_with('#')
}

/// Determine the logical keyword of the step on `target`.
///
/// Direct `Given`/`When`/`Then` lines resolve to themselves. Continuation
/// lines scan backwards, skipping blank lines, comments and other
/// continuation lines, until a direct step is found. Any other line (a
/// scenario header, a table row, free text) ends the scan with `None`, as do
/// out-of-range targets and lines that are not steps at all.
///
/// # Examples
///
/// ```
/// use behave_lsp_patterns::{StepKeyword, resolve_effective_keyword};
///
/// let lines = [
///     "  Scenario: pricing",
///     "    Given the price is 100.00",
///     "    # discount follows",
///     "    And the price is 50.00",
/// ];
/// assert_eq!(resolve_effective_keyword(&lines[..], 3), Some(StepKeyword::Given));
/// assert_eq!(resolve_effective_keyword(&lines[..], 0), None);
/// ```
pub fn resolve_effective_keyword<L>(lines: &L, target: usize) -> Option<StepKeyword>
where
    L: LineAccess + ?Sized,
{
    let step = parse_step_line(lines.line_at(target)?)?;
    if let Some(keyword) = step.token.direct() {
        return Some(keyword);
    }

    for index in (0..target).rev() {
        let line = lines.line_at(index)?;
        if is_comment_or_blank(line) {
            continue;
        }
        let step = parse_step_line(line)?;
        if let Some(keyword) = step.token.direct() {
            return Some(keyword);
        }
    }
    None
}
