//! Step keywords, step-line tokens, and step-line parsing.
//!
//! Three related types live here:
//!
//! - [`StepKeyword`]: the logical keyword of a step (`Given`/`When`/`Then`).
//! - [`DefinitionKeyword`]: the keyword a step definition is registered
//!   under, which adds the `Any` class used by `@step`.
//! - [`StepToken`]: the literal token that opens a feature-file step line,
//!   including the continuation tokens `And`, `But`, and `*`.

use std::fmt;
use std::str::FromStr;

/// Logical keyword of a feature step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StepKeyword {
    /// Setup preconditions for a scenario.
    Given,
    /// Perform an action when testing behaviour.
    When,
    /// Assert the expected outcome of a scenario.
    Then,
}

impl StepKeyword {
    /// Return the keyword in its canonical capitalised form.
    ///
    /// # Examples
    ///
    /// ```
    /// use behave_lsp_patterns::StepKeyword;
    ///
    /// assert_eq!(StepKeyword::Given.as_str(), "Given");
    /// ```
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Given => "Given",
            Self::When => "When",
            Self::Then => "Then",
        }
    }
}

impl fmt::Display for StepKeyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing a keyword from a string fails.
///
/// Contains the unrecognised keyword text for diagnostic purposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepKeywordParseError(pub String);

impl fmt::Display for StepKeywordParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid step keyword: {}", self.0)
    }
}

impl std::error::Error for StepKeywordParseError {}

impl FromStr for StepKeyword {
    type Err = StepKeywordParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match StepToken::from_str(value)?.direct() {
            Some(keyword) => Ok(keyword),
            None => Err(StepKeywordParseError(value.trim().to_string())),
        }
    }
}

/// Keyword class a step definition is registered under.
///
/// `Any` is produced by the `@step` decorator and matches feature steps of
/// every logical keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefinitionKeyword {
    /// Registered with `@given`.
    Given,
    /// Registered with `@when`.
    When,
    /// Registered with `@then`.
    Then,
    /// Registered with `@step`; matches every keyword.
    Any,
}

impl DefinitionKeyword {
    /// Return the decorator name for this keyword class.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Given => "given",
            Self::When => "when",
            Self::Then => "then",
            Self::Any => "step",
        }
    }

    /// Report whether a definition under this class applies to `keyword`.
    ///
    /// # Examples
    ///
    /// ```
    /// use behave_lsp_patterns::{DefinitionKeyword, StepKeyword};
    ///
    /// assert!(DefinitionKeyword::Any.accepts(StepKeyword::Then));
    /// assert!(!DefinitionKeyword::Given.accepts(StepKeyword::When));
    /// ```
    #[must_use]
    pub fn accepts(self, keyword: StepKeyword) -> bool {
        match self {
            Self::Any => true,
            specific => Self::from(keyword) == specific,
        }
    }
}

impl From<StepKeyword> for DefinitionKeyword {
    fn from(keyword: StepKeyword) -> Self {
        match keyword {
            StepKeyword::Given => Self::Given,
            StepKeyword::When => Self::When,
            StepKeyword::Then => Self::Then,
        }
    }
}

impl fmt::Display for DefinitionKeyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DefinitionKeyword {
    type Err = StepKeywordParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.eq_ignore_ascii_case("step") {
            return Ok(Self::Any);
        }
        trimmed
            .parse::<StepKeyword>()
            .map(Self::from)
            .map_err(|_| StepKeywordParseError(trimmed.to_string()))
    }
}

/// Literal token opening a step line in a feature file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepToken {
    /// `Given`
    Given,
    /// `When`
    When,
    /// `Then`
    Then,
    /// `And`, a continuation of the previous step.
    And,
    /// `But`, a contrasting continuation of the previous step.
    But,
    /// `*`, a keyword-neutral continuation bullet.
    Star,
}

const TOKENS: [(&str, StepToken); 6] = [
    ("given", StepToken::Given),
    ("when", StepToken::When),
    ("then", StepToken::Then),
    ("and", StepToken::And),
    ("but", StepToken::But),
    ("*", StepToken::Star),
];

impl StepToken {
    /// Return the token in its canonical form.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Given => "Given",
            Self::When => "When",
            Self::Then => "Then",
            Self::And => "And",
            Self::But => "But",
            Self::Star => "*",
        }
    }

    /// Return the logical keyword for direct tokens, `None` for continuations.
    #[must_use]
    pub const fn direct(self) -> Option<StepKeyword> {
        match self {
            Self::Given => Some(StepKeyword::Given),
            Self::When => Some(StepKeyword::When),
            Self::Then => Some(StepKeyword::Then),
            Self::And | Self::But | Self::Star => None,
        }
    }

    /// Resolve the token against a running keyword context.
    ///
    /// Direct tokens update `context` and return their own keyword.
    /// Continuation tokens return the current context unchanged, which is
    /// `None` when no direct step has been seen since the last reset.
    ///
    /// # Examples
    ///
    /// ```
    /// use behave_lsp_patterns::{StepKeyword, StepToken};
    ///
    /// let mut context = None;
    /// assert_eq!(StepToken::And.resolve(&mut context), None);
    /// assert_eq!(StepToken::When.resolve(&mut context), Some(StepKeyword::When));
    /// assert_eq!(StepToken::But.resolve(&mut context), Some(StepKeyword::When));
    /// ```
    pub fn resolve(self, context: &mut Option<StepKeyword>) -> Option<StepKeyword> {
        match self.direct() {
            Some(keyword) => {
                *context = Some(keyword);
                Some(keyword)
            }
            None => *context,
        }
    }
}

impl fmt::Display for StepToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepToken {
    type Err = StepKeywordParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        TOKENS
            .iter()
            .find(|(word, _)| trimmed.eq_ignore_ascii_case(word))
            .map(|(_, token)| *token)
            .ok_or_else(|| StepKeywordParseError(trimmed.to_string()))
    }
}

/// A feature-file line split into its step token and step text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepLine<'a> {
    /// The token opening the line.
    pub token: StepToken,
    /// The token exactly as written (`given`, `And`, `*`, ...).
    pub keyword: &'a str,
    /// The step text with the keyword and surrounding whitespace removed.
    pub text: &'a str,
    /// Byte offset of `text` within the line.
    pub text_offset: usize,
}

/// Split a feature-file line into token and text.
///
/// A step line starts (after indentation) with one of `Given`, `When`,
/// `Then`, `And`, `But` or `*`, compared case-insensitively, followed by at
/// least one whitespace character. Any other line yields `None`.
///
/// # Examples
///
/// ```
/// use behave_lsp_patterns::{StepToken, parse_step_line};
///
/// let line = parse_step_line("    And the price is 50.00").expect("step line");
/// assert_eq!(line.token, StepToken::And);
/// assert_eq!(line.text, "the price is 50.00");
/// assert_eq!(line.text_offset, 8);
/// assert!(parse_step_line("  Scenario: pricing").is_none());
/// ```
#[must_use]
pub fn parse_step_line(line: &str) -> Option<StepLine<'_>> {
    let trimmed = line.trim_start();
    TOKENS.iter().find_map(|(word, token)| {
        let head = trimmed.get(..word.len())?;
        if !head.eq_ignore_ascii_case(word) {
            return None;
        }
        let rest = trimmed.get(word.len()..)?;
        if !rest.starts_with(char::is_whitespace) {
            return None;
        }
        let text = rest.trim_start();
        Some(StepLine {
            token: *token,
            keyword: head,
            text: text.trim_end(),
            text_offset: line.len() - text.len(),
        })
    })
}
