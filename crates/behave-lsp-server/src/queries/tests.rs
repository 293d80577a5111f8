//! Unit tests for the query layer.

#![expect(clippy::expect_used, reason = "tests fail fast on fixture setup")]

use std::path::Path;
use std::sync::Arc;

use behave_lsp_patterns::{DefinitionKeyword, StepKeyword};
use rstest::rstest;

use super::*;
use crate::indexing::{ScanSettings, StepDefinitionIndex, StepUsageIndex};
use crate::test_support::StaticReader;
use crate::workspace::CorpusGlobs;

const MATH_STEPS: &str = include_str!("../../tests/fixtures/features/steps/math_steps.py");
const PRODUCT_STEPS: &str = include_str!("../../tests/fixtures/features/steps/product_steps.py");
const COMMON_STEPS: &str = include_str!("../../tests/fixtures/features/steps/common_steps.py");

const CALCULATOR: &str = "\
Feature: Calculator

  Scenario: pricing
    Given the price is 100.00
    And the price is 50.00
    When I apply a discount of 10 percent
    Then the final price is 45.00

  Scenario Outline: adding
    Given the first number is <a>
    When I add <b>
    Then the result is <sum>

    Examples:
      | a | b | sum |
      | 1 | 2 | 3   |

  Scenario: login
    Given a logged in user
    And the system is ready
";

async fn queries_over(steps: &[(&str, &str)], features: &[(&str, &str)]) -> StepQueries {
    let reader = StaticReader::new(steps.iter().chain(features).copied());
    let reader: Arc<dyn crate::workspace::SourceReader> = Arc::new(reader);
    let definitions = Arc::new(StepDefinitionIndex::new(
        Arc::clone(&reader),
        "/w",
        CorpusGlobs::new(vec!["**/steps/**/*.py".into()], Vec::new()),
        ScanSettings::default(),
    ));
    let usages = Arc::new(StepUsageIndex::new(
        reader,
        "/w",
        CorpusGlobs::new(vec!["**/*.feature".into()], Vec::new()),
        ScanSettings::default(),
    ));
    for (path, _) in steps {
        definitions.index().scan_file(Path::new(path)).await;
    }
    for (path, _) in features {
        usages.index().scan_file(Path::new(path)).await;
    }
    StepQueries::new(definitions, usages)
}

async fn fixture_queries() -> StepQueries {
    queries_over(
        &[
            ("/w/features/steps/math_steps.py", MATH_STEPS),
            ("/w/features/steps/product_steps.py", PRODUCT_STEPS),
            ("/w/features/steps/common_steps.py", COMMON_STEPS),
        ],
        &[("/w/features/calculator.feature", CALCULATOR)],
    )
    .await
}

fn lines(text: &str) -> Vec<&str> {
    text.lines().collect()
}

#[rstest]
#[case("    Given the first number is 5", 1)]
#[case("    Given the first number is -5", 1)]
#[case("    Given the first number is <a>", 1)]
#[case("    Given the first number is five", 0)]
#[case("    Given the first number is 5.5", 0)]
#[case("    When the first number is 5", 0)]
#[tokio::test]
async fn definition_lookup_respects_types_and_keywords(
    #[case] step: &str,
    #[case] expected: usize,
) {
    let queries = fixture_queries().await;
    assert_eq!(queries.find_definition(&[step][..], 0).len(), expected);
}

#[rstest]
#[tokio::test]
async fn continuation_inherits_the_previous_keyword() {
    let queries = fixture_queries().await;
    let document = lines(CALCULATOR);

    let found = queries.find_definition(&document, 4);
    assert_eq!(
        found,
        vec![SourceLocation {
            path: "/w/features/steps/math_steps.py".into(),
            line: 28,
            column: 0,
        }]
    );
}

#[rstest]
#[tokio::test]
async fn step_definitions_answer_every_keyword() {
    let queries = fixture_queries().await;
    let document = lines(CALCULATOR);

    let login = queries.find_definition(&document, 18);
    assert_eq!(login.len(), 2);
    let ready = queries.find_definition(&document, 19);
    assert_eq!(ready.len(), 1);
    assert!(queries.find_definition(&document, 0).is_empty());
}

#[rstest]
#[tokio::test]
async fn usages_are_found_from_decorator_or_function() {
    let queries = fixture_queries().await;
    let source = lines(MATH_STEPS);

    let from_decorator = queries.find_usages(&source, 28).expect("decorator block");
    let from_function = queries.find_usages(&source, 29).expect("decorator block");
    assert_eq!(from_decorator, from_function);
    assert_eq!(
        from_decorator.iter().map(|usage| usage.line).collect::<Vec<_>>(),
        vec![3, 4]
    );
    let first = from_decorator.first().expect("usage");
    assert_eq!((first.column, first.length), (10, 19));

    assert_eq!(
        queries.find_usages(&source, 0),
        Err(QueryError::NoStepDecorator { line: 0 })
    );
    assert_eq!(
        queries.find_usages(&source, 30),
        Err(QueryError::NoStepDecorator { line: 30 })
    );
}

#[rstest]
#[tokio::test]
async fn stacked_decorators_merge_their_usages() {
    let steps = "\
@given('the message is \"{message}\"')
@given(\"the message is '{message}'\")
# both quoting styles
def step_message(context, message):
    pass
";
    let feature = "\
Feature: quoting
  Scenario: both
    Given the message is \"hello\"
    Given the message is 'hello'
    When the message is 'ignored'
";
    let queries = queries_over(
        &[("/w/steps/string_steps.py", steps)],
        &[("/w/quoting.feature", feature)],
    )
    .await;

    let usages = queries.find_usages(&lines(steps), 3).expect("decorator block");
    assert_eq!(usages.iter().map(|usage| usage.line).collect::<Vec<_>>(), vec![2, 3]);
}

#[rstest]
#[tokio::test]
async fn diagnostics_flag_only_undefined_steps() {
    let queries = fixture_queries().await;
    assert!(queries.compute_diagnostics(CALCULATOR).is_empty());

    let text = "\
Feature: broken
  Scenario: typo
    Given the first number is abc
    And an unknown step
    \"\"\"
    Given text inside a doc string
    \"\"\"
";
    let diagnostics = queries.compute_diagnostics(text);
    assert_eq!(
        diagnostics,
        vec![
            StepDiagnostic {
                line: 2,
                column_start: 10,
                column_end: 33,
                message: "Undefined step: Given the first number is abc".into(),
            },
            StepDiagnostic {
                line: 3,
                column_start: 8,
                column_end: 23,
                message: "Undefined step: And an unknown step".into(),
            },
        ]
    );
}

#[rstest]
#[tokio::test]
async fn diagnostics_abort_when_the_document_moves_on() {
    let queries = fixture_queries().await;
    let text = "    Given the first number is abc\n".repeat(450);

    let mut polls = 0;
    let aborted = queries.compute_diagnostics_checked(&text, || {
        polls += 1;
        polls < 2
    });
    assert_eq!(aborted, None);
    assert_eq!(polls, 2);

    let complete = queries
        .compute_diagnostics_checked(&text, || true)
        .expect("still current");
    assert_eq!(complete.len(), 450);
}

#[rstest]
#[tokio::test]
async fn completion_filters_by_keyword_and_text() {
    let queries = fixture_queries().await;

    let candidates = queries.completion_candidates(Some(StepKeyword::Given), "pri");
    assert_eq!(
        candidates
            .iter()
            .map(|candidate| (candidate.pattern.as_str(), candidate.snippet.as_str()))
            .collect::<Vec<_>>(),
        vec![("the price is {price:f}", "the price is ${1:price}")]
    );
    let first = candidates.first().expect("candidate");
    assert_eq!(first.function_name.as_deref(), Some("step_given_price"));
    assert_eq!(first.keyword, DefinitionKeyword::Given);
}

#[rstest]
#[tokio::test]
async fn completion_prefers_prefix_matches_and_dedupes_patterns() {
    let queries = fixture_queries().await;

    let patterns: Vec<String> = queries
        .completion_candidates(Some(StepKeyword::Given), "a")
        .into_iter()
        .map(|candidate| candidate.pattern)
        .collect();
    assert_eq!(
        patterns.first().map(String::as_str),
        Some("a logged in user")
    );
    assert_eq!(
        patterns.iter().filter(|pattern| *pattern == "a logged in user").count(),
        1
    );
    let prefixed = patterns
        .iter()
        .take_while(|pattern| pattern.starts_with('a'))
        .count();
    assert!(patterns.iter().skip(prefixed).all(|pattern| !pattern.starts_with('a')));

    let everything = queries.completion_candidates(Some(StepKeyword::Then), "");
    let sorted: Vec<String> = everything.iter().map(|c| c.pattern.to_lowercase()).collect();
    let mut expected = sorted.clone();
    expected.sort();
    assert_eq!(sorted, expected);
}

#[rstest]
#[tokio::test]
async fn completion_resolves_continuations_from_the_document() {
    let queries = fixture_queries().await;
    let document = vec!["  Scenario: typing", "    When I add 1", "    And "];

    let candidates = queries.completion_candidates_at(&document, 2, "And", "");
    assert!(candidates.iter().all(|candidate| {
        matches!(candidate.keyword, DefinitionKeyword::When | DefinitionKeyword::Any)
    }));
    assert!(candidates.iter().any(|candidate| candidate.pattern == "I add {number:d}"));

    let direct = queries.completion_candidates_at(&document, 2, "then", "area");
    assert_eq!(
        direct.iter().map(|c| c.pattern.as_str()).collect::<Vec<_>>(),
        vec!["the area is {expected:d}"]
    );

    assert!(queries.completion_candidates_at(&document, 0, "Scenario:", "typing").is_empty());
}
