//! Behavioural tests for navigation between feature steps and Python step
//! definitions.
//!
//! These tests index the fixture project and resolve definitions and usages
//! through the query layer, the same way the LSP handlers do.

#![expect(
    clippy::expect_used,
    reason = "behavioural tests use explicit panics for clarity"
)]

mod support;

use std::path::PathBuf;

use behave_lsp_server::queries::{SourceLocation, UsageLocation};
use behave_lsp_server::test_support::TestWorkspace;
use rstest::rstest;

use support::{project, read_lines};

fn definitions_at(workspace: &TestWorkspace, feature: &str, line: usize) -> Vec<(PathBuf, u32)> {
    let lines = read_lines(workspace, feature);
    workspace
        .queries()
        .find_definition(&lines, line)
        .into_iter()
        .map(|SourceLocation { path, line, .. }| (path, line))
        .collect()
}

#[rstest]
#[case::typed_integer("features/calculator.feature", 6, "math_steps.py", 7)]
#[case::background_generic_step("features/calculator.feature", 3, "common_steps.py", 13)]
#[case::continuation_inherits_given("features/calculator.feature", 12, "math_steps.py", 28)]
#[case::float_accepts_integer("features/calculator.feature", 13, "math_steps.py", 33)]
#[case::outline_placeholder("features/calculator.feature", 17, "math_steps.py", 7)]
#[case::double_quotes("features/strings.feature", 3, "string_steps.py", 26)]
#[case::single_quotes("features/strings.feature", 7, "string_steps.py", 40)]
#[case::stacked_decorator("features/strings.feature", 19, "string_steps.py", 62)]
#[case::continuation_under_rule("features/users.feature", 8, "common_steps.py", 32)]
#[case::asterisk("features/users.feature", 9, "common_steps.py", 7)]
#[tokio::test]
async fn steps_resolve_to_a_single_definition(
    #[future] project: TestWorkspace,
    #[case] feature: &str,
    #[case] line: usize,
    #[case] module: &str,
    #[case] decorator_line: u32,
) {
    let workspace = project.await;
    let expected = workspace.path(&format!("features/steps/{module}"));

    assert_eq!(
        definitions_at(&workspace, feature, line),
        vec![(expected, decorator_line)]
    );
}

#[rstest]
#[case::header("features/calculator.feature", 0)]
#[case::blank("features/calculator.feature", 1)]
#[case::table_row("features/calculator.feature", 23)]
#[case::docstring_body("features/strings.feature", 13)]
#[case::word_placeholder_rejects_spaces("features/users.feature", 12)]
#[case::unknown_step("features/users.feature", 13)]
#[tokio::test]
async fn non_steps_and_undefined_steps_have_no_definition(
    #[future] project: TestWorkspace,
    #[case] feature: &str,
    #[case] line: usize,
) {
    let workspace = project.await;
    assert!(definitions_at(&workspace, feature, line).is_empty());
}

#[rstest]
#[tokio::test]
async fn usages_span_scenarios_and_outlines(#[future] project: TestWorkspace) {
    let workspace = project.await;
    let source = read_lines(&workspace, "features/steps/math_steps.py");

    let usages = workspace
        .queries()
        .find_usages(&source, 8)
        .expect("decorated function");

    let feature = workspace.path("features/calculator.feature");
    assert_eq!(
        usages,
        vec![
            UsageLocation {
                path: feature.clone(),
                line: 6,
                column: 10,
                length: 21,
            },
            UsageLocation {
                path: feature,
                line: 17,
                column: 10,
                length: 23,
            },
        ]
    );
}

#[rstest]
#[tokio::test]
async fn generic_steps_are_used_under_every_keyword(#[future] project: TestWorkspace) {
    let workspace = project.await;
    let source = read_lines(&workspace, "features/steps/common_steps.py");

    let wait = workspace
        .queries()
        .find_usages(&source, 7)
        .expect("decorator line");
    assert_eq!(
        wait.iter().map(|usage| usage.line).collect::<Vec<_>>(),
        vec![9]
    );

    let ready = workspace
        .queries()
        .find_usages(&source, 14)
        .expect("function line");
    assert_eq!(
        ready.iter().map(|usage| usage.line).collect::<Vec<_>>(),
        vec![3]
    );
}

#[rstest]
#[tokio::test]
async fn usage_lookup_requires_a_decorator(#[future] project: TestWorkspace) {
    let workspace = project.await;
    let source = read_lines(&workspace, "features/steps/math_steps.py");

    let error = workspace
        .queries()
        .find_usages(&source, 0)
        .expect_err("an import is not decorated");
    assert_eq!(error.to_string(), "no step decorator at line 1");
}
