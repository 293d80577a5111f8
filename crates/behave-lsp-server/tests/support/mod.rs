//! Shared fixtures for behave-lsp-server integration tests.
//!
//! The step modules and feature files under `tests/fixtures/features` are
//! copied into a temporary workspace laid out the way a behave project is,
//! then indexed.

use behave_lsp_server::test_support::{TestWorkspace, WorkspaceBuilder};
use rstest::fixture;

const FIXTURES: &[(&str, &str)] = &[
    (
        "features/steps/math_steps.py",
        include_str!("../fixtures/features/steps/math_steps.py"),
    ),
    (
        "features/steps/product_steps.py",
        include_str!("../fixtures/features/steps/product_steps.py"),
    ),
    (
        "features/steps/string_steps.py",
        include_str!("../fixtures/features/steps/string_steps.py"),
    ),
    (
        "features/steps/user_steps.py",
        include_str!("../fixtures/features/steps/user_steps.py"),
    ),
    (
        "features/steps/common_steps.py",
        include_str!("../fixtures/features/steps/common_steps.py"),
    ),
    (
        "features/calculator.feature",
        include_str!("../fixtures/features/calculator.feature"),
    ),
    (
        "features/strings.feature",
        include_str!("../fixtures/features/strings.feature"),
    ),
    (
        "features/users.feature",
        include_str!("../fixtures/features/users.feature"),
    ),
];

/// The fixture project, fully indexed.
#[fixture]
pub async fn project() -> TestWorkspace {
    FIXTURES
        .iter()
        .fold(WorkspaceBuilder::new(), |builder, (path, content)| {
            builder.with_file(*path, *content)
        })
        .build_indexed()
        .await
}

/// Lines of a workspace file as the editor would see them.
///
/// # Panics
///
/// Panics if the file cannot be read.
#[expect(clippy::expect_used, reason = "fixture files are always present")]
pub fn read_lines(workspace: &TestWorkspace, relative: &str) -> Vec<String> {
    std::fs::read_to_string(workspace.path(relative))
        .expect("read fixture file")
        .lines()
        .map(str::to_string)
        .collect()
}
