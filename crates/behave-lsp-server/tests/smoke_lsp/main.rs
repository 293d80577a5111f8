//! End-to-end smoke tests for the `behave-lsp` binary.
//!
//! Each test runs the server as a child process over a temporary behave
//! project and talks JSON-RPC to it through [`wire::LspSession`]. Together
//! they cover argument parsing, the initial workspace scan, every request
//! handler, diagnostics publishing, and a clean shutdown.
#![expect(
    clippy::expect_used,
    reason = "smoke tests fail fast with a message naming the broken step"
)]

mod wire;

use std::path::PathBuf;

use serde_json::Value;
use tempfile::TempDir;

use wire::LspSession;

const FEATURE: &str = concat!(
    "Feature: shop\n",
    "  Scenario: basket\n",
    "    Given a user exists\n",
    "    When they add 3 apples\n",
    "    And they add 2 pears\n",
);

const STEPS: &str = concat!(
    "from behave import given, when\n",
    "\n",
    "@given(\"a user exists\")\n",
    "def step_user(context):\n",
    "    pass\n",
    "\n",
    "@when(\"they add {count:d} {fruit}\")\n",
    "def step_add(context, count, fruit):\n",
    "    pass\n",
);

/// A project with `features/shop.feature` and its step module.
struct ShopProject {
    _dir: TempDir,
    root: PathBuf,
    feature: PathBuf,
    steps: PathBuf,
}

impl ShopProject {
    fn new() -> Self {
        let dir = TempDir::new().expect("temp dir");
        let root = dir.path().to_path_buf();
        let feature = root.join("features/shop.feature");
        let steps = root.join("features/steps/shop_steps.py");
        std::fs::create_dir_all(root.join("features/steps")).expect("create steps dir");
        std::fs::write(&feature, FEATURE).expect("write feature");
        std::fs::write(&steps, STEPS).expect("write step module");
        Self {
            _dir: dir,
            root,
            feature,
            steps,
        }
    }

    /// Start a server and wait until the opened feature has no undefined
    /// steps, which means the initial scan has finished.
    fn indexed_session(&self) -> LspSession {
        let (mut session, _) = LspSession::start(&self.root);
        session.open(&self.feature);
        session.diagnostics_for(&self.feature, <[Value]>::is_empty);
        session
    }
}

fn str_at<'a>(value: &'a Value, pointer: &str) -> Option<&'a str> {
    value.pointer(pointer).and_then(Value::as_str)
}

fn result_array(response: &Value) -> &Vec<Value> {
    response
        .get("result")
        .and_then(Value::as_array)
        .unwrap_or_else(|| panic!("expected an array result: {response}"))
}

fn start_lines(locations: &[Value]) -> Vec<u64> {
    locations
        .iter()
        .filter_map(|location| location.pointer("/range/start/line").and_then(Value::as_u64))
        .collect()
}

#[test]
fn initialize_reports_capabilities_and_shuts_down() {
    let dir = TempDir::new().expect("temp dir");

    let (session, initialised) = LspSession::start(dir.path());

    let capabilities = initialised
        .pointer("/result/capabilities")
        .expect("capabilities");
    assert_eq!(capabilities.get("definitionProvider"), Some(&Value::Bool(true)));
    assert_eq!(capabilities.get("referencesProvider"), Some(&Value::Bool(true)));
    assert_eq!(
        str_at(capabilities, "/completionProvider/triggerCharacters/0"),
        Some(" ")
    );
    assert_eq!(
        capabilities.get("textDocumentSync").and_then(Value::as_u64),
        Some(1)
    );
    assert_eq!(str_at(&initialised, "/result/serverInfo/name"), Some("behave-lsp"));

    session.shutdown();
}

#[test]
fn continuation_step_jumps_to_its_decorator() {
    let project = ShopProject::new();
    let mut session = project.indexed_session();

    let response = session.request_at("textDocument/definition", &project.feature, 4, 8);

    let locations = result_array(&response);
    assert_eq!(locations.len(), 1, "expected one definition: {response}");
    let uri = locations.first().and_then(|location| str_at(location, "/uri"));
    assert!(
        uri.is_some_and(|uri| uri.ends_with("shop_steps.py")),
        "unexpected target: {response}"
    );
    assert_eq!(start_lines(locations), vec![6]);

    session.shutdown();
}

#[test]
fn references_list_every_feature_step_using_a_definition() {
    let project = ShopProject::new();
    let mut session = project.indexed_session();

    let response = session.request_at("textDocument/references", &project.steps, 7, 4);
    assert_eq!(start_lines(result_array(&response)), vec![3, 4]);

    let outside = session.request_at("textDocument/references", &project.steps, 0, 0);
    assert!(
        str_at(&outside, "/error/message").is_some(),
        "expected an error: {outside}"
    );

    session.shutdown();
}

#[test]
fn undefined_step_is_reported_on_open() {
    let dir = TempDir::new().expect("temp dir");
    let feature = dir.path().join("undefined.feature");
    std::fs::write(
        &feature,
        concat!(
            "Feature: undefined\n",
            "  Scenario: missing step\n",
            "    Given a step with no implementation\n",
        ),
    )
    .expect("write feature");
    let (mut session, _) = LspSession::start(dir.path());

    session.open(&feature);
    let diagnostics = session.diagnostics_for(&feature, |found| !found.is_empty());

    assert_eq!(diagnostics.len(), 1);
    let diagnostic = diagnostics.first().expect("one diagnostic");
    assert_eq!(
        str_at(diagnostic, "/message"),
        Some("Undefined step: Given a step with no implementation")
    );
    assert_eq!(str_at(diagnostic, "/source"), Some("behave-lsp"));
    assert_eq!(
        diagnostic
            .pointer("/range/start/character")
            .and_then(Value::as_u64),
        Some(10)
    );

    session.shutdown();
}

#[test]
fn completion_after_and_offers_the_previous_keyword_snippets() {
    let project = ShopProject::new();
    let mut session = project.indexed_session();

    // "    And " follows a When step, so only When definitions apply.
    let response = session.request_at("textDocument/completion", &project.feature, 4, 8);

    let items = result_array(&response);
    let labels: Vec<&str> = items.iter().filter_map(|item| str_at(item, "/label")).collect();
    assert_eq!(labels, vec!["they add {count:d} {fruit}"]);
    assert_eq!(
        items.first().and_then(|item| str_at(item, "/textEdit/newText")),
        Some("they add ${1:count} ${2:fruit}")
    );

    session.shutdown();
}

#[test]
fn section_headers_get_no_completion() {
    let project = ShopProject::new();
    let mut session = project.indexed_session();

    let response = session.request_at("textDocument/completion", &project.feature, 1, 13);

    assert_eq!(response.get("result"), Some(&Value::Null));
    session.shutdown();
}
