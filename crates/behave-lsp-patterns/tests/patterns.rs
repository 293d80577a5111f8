#![expect(clippy::expect_used, reason = "tests assert the public API end to end")]

use behave_lsp_patterns::{
    DefinitionKeyword, PatternError, StepKeyword, build_regex_from_pattern,
    compile_annotation_line, compile_pattern, get_type_pattern, parse_step_line,
    resolve_effective_keyword, to_snippet,
};

#[test]
fn decorator_pattern_matches_feature_step_text() {
    let annotation = compile_annotation_line("@given(\"the first number is {number:d}\")")
        .expect("decorator line");
    let matcher = compile_pattern(&annotation.pattern).expect("pattern should compile");

    let step = parse_step_line("    Given the first number is 5").expect("step line");
    assert!(annotation.keyword.accepts(StepKeyword::Given));
    assert!(matcher.is_match(step.text));
}

#[test]
fn continuation_step_matches_through_resolved_keyword() {
    let feature = [
        "Feature: shopping",
        "  Scenario: discount",
        "    Given the price is 100.00",
        "    And the price is 50.00",
    ];
    let keyword = resolve_effective_keyword(&feature[..], 3).expect("resolved keyword");
    assert_eq!(keyword, StepKeyword::Given);

    let annotation =
        compile_annotation_line("@given(\"the price is {price:f}\")").expect("decorator line");
    assert!(annotation.keyword.accepts(keyword));
    assert!(!DefinitionKeyword::When.accepts(keyword));

    let step = parse_step_line(feature[3]).expect("step line");
    let matcher = compile_pattern(&annotation.pattern).expect("pattern should compile");
    assert!(matcher.is_match(step.text));
}

#[test]
fn step_decorators_accept_every_keyword() {
    let annotation = compile_annotation_line("@step(\"a logged in user\")").expect("decorator");
    for keyword in [StepKeyword::Given, StepKeyword::When, StepKeyword::Then] {
        assert!(annotation.keyword.accepts(keyword));
    }
}

#[test]
fn exposes_placeholder_error_details() {
    let Err(err) = build_regex_from_pattern("{value:}") else {
        panic!("expected placeholder error");
    };
    let PatternError::Placeholder(info) = err else {
        panic!("expected placeholder error, got {err}");
    };
    assert_eq!(info.placeholder.as_deref(), Some("value"));
    assert!(info.to_string().contains("value"));
}

#[test]
fn unknown_type_tags_match_lazily() {
    assert_eq!(get_type_pattern(Some("Custom")), r".+?");
    assert_eq!(get_type_pattern(None), r".+?");
    let matcher = compile_pattern("I pick {colour:Colour}").expect("pattern should compile");
    assert!(matcher.is_match("I pick dark blue"));
}

#[test]
fn snippets_follow_placeholder_order() {
    assert_eq!(
        to_snippet("I search for {term} in {field:w}"),
        "I search for ${1:term} in ${2:field}"
    );
}
