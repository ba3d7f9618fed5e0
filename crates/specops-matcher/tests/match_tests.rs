use pretty_assertions::assert_eq;
use proptest::prelude::*;
use specops_matcher::{match_path, CompiledTemplate, MatchKind, MatcherConfig, PathMatcher};
use specops_model::{PathTemplate, RequestOrigin, SynthesisStrategy};
use specops_test_utils::{
    get, load_fixture, request, spec_with_paths, synthesized, PETSTORE_V2, USERS_ORDERS_V3,
};
use std::sync::Arc;

#[test]
fn users_scenario() {
    let spec = spec_with_paths(&[("/users/{id}", &["get"])]);
    let matcher = PathMatcher::new(spec, MatcherConfig::default());

    let bound = matcher.match_request(&get("/users/42"));
    assert_eq!(bound.kind(), MatchKind::Matched);
    assert_eq!(bound.path_params["id"], "42");

    let shadow = matcher.match_request(&get("/users/42/profile"));
    assert_eq!(shadow.kind(), MatchKind::Unmatched);
    assert!(shadow.template.is_none());
    assert!(shadow.path_params.is_empty());
}

#[test]
fn mixed_segment_counts_as_placeholder() {
    let spec = load_fixture(USERS_ORDERS_V3);
    let matcher = PathMatcher::new(spec, MatcherConfig::default());
    let result = matcher.match_request(&get("/files/report.json"));
    assert_eq!(result.kind(), MatchKind::Matched);
    assert_eq!(result.path_params["name"], "report");
    assert!(matcher.match_path("/files/report.xml").is_none());
}

#[test]
fn swagger_base_path_and_origin_carried() {
    let spec = load_fixture(PETSTORE_V2);
    let matcher = PathMatcher::new(Arc::clone(&spec), MatcherConfig::default());
    let result = matcher.match_request(&synthesized("GET", "/api/pets/9", SynthesisStrategy::Boundary));
    assert_eq!(result.kind(), MatchKind::Matched);
    assert_eq!(
        spec.operation(result.operation.unwrap()).unwrap().operation_id,
        "getPet"
    );
    assert_eq!(result.origin, RequestOrigin::Synthesized(SynthesisStrategy::Boundary));
}

#[test]
fn query_parameters_are_checked_not_matched() {
    let spec = load_fixture(USERS_ORDERS_V3);
    let matcher = PathMatcher::new(spec, MatcherConfig::default());
    let result = matcher.match_request(&request("GET", "/users?limit=ten&status=gone"));
    assert_eq!(result.kind(), MatchKind::Matched);
    let names: Vec<_> = result.issues.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["limit", "status"]);
}

#[test]
fn match_result_serializes() {
    let spec = spec_with_paths(&[("/users/{id}", &["get"])]);
    let matcher = PathMatcher::new(spec, MatcherConfig::default());
    let result = matcher.match_request(&get("/users/42"));
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["path_params"]["id"], "42");
    assert_eq!(json["template"]["path"], "/users/{id}");
}

#[derive(Debug, Clone)]
enum Piece {
    Literal(&'static str),
    Placeholder,
}

fn piece() -> impl Strategy<Value = Piece> {
    prop_oneof![
        Just(Piece::Literal("a")),
        Just(Piece::Literal("b")),
        Just(Piece::Literal("c")),
        Just(Piece::Placeholder),
    ]
}

fn template_path(pieces: &[Piece]) -> String {
    pieces
        .iter()
        .enumerate()
        .map(|(i, p)| match p {
            Piece::Literal(l) => format!("/{l}"),
            Piece::Placeholder => format!("/{{p{i}}}"),
        })
        .collect()
}

fn templates_of(paths: &[String]) -> Vec<PathTemplate> {
    paths
        .iter()
        .map(|path| PathTemplate {
            path: path.clone(),
            placeholders: Vec::new(),
            operations: Vec::new(),
        })
        .collect()
}

proptest! {
    #[test]
    fn prop_match_is_bound_to_target_or_more_specific(
        shapes in prop::collection::vec(prop::collection::vec(piece(), 1..5), 1..8),
        pick in any::<prop::sample::Index>(),
        tokens in prop::collection::vec("[a-d0-9]{1,4}", 5),
    ) {
        let paths: Vec<String> = shapes.iter().map(|s| template_path(s)).collect();
        let templates = templates_of(&paths);
        let target_index = pick.index(shapes.len());
        let target = &shapes[target_index];

        let concrete: String = target
            .iter()
            .zip(&tokens)
            .map(|(p, token)| match p {
                Piece::Literal(l) => format!("/{l}"),
                Piece::Placeholder => format!("/{token}"),
            })
            .collect();

        let found = match_path(&templates, &concrete);
        prop_assert!(found.is_some());
        let found = found.unwrap();

        let target_priority = CompiledTemplate::compile(target_index, &paths[target_index]).priority();
        let found_priority = CompiledTemplate::compile(found.template.index, &found.template.path).priority();
        prop_assert!(found_priority <= target_priority);

        // Same input, same answer
        prop_assert_eq!(match_path(&templates, &concrete), Some(found));
    }

    #[test]
    fn prop_different_segment_count_never_matches(
        shape in prop::collection::vec(piece(), 1..5),
        extra in 1usize..3,
    ) {
        let templates = templates_of(&[template_path(&shape)]);
        let concrete: String = (0..shape.len() + extra).map(|_| "/a").collect();
        prop_assert!(match_path(&templates, &concrete).is_none());
    }
}
