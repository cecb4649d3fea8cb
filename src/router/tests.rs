//! Unit tests for route matching and registration.

use rstest::{fixture, rstest};

use super::*;

#[fixture]
fn router() -> Router<&'static str> {
    let mut router = Router::new();
    router
        .route("", "root")
        .and_then(|r| r.route("status", "status"))
        .and_then(|r| r.route("users/:id", "user"))
        .and_then(|r| r.route("users/:id/posts/:post", "post"))
        .and_then(|r| r.route("tiles/*/*", "tile"))
        .and_then(|r| r.route("files/**", "files"))
        .expect("valid routes");
    router
}

#[rstest]
#[case::empty_key("", "root")]
#[case::literal("status", "status")]
#[case::named("users/42", "user")]
#[case::nested_named("users/42/posts/7", "post")]
#[case::wildcards("tiles/3/9", "tile")]
#[case::rest("files/a/b/c.txt", "files")]
#[case::rest_empty("files", "files")]
fn keys_resolve_to_handlers(router: Router<&'static str>, #[case] key: &str, #[case] expected: &str) {
    let hit = router.at(key).expect("route should match");
    assert_eq!(*hit.handler, expected);
}

#[rstest]
#[case::unknown("nope")]
#[case::too_many_segments("status/extra")]
#[case::empty_named_segment("users/")]
#[case::missing_wildcard("tiles/3")]
fn unmatched_keys_yield_none(router: Router<&'static str>, #[case] key: &str) {
    assert!(router.at(key).is_none());
}

#[rstest]
fn named_parameters_are_extracted(router: Router<&'static str>) {
    let hit = router.at("users/42/posts/7").expect("route should match");
    assert_eq!(hit.params.get("id"), Some("42"));
    assert_eq!(hit.params.get("post"), Some("7"));
    assert_eq!(hit.params.get("missing"), None);
    assert_eq!(hit.pattern, Some("users/:id/posts/:post"));
    assert_eq!(
        hit.params.iter().collect::<Vec<_>>(),
        vec![("id", "42"), ("post", "7")]
    );
}

#[rstest]
fn positional_parameters_are_extracted(router: Router<&'static str>) {
    let tile = router.at("tiles/3/9").expect("tile route");
    assert_eq!(tile.params.positional(0), Some("3"));
    assert_eq!(tile.params.positional(1), Some("9"));

    let file = router.at("files/a/b/c.txt").expect("files route");
    assert_eq!(file.params.positional(0), Some("a/b/c.txt"));
}

#[test]
fn first_registered_match_wins() {
    let mut router = Router::new();
    router
        .route("users/:id", "by-id")
        .and_then(|r| r.route("users/me", "me"))
        .expect("valid routes");
    assert_eq!(*router.at("users/me").expect("match").handler, "by-id");
}

#[test]
fn fallback_applies_only_without_pattern_match() {
    let mut router = Router::new();
    router.fallback("fallback");
    router.route("status", "status").expect("valid route");

    assert_eq!(*router.at("status").expect("match").handler, "status");
    let hit = router.at("anything/else").expect("fallback");
    assert_eq!(*hit.handler, "fallback");
    assert!(hit.params.is_empty());
    assert_eq!(hit.pattern, None);
}

#[test]
fn fallback_is_replaced() {
    let mut router = Router::new();
    router.fallback("first").fallback("second");
    assert_eq!(*router.at("x").expect("fallback").handler, "second");
    assert_eq!(router.len(), 0);
    assert!(!router.is_empty());
}

#[test]
fn duplicate_patterns_are_rejected() {
    let mut router = Router::new();
    router.route("a/:id", 1).expect("first registration");
    let err = router.route("a/:id", 2).expect_err("duplicate");
    assert_eq!(err, RouterError::DuplicateRoute("a/:id".into()));
}

#[rstest]
#[case::rest_not_last("a/**/b")]
#[case::empty_name("a/:")]
#[case::repeated_name(":id/:id")]
fn malformed_patterns_are_rejected(#[case] pattern: &str) {
    let mut router = Router::new();
    let err = router.route(pattern, ()).expect_err("invalid pattern");
    assert!(matches!(err, RouterError::InvalidPattern { .. }));
}

#[test]
fn empty_router_matches_nothing() {
    let router: Router<()> = Router::new();
    assert!(router.is_empty());
    assert!(router.at("").is_none());
}
