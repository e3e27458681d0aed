//! Whole-runtime scenarios 3, 4, and 5 of the testable-properties list:
//! middleware short-circuit, parameter validation aggregation, and routing
//! priority between static and dynamic segments.

use armature_core::{
    Body, Constraint, Container, Dispatcher, HandlerOutcome, Middleware, NormalizedRequest, Next,
    ParameterDeclaration, ParameterSource, Response, RuntimeConfig, TargetType,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

struct RejectsEverything;

impl Middleware for RejectsEverything {
    fn priority(&self) -> i32 {
        10
    }

    fn handle(&self, _req: &mut armature_core::NormalizedRequest, _next: Next<'_>) -> Response {
        Response::error(401, "nope", Some("unauthorized"))
    }
}

struct AnnotatesResponse(Arc<AtomicBool>);

impl Middleware for AnnotatesResponse {
    fn priority(&self) -> i32 {
        100
    }

    fn handle(&self, req: &mut armature_core::NormalizedRequest, next: Next<'_>) -> Response {
        let resp = next.call(req);
        self.0.store(true, Ordering::SeqCst);
        resp
    }
}

#[test]
fn middleware_short_circuit_skips_handler_and_later_post_phase() {
    let mut dispatcher = Dispatcher::new(Container::new(), RuntimeConfig::default());
    let handler_ran = Arc::new(AtomicBool::new(false));
    let post_phase_observed = Arc::new(AtomicBool::new(false));

    dispatcher.register_middleware(Arc::new(RejectsEverything));
    dispatcher.register_middleware(Arc::new(AnnotatesResponse(post_phase_observed.clone())));

    let handler_ran_clone = handler_ran.clone();
    dispatcher
        .register_route(
            "GET",
            "/anything",
            "anything",
            vec![],
            Arc::new(move |_c, _ctx, _params| {
                handler_ran_clone.store(true, Ordering::SeqCst);
                Ok(HandlerOutcome::Text("unreachable".into()))
            }),
        )
        .unwrap();
    dispatcher.refresh().unwrap();

    let resp = dispatcher.dispatch(NormalizedRequest::new("GET", "/anything"));

    assert_eq!(resp.status, 401);
    let Body::Json(value) = resp.body else { panic!("expected json error body") };
    assert_eq!(value["error_code"], "unauthorized");
    assert!(!handler_ran.load(Ordering::SeqCst), "handler must not run");
    assert!(!post_phase_observed.load(Ordering::SeqCst), "B's post-phase must not observe a handler response");
}

#[test]
fn parameter_validation_failures_aggregate_with_one_entry_per_parameter() {
    let mut dispatcher = Dispatcher::new(Container::new(), RuntimeConfig::default());
    dispatcher
        .register_route(
            "GET",
            "/items",
            "list_items",
            vec![
                ParameterDeclaration::new("page", ParameterSource::Query, TargetType::Integer)
                    .constraint(Constraint::MinValue(1.0)),
                ParameterDeclaration::new("size", ParameterSource::Query, TargetType::Integer)
                    .constraint(Constraint::MinValue(1.0))
                    .constraint(Constraint::MaxValue(100.0)),
            ],
            Arc::new(|_c, _ctx, _params| Ok(HandlerOutcome::None)),
        )
        .unwrap();
    dispatcher.refresh().unwrap();

    let req = NormalizedRequest::new("GET", "/items").with_query("page", "-1").with_query("size", "500");
    let resp = dispatcher.dispatch(req);

    assert_eq!(resp.status, 400);
    let Body::Json(value) = resp.body else { panic!("expected json error body") };
    assert_eq!(value["error_code"], "resolve_error");
    let details = value["details"].as_array().unwrap();
    assert_eq!(details.len(), 2, "one detail entry per failing parameter");
}

#[test]
fn static_route_wins_over_dynamic_at_the_same_position() {
    let mut dispatcher = Dispatcher::new(Container::new(), RuntimeConfig::default());
    dispatcher
        .register_route(
            "GET",
            "/users/profile",
            "my_profile",
            vec![],
            Arc::new(|_c, _ctx, _p| Ok(HandlerOutcome::Text("profile".into()))),
        )
        .unwrap();
    dispatcher
        .register_route(
            "GET",
            "/users/{id}",
            "get_user",
            vec![ParameterDeclaration::new("id", ParameterSource::Path, TargetType::String)],
            Arc::new(|_c, _ctx, params| {
                let id = match params.get("id") {
                    Some(armature_core::ResolvedValue::Scalar(v)) => v.as_str().unwrap().to_string(),
                    _ => panic!("expected scalar id"),
                };
                Ok(HandlerOutcome::Record(serde_json::json!({ "id": id })))
            }),
        )
        .unwrap();
    dispatcher.refresh().unwrap();

    let profile_resp = dispatcher.dispatch(NormalizedRequest::new("GET", "/users/profile"));
    assert_eq!(profile_resp.status, 200);
    assert!(matches!(profile_resp.body, Body::Text(ref s) if s == "profile"));

    let dynamic_resp = dispatcher.dispatch(NormalizedRequest::new("GET", "/users/42"));
    assert_eq!(dynamic_resp.status, 200);
    let Body::Json(value) = dynamic_resp.body else { panic!("expected json body") };
    assert_eq!(value["id"], "42");
}
