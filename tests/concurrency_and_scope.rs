//! Whole-runtime scenarios 1 and 2 of the testable-properties list: singleton
//! uniqueness under concurrency, and request scope isolation across
//! concurrent requests.

use armature_core::{Container, DefinitionBuilder, Dispatcher, HandlerOutcome, NormalizedRequest, RuntimeConfig, Scope};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

static COUNTER_CONSTRUCTIONS: AtomicU32 = AtomicU32::new(0);

#[allow(dead_code)]
struct Counter {
    value: i32,
}

#[test]
fn singleton_uniqueness_under_concurrency() {
    let container = Container::new();
    container
        .register(
            DefinitionBuilder::new("Counter")
                .typed_factory::<Counter, _>(|_c| {
                    COUNTER_CONSTRUCTIONS.fetch_add(1, Ordering::SeqCst);
                    Ok(Counter { value: 1 })
                })
                .scope(Scope::Singleton)
                .eager(true)
                .build(),
        )
        .unwrap();
    container.refresh(RuntimeConfig::default()).unwrap();

    let container = Arc::new(container);
    let handles: Vec<_> = (0..100)
        .map(|_| {
            let container = Arc::clone(&container);
            thread::spawn(move || container.get("Counter").unwrap())
        })
        .collect();

    let instances: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for instance in &instances[1..] {
        assert!(Arc::ptr_eq(&instances[0], instance));
    }
    assert_eq!(COUNTER_CONSTRUCTIONS.load(Ordering::SeqCst), 1);
}

fn bag_dispatcher() -> Dispatcher {
    let container = Container::new();
    container
        .register(
            DefinitionBuilder::new("Bag")
                .typed_factory::<Mutex<Vec<String>>, _>(|_c| Ok(Mutex::new(Vec::new())))
                .scope(Scope::Request)
                .build(),
        )
        .unwrap();

    let mut dispatcher = Dispatcher::new(container, RuntimeConfig::default());
    dispatcher
        .register_route(
            "GET",
            "/bag",
            "put_into_bag",
            vec![],
            Arc::new(|container, ctx, _params| {
                let bag = container.get("Bag")?;
                let bag = bag.downcast_ref::<Mutex<Vec<String>>>().unwrap();
                bag.lock().unwrap().push(ctx.request_id().to_string());
                Ok(HandlerOutcome::Record(serde_json::json!(bag.lock().unwrap().clone())))
            }),
        )
        .unwrap();
    dispatcher.refresh().unwrap();
    dispatcher
}

#[test]
fn request_scope_is_isolated_across_concurrent_requests() {
    let dispatcher = Arc::new(bag_dispatcher());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let dispatcher = Arc::clone(&dispatcher);
            thread::spawn(move || dispatcher.dispatch(NormalizedRequest::new("GET", "/bag")))
        })
        .collect();

    for handle in handles {
        let resp = handle.join().unwrap();
        assert_eq!(resp.status, 200);
        let armature_core::Body::Json(value) = resp.body else { panic!("expected json body") };
        let entries = value.as_array().unwrap();
        assert_eq!(entries.len(), 1, "each request's bag must contain exactly one entry");
    }
}
