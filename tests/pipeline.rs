//! Integration tests for chain ordering, short-circuiting and recovery.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};

use http::StatusCode;
use strand::middleware::Recovery;
use strand::{
    build_chain, handler_fn, BoxedHandler, Context, Handler, Next, Pipeline, Request, ResponseWriter,
};

/// Three handlers writing markers around `next`; the last never calls it.
#[test]
fn handlers_run_in_order_and_unwind_in_reverse() {
    let result = Arc::new(Mutex::new(String::new()));
    let (r1, r2, r3) = (Arc::clone(&result), Arc::clone(&result), Arc::clone(&result));

    let mut app = Pipeline::default();
    app.append_fn(move |ctx: &Context, rw: &mut ResponseWriter, req: &Request, next: Next<'_>| {
        r1.lock().unwrap().push_str("foo");
        next.run(ctx, rw, req);
        r1.lock().unwrap().push_str("ban");
    });
    app.append_fn(move |ctx: &Context, rw: &mut ResponseWriter, req: &Request, next: Next<'_>| {
        r2.lock().unwrap().push_str("bar");
        next.run(ctx, rw, req);
        r2.lock().unwrap().push_str("baz");
    });
    app.append_fn(move |_: &Context, rw: &mut ResponseWriter, _: &Request, _: Next<'_>| {
        r3.lock().unwrap().push_str("bat");
        rw.write_header(StatusCode::BAD_REQUEST);
    });

    let rw = app.dispatch(&Request::default());

    assert_eq!(*result.lock().unwrap(), "foobarbatbazban");
    assert_eq!(rw.status(), 400);
}

#[test]
fn empty_pipeline_is_safe_to_dispatch() {
    let app = Pipeline::default();
    assert!(app.handlers().is_empty());
    assert!(app.chain().is_empty());

    let rw = app.dispatch(&Request::default());
    assert!(!rw.written());
    assert_eq!(rw.body(), b"");
}

#[test]
fn listed_handler_behaves_like_the_registered_one() {
    let mut app = Pipeline::default();
    assert_eq!(app.handlers().len(), 0);

    app.append_fn(|_: &Context, rw: &mut ResponseWriter, _: &Request, _: Next<'_>| {
        rw.write_header(StatusCode::OK);
    });

    let handlers = app.handlers();
    assert_eq!(handlers.len(), 1);

    let mut direct = ResponseWriter::new();
    handlers[0].serve(&Context::background(), &mut direct, &Request::default(), Next::end());
    let via_chain = app.dispatch(&Request::default());

    assert_eq!(direct.status(), 200);
    assert_eq!(direct.status(), via_chain.status());
}

#[test]
fn listing_handlers_is_idempotent() {
    let mut app = Pipeline::default();
    app.append_plain(|_: &mut ResponseWriter, _: &Request| {});
    app.append_plain(|_: &mut ResponseWriter, _: &Request| {});

    let first: Vec<BoxedHandler> = app.handlers().to_vec();
    let second = app.handlers();
    assert_eq!(first.len(), second.len());
    assert!(first.iter().zip(second).all(|(a, b)| Arc::ptr_eq(a, b)));
}

#[test]
fn short_circuit_hides_later_handlers() {
    let reached = Arc::new(Mutex::new(false));
    let flag = Arc::clone(&reached);

    let mut app = Pipeline::default();
    app.append_fn(|_: &Context, rw: &mut ResponseWriter, _: &Request, _: Next<'_>| {
        rw.write_header(StatusCode::UNAUTHORIZED);
    });
    app.append_fn(move |_: &Context, rw: &mut ResponseWriter, _: &Request, _: Next<'_>| {
        *flag.lock().unwrap() = true;
        rw.write_body(b"secret");
    });

    let rw = app.dispatch(&Request::default());
    assert_eq!(rw.status(), 401);
    assert_eq!(rw.size(), 0);
    assert!(!*reached.lock().unwrap());
}

#[test]
fn built_chain_has_one_node_per_handler_plus_sentinel() {
    for n in 0..8 {
        let handlers: Vec<BoxedHandler> = (0..n)
            .map(|i| -> BoxedHandler {
                Arc::new(handler_fn(move |ctx: &Context, rw: &mut ResponseWriter, req: &Request, next: Next<'_>| {
                    rw.write_body(&[b'0' + i as u8]);
                    next.run(ctx, rw, req);
                }))
            })
            .collect();

        let chain = build_chain(&handlers);
        assert_eq!(chain.len(), n);
        assert_eq!(chain.sentinels(), 1);

        let mut rw = ResponseWriter::new();
        chain.head().run(&Context::background(), &mut rw, &Request::default());
        let expected: Vec<u8> = (0..n).map(|i| b'0' + i as u8).collect();
        assert_eq!(rw.body(), expected.as_slice());
    }
}

#[test]
fn recovery_upstream_turns_panic_into_500() {
    let mut app = Pipeline::default();
    app.append(Recovery::quiet());
    app.append_fn(|_: &Context, _: &mut ResponseWriter, _: &Request, _: Next<'_>| {
        panic!("boom");
    });

    let rw = app.dispatch(&Request::default());
    assert_eq!(rw.status(), 500);

    // The pipeline is still usable afterwards.
    assert_eq!(app.dispatch(&Request::default()).status(), 500);
}

#[test]
fn recovery_downstream_of_the_panic_does_not_help() {
    let mut app = Pipeline::default();
    app.append_fn(|_: &Context, _: &mut ResponseWriter, _: &Request, _: Next<'_>| {
        panic!("too early");
    });
    app.append(Recovery::quiet());

    let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| app.dispatch(&Request::default())));
    assert!(outcome.is_err());
}
