//! Unit tests for handler ordering and settlement

use std::cell::RefCell;
use std::rc::Rc;

use core_types::{ErrorKind, JsError};
use promise_core::{make_core, CoreOptions, Function, PromiseState, Task, Value};

use super::setup;

#[test]
fn handlers_fire_in_registration_order() {
    let (event_loop, flavor) = setup();
    let (promise, resolver) = flavor.defer();
    let order = Rc::new(RefCell::new(Vec::new()));

    for i in 0..4 {
        let order = order.clone();
        promise.and_then(move |v| {
            order.borrow_mut().push(i);
            Ok(v)
        });
    }
    resolver.resolve(1);
    event_loop.run_until_idle();

    assert_eq!(*order.borrow(), vec![0, 1, 2, 3]);
}

#[test]
fn handlers_fire_exactly_once() {
    let (event_loop, flavor) = setup();
    let (promise, resolver) = flavor.defer();
    let calls = Rc::new(RefCell::new(0));

    let c = calls.clone();
    promise.and_then(move |v| {
        *c.borrow_mut() += 1;
        Ok(v)
    });
    resolver.resolve(1);
    resolver.resolve(2);
    event_loop.run_until_idle();
    resolver.reject("late");
    event_loop.run_until_idle();

    assert_eq!(*calls.borrow(), 1);
}

#[test]
fn handlers_never_fire_in_the_settling_call() {
    let (event_loop, flavor) = setup();
    let (promise, resolver) = flavor.defer();
    let fired = Rc::new(RefCell::new(false));

    let f = fired.clone();
    promise.and_then(move |v| {
        *f.borrow_mut() = true;
        Ok(v)
    });
    resolver.resolve("now");
    assert!(!*fired.borrow());

    event_loop.run_until_idle();
    assert!(*fired.borrow());
}

#[test]
fn handlers_added_after_settlement_run_after_queued_ones() {
    let (event_loop, flavor) = setup();
    let (promise, resolver) = flavor.defer();
    let order = Rc::new(RefCell::new(Vec::new()));

    let o = order.clone();
    promise.and_then(move |v| {
        o.borrow_mut().push("queued");
        Ok(v)
    });
    resolver.resolve(1);
    let o = order.clone();
    promise.and_then(move |v| {
        o.borrow_mut().push("late");
        Ok(v)
    });
    event_loop.run_until_idle();

    assert_eq!(*order.borrow(), vec!["queued", "late"]);
}

#[test]
fn handler_error_rejects_derived_promise() {
    let (event_loop, flavor) = setup();
    let derived = flavor
        .lift(1)
        .and_then(|_| Err(JsError::range_error("too big").into()));
    event_loop.run_until_idle();

    match derived.inspect() {
        PromiseState::Rejected(Value::Error(error)) => assert!(error.is(ErrorKind::RangeError)),
        other => panic!("unexpected state {:?}", other),
    }
}

#[test]
fn handler_returning_promise_is_flattened() {
    let (event_loop, flavor) = setup();
    let (inner, inner_resolver) = flavor.defer();
    let captured = inner.clone();
    let derived = flavor.lift(1).and_then(move |_| Ok(captured.clone().into()));

    event_loop.run_until_idle();
    assert!(derived.inspect().is_pending());

    inner_resolver.resolve("flat");
    event_loop.run_until_idle();
    assert_eq!(derived.inspect(), PromiseState::Fulfilled(Value::from("flat")));
}

#[test]
fn then_preserves_flavor() {
    let (_event_loop, flavor) = setup();
    let derived_flavor = flavor.extend(promise_core::Api::named("tagged"), None);
    let promise = derived_flavor.lift(1).then(None, None, None);
    assert!(promise.flavor().ptr_eq(&derived_flavor));
}

#[test]
fn resolver_failure_rejects() {
    let (event_loop, flavor) = setup();
    let promise = flavor.promise(|resolver| {
        resolver.notify("ignored");
        Err(JsError::error("constructor failed").into())
    });
    event_loop.run_until_idle();
    assert_eq!(
        promise.inspect(),
        PromiseState::Rejected(Value::from(JsError::error("constructor failed")))
    );
}

#[test]
fn resolve_after_resolver_returns_still_works() {
    let (event_loop, flavor) = setup();
    let stash = Rc::new(RefCell::new(None));
    let s = stash.clone();
    let promise = flavor.promise(move |resolver| {
        *s.borrow_mut() = Some(resolver.clone());
        Ok(())
    });

    let resolver = stash.borrow_mut().take().unwrap();
    resolver.resolve(7);
    event_loop.run_until_idle();
    assert_eq!(promise.inspect(), PromiseState::Fulfilled(Value::from(7)));
}

#[test]
fn synchronous_scheduler_runs_handlers_during_then() {
    let flavor = make_core(CoreOptions::new(Rc::new(|task: Task| task.run())));
    let seen = Rc::new(RefCell::new(None));
    let s = seen.clone();
    flavor.lift(3).then(
        Some(Function::new(move |v| {
            *s.borrow_mut() = Some(v.clone());
            Ok(v)
        })),
        None,
        None,
    );
    assert_eq!(*seen.borrow(), Some(Value::from(3)));
}
