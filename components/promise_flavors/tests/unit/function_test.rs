//! Unit tests for function promises and lifting

use core_types::{ErrorKind, JsError};
use promise_core::{Function, Object, PromiseState, Value};
use promise_flavors::{default_namer, function_flavor, lift_all, lift_function, FunctionPromise};

use super::{add, num, numbers, setup};

fn scale() -> Function {
    Function::native("scale", |this, args| {
        Ok(Value::from(num(&this.get_property("factor")?) * num(&args[0])))
    })
}

#[test]
fn call_invokes_the_eventual_function() {
    let (event_loop, base) = setup();
    let functions = function_flavor(&base);
    let (later, resolver) = functions.defer();

    let result = later.call(Value::Undefined, vec![Value::from(1), base.lift(2).into()]);
    resolver.resolve(add());
    event_loop.run_until_done();

    assert_eq!(result.inspect(), PromiseState::Fulfilled(Value::from(3)));
}

#[test]
fn call_passes_this() {
    let (event_loop, base) = setup();
    let functions = function_flavor(&base);
    let receiver = Object::from_entries([("factor", Value::from(5))]);

    let result = functions.lift(scale()).call(receiver.into(), vec![Value::from(4)]);
    event_loop.run_until_done();
    assert_eq!(result.inspect(), PromiseState::Fulfilled(Value::from(20)));
}

#[test]
fn apply_accepts_a_promised_argument_list() {
    let (event_loop, base) = setup();
    let functions = function_flavor(&base);
    let args = base.lift(Value::from(vec![base.lift(40).into(), Value::from(2)]));

    let result = functions.lift(add()).apply(Value::Undefined, args.into());
    event_loop.run_until_done();
    assert_eq!(result.inspect(), PromiseState::Fulfilled(Value::from(42)));
}

#[test]
fn apply_rejects_when_an_argument_rejects() {
    let (event_loop, base) = setup();
    let functions = function_flavor(&base);
    let args = Value::from(vec![Value::from(1), base.reject("bad argument").into()]);

    let result = functions.lift(add()).apply(Value::Undefined, args);
    event_loop.run_until_done();
    assert_eq!(result.inspect(), PromiseState::Rejected(Value::from("bad argument")));
}

#[test]
fn calling_a_non_function_rejects_with_type_error() {
    let (event_loop, base) = setup();
    let functions = function_flavor(&base);
    let result = functions.lift(42).call(Value::Undefined, Vec::new());
    event_loop.run_until_done();
    match result.inspect() {
        PromiseState::Rejected(Value::Error(error)) => assert!(error.is(ErrorKind::TypeError)),
        other => panic!("unexpected state {:?}", other),
    }
}

#[test]
fn bind_fixes_this_and_leading_arguments() {
    let (event_loop, base) = setup();
    let functions = function_flavor(&base);
    let receiver = Object::from_entries([("factor", Value::from(3))]);

    let bound = functions.lift(scale()).bind(receiver.into(), vec![Value::from(7)]);
    event_loop.run_until_done();

    let bound = match bound.inspect() {
        PromiseState::Fulfilled(Value::Function(function)) => function,
        other => panic!("unexpected state {:?}", other),
    };
    assert_eq!(bound.call(&Value::Undefined, &[]).unwrap(), Value::from(21));
}

#[test]
fn lifted_function_waits_for_promised_arguments() {
    let (event_loop, base) = setup();
    let lifted = lift_function(&base, &add());
    let (later, resolver) = base.defer();

    let result = lifted.call(&Value::Undefined, &[later.into(), Value::from(1)]).unwrap();
    let result = result.as_promise().unwrap().clone();
    event_loop.run_until_idle();
    assert!(result.inspect().is_pending());

    resolver.resolve(41);
    event_loop.run_until_done();
    assert_eq!(result.inspect(), PromiseState::Fulfilled(Value::from(42)));
}

#[test]
fn lifted_function_error_rejects() {
    let (event_loop, base) = setup();
    let failing = Function::new(|_| Err(JsError::range_error("too big").into()));
    let lifted = lift_function(&base, &failing);

    let result = lifted.call(&Value::Undefined, &[Value::from(1)]).unwrap();
    event_loop.run_until_done();
    assert_eq!(
        result.as_promise().unwrap().inspect(),
        PromiseState::Rejected(Value::from(JsError::range_error("too big")))
    );
}

#[test]
fn lift_all_adds_lifted_members_under_new_names() {
    let (event_loop, base) = setup();
    let api = Object::from_entries([("add", add().into()), ("version", Value::from(2))]);

    let lifted = lift_all(&base, &api, default_namer).unwrap();
    assert_eq!(lifted.get("version").unwrap(), Value::from(2));
    assert!(lifted.get("add").unwrap().as_function().unwrap().ptr_eq(&add_of(&api)));

    let add_async = lifted.get("addAsync").unwrap();
    let result = add_async
        .call(&Value::Undefined, &[base.lift(1).into(), Value::from(1)])
        .unwrap();
    event_loop.run_until_done();
    assert_eq!(
        result.as_promise().unwrap().inspect(),
        PromiseState::Fulfilled(Value::from(2))
    );
}

fn add_of(api: &Object) -> Function {
    api.get("add").unwrap().as_function().unwrap().clone()
}

#[test]
fn lift_all_with_identity_namer_replaces_functions() {
    let (event_loop, base) = setup();
    let api = Object::from_entries([("add", add().into())]);

    let lifted = lift_all(&base, &api, |key| key.to_string()).unwrap();
    let result = lifted
        .get("add")
        .unwrap()
        .call(&Value::Undefined, &[Value::from(2), Value::from(3)])
        .unwrap();
    event_loop.run_until_done();
    assert_eq!(
        result.as_promise().unwrap().inspect(),
        PromiseState::Fulfilled(Value::from(5))
    );
}

#[test]
fn lift_all_propagates_accessor_errors() {
    let (_event_loop, base) = setup();
    let api = Object::new();
    api.define_getter(
        "broken",
        Function::new(|_| Err(JsError::error("getter failed").into())),
    );

    let err = lift_all(&base, &api, default_namer).unwrap_err();
    assert_eq!(err, Value::from(JsError::error("getter failed")));
}

#[test]
fn spread_and_call_agree() {
    use promise_flavors::{array_flavor, ArrayPromise};

    let (event_loop, base) = setup();
    let arrays = array_flavor(&base);
    let functions = function_flavor(&base);

    let spread = arrays.lift(numbers(&[20, 22])).spread(add());
    let called = functions.lift(add()).call(Value::Undefined, vec![Value::from(20), Value::from(22)]);
    event_loop.run_until_done();
    assert_eq!(spread.inspect(), called.inspect());
}
