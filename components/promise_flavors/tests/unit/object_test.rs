//! Unit tests for object promises

use core_types::ErrorKind;
use promise_core::{Function, Object, PromiseState, Value};
use promise_flavors::{object_flavor, ObjectPromise};

use super::{num, setup};

fn point() -> Object {
    Object::from_entries([("x", Value::from(1)), ("y", Value::from(2))])
}

#[test]
fn get_reads_a_property_of_the_eventual_object() {
    let (event_loop, base) = setup();
    let objects = object_flavor(&base);
    let (later, resolver) = objects.defer();

    let x = later.get("x");
    resolver.resolve(point());
    event_loop.run_until_done();

    assert_eq!(x.inspect(), PromiseState::Fulfilled(Value::from(1)));
    assert!(x.flavor().ptr_eq(&objects));
}

#[test]
fn get_of_missing_property_is_undefined() {
    let (event_loop, base) = setup();
    let objects = object_flavor(&base);
    let missing = objects.lift(point()).get("z");
    event_loop.run_until_done();
    assert_eq!(missing.inspect(), PromiseState::Fulfilled(Value::Undefined));
}

#[test]
fn get_on_undefined_rejects_with_type_error() {
    let (event_loop, base) = setup();
    let objects = object_flavor(&base);
    let result = objects.lift(()).get("x");
    event_loop.run_until_done();
    match result.inspect() {
        PromiseState::Rejected(Value::Error(error)) => assert!(error.is(ErrorKind::TypeError)),
        other => panic!("unexpected state {:?}", other),
    }
}

#[test]
fn set_and_delete_return_the_mutated_object() {
    let (event_loop, base) = setup();
    let objects = object_flavor(&base);
    let target = point();

    let updated = objects.lift(target.clone()).set("z", Value::from(3)).delete("x");
    event_loop.run_until_done();

    match updated.inspect() {
        PromiseState::Fulfilled(Value::Object(object)) => assert!(object.ptr_eq(&target)),
        other => panic!("unexpected state {:?}", other),
    }
    assert!(!target.has("x"));
    assert_eq!(target.get("z").unwrap(), Value::from(3));
}

#[test]
fn invoke_calls_the_method_with_the_object_as_this() {
    let (event_loop, base) = setup();
    let objects = object_flavor(&base);
    let target = point();
    target.set(
        "scaled",
        Function::native("scaled", |this, args| {
            let x = num(&this.get_property("x")?);
            Ok(Value::from(x * num(&args[0])))
        })
        .into(),
    );

    let result = objects.lift(target).invoke("scaled", vec![Value::from(10)]);
    event_loop.run_until_done();
    assert_eq!(result.inspect(), PromiseState::Fulfilled(Value::from(10)));
}

#[test]
fn invoke_of_non_function_rejects() {
    let (event_loop, base) = setup();
    let objects = object_flavor(&base);
    let result = objects.lift(point()).invoke("x", Vec::new());
    event_loop.run_until_done();
    match result.inspect() {
        PromiseState::Rejected(Value::Error(error)) => assert!(error.is(ErrorKind::TypeError)),
        other => panic!("unexpected state {:?}", other),
    }
}

#[test]
fn rejection_skips_the_operation() {
    let (event_loop, base) = setup();
    let objects = object_flavor(&base);
    let result = objects.reject("gone").get("x");
    event_loop.run_until_done();
    assert_eq!(result.inspect(), PromiseState::Rejected(Value::from("gone")));
}
