//! Contract tests for promise_flavors
//!
//! Mixins compose through `Api::merge` and `Flavor::extend`; these tests pin
//! the names, the capability lookup and the `value_type` plumbing.

use std::rc::Rc;

use promise_core::{make_core, CoreOptions, EventLoop, Flavor, PromiseState, Scheduler, Value};
use promise_flavors::{
    array_api, array_flavor, function_api, function_flavor, iterator_api, iterator_flavor,
    object_api, object_flavor, ArrayPromise, ObjectPromise,
};

fn setup() -> (EventLoop, Flavor) {
    let event_loop = EventLoop::with_virtual_clock();
    let scheduler = Scheduler::with_host(event_loop.host_ticks()).unwrap();
    (event_loop, make_core(CoreOptions::new(Rc::new(scheduler))))
}

mod mixin_contract {
    use super::*;

    #[test]
    fn mixins_are_named_after_their_capability() {
        let (_event_loop, base) = setup();
        assert_eq!(array_flavor(&base).name(), "array");
        assert_eq!(object_flavor(&base).name(), "object");
        assert_eq!(function_flavor(&base).name(), "function");
        assert_eq!(iterator_flavor(&base).name(), "iterator");
    }

    #[test]
    fn mixins_expose_their_operations() {
        let array_keys = [
            "all", "settle", "spread", "map", "reduce", "reduce_right", "filter", "concat",
            "slice", "for_each",
        ];
        assert_eq!(array_api().keys(), array_keys);
        assert_eq!(object_api().keys(), ["get", "set", "delete", "invoke"]);
        assert_eq!(function_api().keys(), ["call", "apply", "bind"]);
        assert_eq!(
            iterator_api().keys(),
            [
                "map", "filter", "take", "take_while", "take_until", "drop", "drop_while",
                "drop_until", "reduce", "for_each",
            ]
        );
    }

    #[test]
    fn derived_flavors_share_the_core() {
        let (_event_loop, base) = setup();
        let arrays = array_flavor(&base);
        assert!(arrays.is_derived_from(&base));
        assert!(arrays.shares_core(&base));
        assert!(arrays.value_type().ptr_eq(&arrays));
    }
}

mod composition_contract {
    use super::*;

    #[test]
    fn merged_mixins_offer_both_capabilities() {
        let (event_loop, base) = setup();
        let both = base.extend(array_api().merge(object_api()), None);
        assert!(both.has_method("all"));
        assert!(both.has_method("get"));

        let source = both.lift(Value::from(vec![Value::from(1), Value::from(2)]));
        let length = source.get("length");
        let total = source.all();
        event_loop.run_until_done();

        assert_eq!(length.inspect(), PromiseState::Fulfilled(Value::from(2)));
        assert!(total.inspect().is_fulfilled());
        assert!(total.flavor().ptr_eq(&both));
    }

    #[test]
    fn elements_use_the_value_type() {
        let (event_loop, base) = setup();
        let objects = object_flavor(&base);
        let arrays = base.extend(array_api(), Some(&objects));
        assert!(arrays.value_type().ptr_eq(&objects));

        let point = promise_core::Object::from_entries([("x", Value::from(7))]);
        let mapped = arrays
            .lift(Value::from(vec![Value::from(point)]))
            .map(promise_core::Function::new(Ok));
        event_loop.run_until_done();

        let element = match mapped.inspect() {
            PromiseState::Fulfilled(Value::Array(array)) => array.get(0).unwrap(),
            other => panic!("unexpected state {:?}", other),
        };
        let element = element.as_promise().unwrap().clone();
        assert!(element.flavor().ptr_eq(&objects));

        let x = element.get("x");
        event_loop.run_until_done();
        assert_eq!(x.inspect(), PromiseState::Fulfilled(Value::from(7)));
    }

    #[test]
    fn extending_a_mixin_keeps_inherited_operations() {
        let (event_loop, base) = setup();
        let arrays = array_flavor(&base);
        let sized = arrays.extend(
            promise_core::Api::new().method("size", |this, _args| {
                Ok(this.and_then(|v| v.get_property("length")).into())
            }),
            None,
        );
        assert_eq!(sized.name(), "array+");

        let source = sized.lift(Value::from(vec![Value::from(3), Value::from(4)]));
        let size = source.send("size", &[]);
        let total = source.reduce(
            promise_core::Function::native("add", |_this, args| {
                let a = args[0].as_number().unwrap_or(0.0);
                let b = args[1].as_number().unwrap_or(0.0);
                Ok(Value::from(a + b))
            }),
            None,
        );
        event_loop.run_until_done();

        assert_eq!(size.inspect(), PromiseState::Fulfilled(Value::from(2)));
        assert_eq!(total.inspect(), PromiseState::Fulfilled(Value::from(7)));
    }
}
