//! Unit tests for monitor hooks

use std::cell::RefCell;
use std::rc::Rc;

use core_types::StackFrame;
use promise_core::{Api, Function, Object, PromiseId, PromiseMonitor, PromiseState, Value};

use super::setup_monitored;

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Pending(PromiseId, Option<PromiseId>),
    Observed(PromiseId),
    Fulfilled(PromiseId),
    Unhandled(PromiseId, Value),
}

#[derive(Default)]
struct Recorder {
    events: RefCell<Vec<Event>>,
}

impl Recorder {
    fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    fn unhandled(&self) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| matches!(e, Event::Unhandled(..)))
            .collect()
    }
}

impl PromiseMonitor for Recorder {
    fn promise_pending(&self, id: PromiseId, parent: Option<PromiseId>, _: StackFrame) {
        self.events.borrow_mut().push(Event::Pending(id, parent));
    }
    fn promise_observed(&self, id: PromiseId) {
        self.events.borrow_mut().push(Event::Observed(id));
    }
    fn promise_fulfilled(&self, id: PromiseId) {
        self.events.borrow_mut().push(Event::Fulfilled(id));
    }
    fn unhandled_rejection(&self, id: PromiseId, reason: &Value, _: StackFrame) {
        self.events
            .borrow_mut()
            .push(Event::Unhandled(id, reason.clone()));
    }
}

#[test]
fn unobserved_rejection_is_reported_once() {
    let recorder = Rc::new(Recorder::default());
    let (event_loop, flavor) = setup_monitored(recorder.clone());

    let rejected = flavor.reject("lost");
    event_loop.run_until_done();

    assert_eq!(
        recorder.unhandled(),
        vec![Event::Unhandled(rejected.id(), Value::from("lost"))]
    );
}

#[test]
fn late_handler_triggers_observed_but_does_not_retract() {
    let recorder = Rc::new(Recorder::default());
    let (event_loop, flavor) = setup_monitored(recorder.clone());

    let rejected = flavor.reject("late");
    event_loop.run_until_done();
    let handled = rejected.otherwise(|_| Ok(Value::Null));
    event_loop.run_until_done();

    let events = recorder.events();
    assert_eq!(recorder.unhandled().len(), 1);
    assert!(events.contains(&Event::Observed(rejected.id())));
    assert!(events.contains(&Event::Fulfilled(handled.id())));
}

#[test]
fn rejection_handled_in_same_turn_is_not_reported() {
    let recorder = Rc::new(Recorder::default());
    let (event_loop, flavor) = setup_monitored(recorder.clone());

    flavor.reject("caught").otherwise(|_| Ok(Value::Null));
    event_loop.run_until_done();

    assert!(recorder.unhandled().is_empty());
}

#[test]
fn derivations_link_to_parent() {
    let recorder = Rc::new(Recorder::default());
    let (event_loop, flavor) = setup_monitored(recorder.clone());

    let (root, resolver) = flavor.defer();
    let child = root.and_then(Ok);
    resolver.resolve(1);
    event_loop.run_until_done();

    let events = recorder.events();
    assert_eq!(events[0], Event::Pending(root.id(), None));
    assert_eq!(events[1], Event::Pending(child.id(), Some(root.id())));
    assert_eq!(events[2], Event::Observed(root.id()));
    assert!(events.contains(&Event::Fulfilled(root.id())));
    assert!(events.contains(&Event::Fulfilled(child.id())));
}

#[test]
fn rejection_propagates_to_the_unobserved_leaf() {
    let recorder = Rc::new(Recorder::default());
    let (event_loop, flavor) = setup_monitored(recorder.clone());

    let root = flavor.reject("deep");
    let leaf = root.and_then(Ok).and_then(Ok);
    event_loop.run_until_done();

    assert_eq!(
        recorder.unhandled(),
        vec![Event::Unhandled(leaf.id(), Value::from("deep"))]
    );
}

#[test]
fn lifted_values_are_untracked() {
    let recorder = Rc::new(Recorder::default());
    let (event_loop, flavor) = setup_monitored(recorder.clone());

    flavor.lift(1);
    event_loop.run_until_done();

    assert!(recorder.events().is_empty());
}

#[test]
fn lifted_thenable_rejection_is_reported() {
    let recorder = Rc::new(Recorder::default());
    let (event_loop, flavor) = setup_monitored(recorder.clone());
    let thenable = Object::new();
    thenable.set(
        "then",
        Function::native("then", |_this, args| {
            args[1].call(&Value::Undefined, &[Value::from("remote failure")])
        })
        .into(),
    );

    let lifted = flavor.lift(thenable);
    event_loop.run_until_done();

    assert_eq!(lifted.inspect(), PromiseState::Rejected(Value::from("remote failure")));
    assert_eq!(
        recorder.unhandled(),
        vec![Event::Unhandled(lifted.id(), Value::from("remote failure"))]
    );
}

#[test]
fn lifting_into_another_flavor_links_to_the_original() {
    let recorder = Rc::new(Recorder::default());
    let (event_loop, flavor) = setup_monitored(recorder.clone());
    let derived = flavor.extend(Api::named("derived"), None);
    let (original, _resolver) = flavor.defer();

    let lifted = derived.lift(original.clone());
    event_loop.run_until_done();

    assert_eq!(
        recorder.events(),
        vec![
            Event::Pending(original.id(), None),
            Event::Pending(lifted.id(), Some(original.id())),
            Event::Observed(original.id()),
        ]
    );
}
