//! The resolution core.
//!
//! A promise is either *deferred*, holding a queue of consumer messages until
//! it is resolved, or *terminal*, already fulfilled or rejected. Resolving a
//! deferred promise coerces the value into a promise, stores it and schedules
//! every queued message against it. Terminal promises answer messages
//! directly, so a chain of deferred promises always bottoms out in a terminal
//! one.
//!
//! `then` never runs a handler inline. It sends a message carrying the
//! handlers and the derived promise's resolver, and delivery always happens
//! in a scheduler task.

use std::cell::RefCell;
use std::fmt;
use std::panic::Location;
use std::rc::Rc;

use core_types::{JsError, StackFrame};
use tracing::debug;

use crate::flavor::Flavor;
use crate::monitor::{PromiseId, Status};
use crate::value::{Completion, Function, Object, Value};

/// A non-live snapshot of a promise's state.
#[derive(Debug, Clone, PartialEq)]
pub enum PromiseState {
    /// Not settled yet, or resolved with a promise that has not settled
    Pending,
    /// Fulfilled with a value
    Fulfilled(Value),
    /// Rejected with a reason
    Rejected(Value),
}

impl PromiseState {
    /// Returns true if the promise is pending.
    pub fn is_pending(&self) -> bool {
        matches!(self, PromiseState::Pending)
    }

    /// Returns true if the promise is fulfilled.
    pub fn is_fulfilled(&self) -> bool {
        matches!(self, PromiseState::Fulfilled(_))
    }

    /// Returns true if the promise is rejected.
    pub fn is_rejected(&self) -> bool {
        matches!(self, PromiseState::Rejected(_))
    }

    /// Converts the snapshot into a `{state, value}` or `{state, reason}`
    /// object.
    pub fn to_value(&self) -> Value {
        let object = Object::new();
        match self {
            PromiseState::Pending => object.set("state", Value::from("pending")),
            PromiseState::Fulfilled(value) => {
                object.set("state", Value::from("fulfilled"));
                object.set("value", value.clone());
            }
            PromiseState::Rejected(reason) => {
                object.set("state", Value::from("rejected"));
                object.set("reason", reason.clone());
            }
        }
        Value::Object(object)
    }
}

impl From<PromiseState> for Value {
    fn from(state: PromiseState) -> Self {
        state.to_value()
    }
}

pub(crate) enum Lineage<'a> {
    Root,
    Child(&'a Promise),
}

struct Deferred {
    // None once resolved
    consumers: Option<Vec<Rc<Message>>>,
    value: Option<Promise>,
    status: Option<Rc<Status>>,
}

enum Body {
    Deferred(RefCell<Deferred>),
    Fulfilled(Value),
    Rejected { reason: Value, at: StackFrame },
}

struct PromiseInner {
    id: PromiseId,
    flavor: Flavor,
    created_at: &'static Location<'static>,
    body: Body,
}

enum Sink {
    Derived(Resolver),
    Status(Rc<Status>),
}

struct Message {
    on_fulfilled: Option<Function>,
    on_rejected: Option<Function>,
    on_progress: Option<Function>,
    sink: Sink,
    site: &'static Location<'static>,
}

impl Message {
    fn fulfill(&self, value: Value) {
        match &self.sink {
            Sink::Status(status) => status.fulfilled(),
            Sink::Derived(resolver) => match &self.on_fulfilled {
                Some(handler) => self.settle_with(resolver, handler.call1(value)),
                None => resolver.settle(Promise::fulfilled(resolver.promise.flavor(), value)),
            },
        }
    }

    fn reject(&self, reason: Value, at: &StackFrame) {
        match &self.sink {
            Sink::Status(status) => status.rejected(reason, at.clone()),
            Sink::Derived(resolver) => match &self.on_rejected {
                Some(handler) => self.settle_with(resolver, handler.call1(reason)),
                None => resolver.settle(Promise::rejected(
                    resolver.promise.flavor(),
                    reason,
                    at.clone(),
                )),
            },
        }
    }

    fn progress(&self, update: Value) {
        if let Sink::Derived(resolver) = &self.sink {
            let update = match &self.on_progress {
                Some(handler) => handler.call1(update).unwrap_or_else(|error| error),
                None => update,
            };
            resolver.notify(update);
        }
    }

    fn settle_with(&self, resolver: &Resolver, completion: Completion) {
        match completion {
            Ok(value) => resolver.resolve(value),
            Err(reason) => {
                resolver.reject_at(reason, StackFrame::from_location("then", self.site))
            }
        }
    }
}

/// A promise: an identity whose eventual resolution is delivered to
/// continuations registered with [`Promise::then`].
///
/// Handles are cheap to clone and compare by identity.
#[derive(Clone)]
pub struct Promise {
    inner: Rc<PromiseInner>,
}

impl Promise {
    fn with_body(flavor: &Flavor, created_at: &'static Location<'static>, body: Body) -> Self {
        Self {
            inner: Rc::new(PromiseInner {
                id: PromiseId::next(),
                flavor: flavor.clone(),
                created_at,
                body,
            }),
        }
    }

    #[track_caller]
    pub(crate) fn fulfilled(flavor: &Flavor, value: Value) -> Self {
        Self::with_body(flavor, Location::caller(), Body::Fulfilled(value))
    }

    #[track_caller]
    pub(crate) fn rejected(flavor: &Flavor, reason: Value, at: StackFrame) -> Self {
        Self::with_body(flavor, Location::caller(), Body::Rejected { reason, at })
    }

    pub(crate) fn pending(
        flavor: &Flavor,
        lineage: Lineage<'_>,
        created_at: &'static Location<'static>,
        operation: &str,
    ) -> (Self, Resolver) {
        let id = PromiseId::next();
        let frame = || StackFrame::from_location(operation, created_at);
        let status = match lineage {
            Lineage::Root => flavor.core().track(id, None, frame()),
            Lineage::Child(parent) => {
                let parent_status = parent.status();
                let status = flavor.core().track(
                    id,
                    parent_status.as_ref().map(|status| status.id()),
                    frame(),
                );
                // The child is registered before the parent stops being a leaf.
                if let Some(parent_status) = &parent_status {
                    parent_status.observe();
                }
                status
            }
        };
        let promise = Self {
            inner: Rc::new(PromiseInner {
                id,
                flavor: flavor.clone(),
                created_at,
                body: Body::Deferred(RefCell::new(Deferred {
                    consumers: Some(Vec::new()),
                    value: None,
                    status,
                })),
            }),
        };
        let resolver = Resolver {
            promise: promise.clone(),
        };
        (promise, resolver)
    }

    pub(crate) fn coerce(
        flavor: &Flavor,
        value: Value,
        site: &'static Location<'static>,
    ) -> Self {
        match &value {
            Value::Promise(promise) if promise.flavor().shares_core(flavor) => promise.clone(),
            Value::Promise(_) => Self::assimilate(flavor, value, site),
            Value::Object(object) if object.has("then") => Self::assimilate(flavor, value, site),
            _ => Self::with_body(flavor, site, Body::Fulfilled(value)),
        }
    }

    /// Like [`Promise::coerce`], but a promise of another flavor on the same
    /// core is adopted by a new promise of `flavor`.
    pub(crate) fn lift(flavor: &Flavor, value: Value, site: &'static Location<'static>) -> Self {
        match &value {
            Value::Promise(promise) if promise.flavor().ptr_eq(flavor) => promise.clone(),
            Value::Promise(promise) if promise.flavor().shares_core(flavor) => {
                let (lifted, resolver) = Self::pending(flavor, Lineage::Child(promise), site, "lift");
                resolver.settle(promise.clone());
                lifted
            }
            _ => Self::coerce(flavor, value, site),
        }
    }

    /// Adopts the outcome of a foreign thenable. `then` is read and invoked
    /// exactly once, in a scheduled task.
    fn assimilate(flavor: &Flavor, thenable: Value, site: &'static Location<'static>) -> Self {
        let (promise, resolver) = Self::pending(flavor, Lineage::Root, site, "assimilate");
        let target = flavor.clone();
        flavor.core().schedule(move || {
            let fail = |reason: Value| {
                debug!(%reason, "thenable assimilation failed");
                resolver.reject_at(reason, StackFrame::from_location("assimilate", site));
            };
            if let Value::Promise(foreign) = &thenable {
                foreign.then(
                    Some(resolver.resolve_fn()),
                    Some(resolver.reject_fn()),
                    Some(resolver.notify_fn()),
                );
                return;
            }
            let callbacks = [
                Value::Function(resolver.resolve_fn()),
                Value::Function(resolver.reject_fn()),
                Value::Function(resolver.notify_fn()),
            ];
            match thenable.get_property("then") {
                Err(reason) => fail(reason),
                Ok(Value::Function(then)) => {
                    if let Err(reason) = then.call(&thenable, &callbacks) {
                        fail(reason);
                    }
                }
                Ok(_) => resolver.settle(Promise::fulfilled(&target, thenable.clone())),
            }
        });
        promise
    }

    fn status(&self) -> Option<Rc<Status>> {
        match &self.inner.body {
            Body::Deferred(deferred) => deferred.borrow().status.clone(),
            _ => None,
        }
    }

    /// Follows resolution links to the promise that answers for this one: a
    /// terminal promise or a deferred one that is still pending. Every link
    /// walked is repointed at that end.
    fn forwarded(&self) -> Promise {
        let mut walked = Vec::new();
        let mut current = self.clone();
        loop {
            let next = match &current.inner.body {
                Body::Deferred(cell) => cell.borrow().value.clone(),
                _ => None,
            };
            match next {
                Some(next) => walked.push(std::mem::replace(&mut current, next)),
                None => break,
            }
        }
        if walked.len() > 1 {
            for link in &walked {
                if let Body::Deferred(cell) = &link.inner.body {
                    cell.borrow_mut().value = Some(current.clone());
                }
            }
        }
        current
    }

    /// Delivers `message` now. Runs inside scheduler tasks only.
    fn dispatch(&self, message: Rc<Message>) {
        let end = self.forwarded();
        match &end.inner.body {
            Body::Deferred(cell) => {
                if let Some(consumers) = cell.borrow_mut().consumers.as_mut() {
                    consumers.push(message);
                }
            }
            Body::Fulfilled(value) => message.fulfill(value.clone()),
            Body::Rejected { reason, at } => message.reject(reason.clone(), at),
        }
    }

    /// Queues `message` while pending; otherwise schedules its delivery.
    fn send_message(&self, message: Rc<Message>) {
        if let Body::Deferred(cell) = &self.inner.body {
            if let Some(consumers) = cell.borrow_mut().consumers.as_mut() {
                consumers.push(message);
                return;
            }
        }
        let promise = self.clone();
        self.flavor()
            .core()
            .schedule(move || promise.dispatch(message));
    }

    /// Returns the promise identity.
    pub fn id(&self) -> PromiseId {
        self.inner.id
    }

    /// Returns the flavor this promise was created with.
    pub fn flavor(&self) -> &Flavor {
        &self.inner.flavor
    }

    /// Returns the flavor element promises should use.
    pub fn value_type(&self) -> Flavor {
        self.inner.flavor.value_type()
    }

    /// Returns the call site that created the promise.
    pub fn created_at(&self) -> StackFrame {
        StackFrame::from_location("promise", self.inner.created_at)
    }

    /// Registers continuations and returns the derived promise, of the same
    /// flavor.
    ///
    /// A missing fulfillment or rejection handler passes the outcome through.
    /// A handler's `Ok` resolves the derived promise, its `Err` rejects it. A
    /// progress handler may transform the update; if it fails, its error value
    /// becomes the update.
    #[track_caller]
    pub fn then(
        &self,
        on_fulfilled: Option<Function>,
        on_rejected: Option<Function>,
        on_progress: Option<Function>,
    ) -> Promise {
        let site = Location::caller();
        let (derived, resolver) = Self::pending(self.flavor(), Lineage::Child(self), site, "then");
        self.send_message(Rc::new(Message {
            on_fulfilled,
            on_rejected,
            on_progress,
            sink: Sink::Derived(resolver),
            site,
        }));
        derived
    }

    /// Continues with `f` on fulfillment.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::rc::Rc;
    /// use promise_core::{make_core, CoreOptions, EventLoop, PromiseState, Scheduler, Value};
    ///
    /// let event_loop = EventLoop::with_virtual_clock();
    /// let scheduler = Scheduler::with_host(event_loop.host_ticks()).unwrap();
    /// let flavor = make_core(CoreOptions::new(Rc::new(scheduler)));
    ///
    /// let next = flavor.lift(Value::from(1)).and_then(|v| {
    ///     Ok(Value::from(v.as_number().unwrap_or(0.0) + 1.0))
    /// });
    /// assert!(next.inspect().is_pending());
    ///
    /// event_loop.run_until_done();
    /// assert_eq!(next.inspect(), PromiseState::Fulfilled(Value::from(2)));
    /// ```
    #[track_caller]
    pub fn and_then<F>(&self, f: F) -> Promise
    where
        F: Fn(Value) -> Completion + 'static,
    {
        self.then(Some(Function::new(f)), None, None)
    }

    /// Continues with `f` on rejection.
    #[track_caller]
    pub fn otherwise<F>(&self, f: F) -> Promise
    where
        F: Fn(Value) -> Completion + 'static,
    {
        self.then(None, Some(Function::new(f)), None)
    }

    /// Runs `f` on either outcome, then passes the outcome through. An `Err`
    /// from `f` replaces it.
    #[track_caller]
    pub fn always<F>(&self, f: F) -> Promise
    where
        F: Fn() -> Result<(), Value> + 'static,
    {
        let f = Rc::new(f);
        let on_rejected = f.clone();
        self.then(
            Some(Function::new(move |value| {
                f()?;
                Ok(value)
            })),
            Some(Function::new(move |reason| {
                on_rejected()?;
                Err(reason)
            })),
            None,
        )
    }

    /// Replaces the fulfillment value with `value`.
    #[track_caller]
    pub fn with_value(&self, value: impl Into<Value>) -> Promise {
        let value = value.into();
        self.then(Some(Function::new(move |_| Ok(value.clone()))), None, None)
    }

    /// Observes progress updates, forwarding what `f` returns.
    #[track_caller]
    pub fn on_progress<F>(&self, f: F) -> Promise
    where
        F: Fn(Value) -> Completion + 'static,
    {
        self.then(None, None, Some(Function::new(f)))
    }

    /// Returns a snapshot of the state, following resolution to the end of
    /// the chain.
    pub fn inspect(&self) -> PromiseState {
        match &self.forwarded().inner.body {
            Body::Fulfilled(value) => PromiseState::Fulfilled(value.clone()),
            Body::Rejected { reason, .. } => PromiseState::Rejected(reason.clone()),
            Body::Deferred(_) => PromiseState::Pending,
        }
    }

    /// Invokes the capability `name` of this promise's flavor.
    ///
    /// An unknown capability or a failing one yields a rejected promise; a
    /// non-promise result is lifted.
    #[track_caller]
    pub fn send(&self, name: &str, args: &[Value]) -> Promise {
        let flavor = self.flavor();
        let Some(method) = flavor.method(name) else {
            return flavor.reject(JsError::type_error(format!(
                "{} promise has no method '{}'",
                flavor.name(),
                name
            )));
        };
        match method.call(&Value::Promise(self.clone()), args) {
            Ok(Value::Promise(promise)) => promise,
            Ok(value) => flavor.lift(value),
            Err(reason) => flavor.reject(reason),
        }
    }

    /// Returns true if both handles refer to the same promise.
    pub fn ptr_eq(&self, other: &Promise) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Promise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("id", &self.id())
            .field("flavor", &self.flavor().name())
            .field("state", &self.inspect())
            .finish()
    }
}

// Long resolution chains are released link by link.
impl Drop for PromiseInner {
    fn drop(&mut self) {
        let Body::Deferred(cell) = &mut self.body else {
            return;
        };
        let mut next = cell.get_mut().value.take();
        while let Some(promise) = next {
            next = match Rc::try_unwrap(promise.inner) {
                Ok(mut inner) => match &mut inner.body {
                    Body::Deferred(cell) => cell.get_mut().value.take(),
                    _ => None,
                },
                Err(_) => None,
            };
        }
    }
}

/// The resolution capability of a deferred promise.
///
/// Only the first `resolve` or `reject` has an effect.
#[derive(Clone)]
pub struct Resolver {
    promise: Promise,
}

impl Resolver {
    /// Returns the promise this resolver settles.
    pub fn promise(&self) -> &Promise {
        &self.promise
    }

    /// Returns true once the promise has been resolved, even if the value it
    /// was resolved with is still pending.
    pub fn is_resolved(&self) -> bool {
        match &self.promise.inner.body {
            Body::Deferred(cell) => cell.borrow().consumers.is_none(),
            _ => true,
        }
    }

    /// Resolves with `value`, assimilating promises and thenables.
    #[track_caller]
    pub fn resolve(&self, value: impl Into<Value>) {
        if self.is_resolved() {
            return;
        }
        let target = Promise::coerce(self.promise.flavor(), value.into(), Location::caller());
        self.settle(target);
    }

    /// Rejects with `reason`, recording the caller as the rejection site.
    #[track_caller]
    pub fn reject(&self, reason: impl Into<Value>) {
        self.reject_at(reason.into(), StackFrame::capture("reject"));
    }

    /// Rejects with `reason`, recording `at` as the rejection site.
    pub fn reject_at(&self, reason: Value, at: StackFrame) {
        if self.is_resolved() {
            return;
        }
        self.settle(Promise::rejected(self.promise.flavor(), reason, at));
    }

    /// Sends a progress update to every consumer registered right now.
    /// Ignored once resolved.
    pub fn notify(&self, update: impl Into<Value>) {
        let Body::Deferred(cell) = &self.promise.inner.body else {
            return;
        };
        let consumers = match cell.borrow().consumers.as_ref() {
            Some(consumers) => consumers.clone(),
            None => return,
        };
        let update = update.into();
        for message in consumers {
            let update = update.clone();
            self.promise
                .flavor()
                .core()
                .schedule(move || message.progress(update));
        }
    }

    pub(crate) fn settle(&self, target: Promise) {
        let Body::Deferred(cell) = &self.promise.inner.body else {
            return;
        };
        if self.is_resolved() {
            return;
        }
        let end = target.forwarded();
        // Resolving with itself, directly or through a cycle of links.
        let target = if end.ptr_eq(&self.promise) {
            debug!(id = %self.promise.id(), "promise resolved with itself");
            Promise::rejected(
                self.promise.flavor(),
                JsError::type_error("a promise cannot be resolved with itself").into(),
                self.promise.created_at(),
            )
        } else {
            // The resolved promise now answers for the target's rejection.
            if let Some(target_status) = target.status() {
                target_status.observe();
            }
            end
        };
        let (consumers, status) = {
            let mut deferred = cell.borrow_mut();
            let Some(consumers) = deferred.consumers.take() else {
                return;
            };
            deferred.value = Some(target.clone());
            (consumers, deferred.status.clone())
        };
        let core = self.promise.flavor().core();
        for message in consumers {
            let target = target.clone();
            core.schedule(move || target.dispatch(message));
        }
        if let Some(status) = status {
            target.dispatch(Rc::new(Message {
                on_fulfilled: None,
                on_rejected: None,
                on_progress: None,
                sink: Sink::Status(status),
                site: self.promise.inner.created_at,
            }));
        }
    }

    /// Returns `resolve` as a callable.
    pub fn resolve_fn(&self) -> Function {
        let resolver = self.clone();
        Function::native("resolve", move |_this, args| {
            resolver.resolve(args.first().cloned().unwrap_or(Value::Undefined));
            Ok(Value::Undefined)
        })
    }

    /// Returns `reject` as a callable.
    pub fn reject_fn(&self) -> Function {
        let resolver = self.clone();
        Function::native("reject", move |_this, args| {
            resolver.reject(args.first().cloned().unwrap_or(Value::Undefined));
            Ok(Value::Undefined)
        })
    }

    /// Returns `notify` as a callable.
    pub fn notify_fn(&self) -> Function {
        let resolver = self.clone();
        Function::native("notify", move |_this, args| {
            resolver.notify(args.first().cloned().unwrap_or(Value::Undefined));
            Ok(Value::Undefined)
        })
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("promise", &self.promise.id())
            .field("resolved", &self.is_resolved())
            .finish()
    }
}
