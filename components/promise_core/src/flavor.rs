//! Flavors: capability bundles sharing one engine core.
//!
//! [`make_core`] builds the root flavor around a scheduler and an optional
//! monitor. [`Flavor::extend`] derives a new flavor whose method set is the
//! parent's plus the function members of an [`Api`]. Every flavor derived
//! from one root shares its core, so their promises interoperate without
//! assimilation.

use std::collections::BTreeMap;
use std::fmt;
use std::panic::Location;
use std::rc::Rc;

use core_types::{JsError, StackFrame};

use crate::monitor::{PromiseId, PromiseMonitor, Status};
use crate::promise::{Lineage, Promise, PromiseState, Resolver};
use crate::scheduler::Schedule;
use crate::task_queue::Task;
use crate::value::{Completion, Function, Value};

pub(crate) struct Core {
    scheduler: Rc<dyn Schedule>,
    monitor: Option<Rc<dyn PromiseMonitor>>,
}

impl Core {
    pub(crate) fn schedule<F>(&self, f: F)
    where
        F: FnOnce() + 'static,
    {
        self.scheduler.enqueue(Task::new(f));
    }

    pub(crate) fn track(
        &self,
        id: PromiseId,
        parent: Option<PromiseId>,
        created_at: StackFrame,
    ) -> Option<Rc<Status>> {
        self.monitor.as_ref().map(|monitor| {
            Status::new(id, parent, created_at, monitor.clone(), self.scheduler.clone())
        })
    }
}

/// Construction options for a root flavor.
///
/// # Examples
///
/// ```
/// use std::rc::Rc;
/// use promise_core::{make_core, CoreOptions, Task};
///
/// let flavor = make_core(CoreOptions::new(Rc::new(|task: Task| task.run())));
/// assert_eq!(flavor.name(), "core");
/// ```
pub struct CoreOptions {
    scheduler: Rc<dyn Schedule>,
    monitor: Option<Rc<dyn PromiseMonitor>>,
}

impl CoreOptions {
    /// Creates options around the scheduler every continuation runs on.
    pub fn new(scheduler: Rc<dyn Schedule>) -> Self {
        Self {
            scheduler,
            monitor: None,
        }
    }

    /// Attaches monitor hooks.
    pub fn with_monitor(mut self, monitor: Rc<dyn PromiseMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }
}

/// Builds the root flavor of a new engine core.
pub fn make_core(options: CoreOptions) -> Flavor {
    Flavor {
        inner: Rc::new(FlavorInner {
            core: Rc::new(Core {
                scheduler: options.scheduler,
                monitor: options.monitor,
            }),
            name: "core".to_string(),
            parent: None,
            methods: BTreeMap::new(),
            value_type: None,
        }),
    }
}

struct FlavorInner {
    core: Rc<Core>,
    name: String,
    parent: Option<Flavor>,
    methods: BTreeMap<String, Function>,
    value_type: Option<Flavor>,
}

/// A named capability bundle over one engine core.
///
/// # Examples
///
/// ```
/// use std::rc::Rc;
/// use promise_core::{make_core, Api, CoreOptions, EventLoop, PromiseState, Scheduler, Value};
///
/// let event_loop = EventLoop::with_virtual_clock();
/// let scheduler = Scheduler::with_host(event_loop.host_ticks()).unwrap();
/// let core = make_core(CoreOptions::new(Rc::new(scheduler)));
///
/// let doubling = core.extend(
///     Api::named("doubling").method("double", |promise, _args| {
///         Ok(promise
///             .and_then(|v| Ok(Value::from(v.as_number().unwrap_or(0.0) * 2.0)))
///             .into())
///     }),
///     None,
/// );
///
/// let doubled = doubling.lift(Value::from(21)).send("double", &[]);
/// event_loop.run_until_done();
///
/// assert_eq!(doubled.inspect(), PromiseState::Fulfilled(Value::from(42)));
/// assert!(doubled.flavor().ptr_eq(&doubling));
/// ```
#[derive(Clone)]
pub struct Flavor {
    inner: Rc<FlavorInner>,
}

impl Flavor {
    pub(crate) fn core(&self) -> &Core {
        &self.inner.core
    }

    /// Returns the flavor name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns the flavor this one was derived from.
    pub fn parent(&self) -> Option<&Flavor> {
        self.inner.parent.as_ref()
    }

    /// Returns the flavor used for element promises. Defaults to `self`.
    pub fn value_type(&self) -> Flavor {
        self.inner.value_type.clone().unwrap_or_else(|| self.clone())
    }

    /// Wraps a value in a promise of this flavor.
    ///
    /// A promise of this flavor is returned unchanged. A promise of another
    /// flavor on the same core is adopted by a new promise of this flavor;
    /// foreign promises and thenables are assimilated.
    #[track_caller]
    pub fn lift(&self, value: impl Into<Value>) -> Promise {
        Promise::lift(self, value.into(), Location::caller())
    }

    /// Coerces a value into a promise of this core. Any promise of the same
    /// core is returned unchanged, whatever its flavor.
    #[track_caller]
    pub fn coerce(&self, value: Value) -> Promise {
        Promise::coerce(self, value, Location::caller())
    }

    /// Creates a tracked promise rejected with `reason`.
    #[track_caller]
    pub fn reject(&self, reason: impl Into<Value>) -> Promise {
        let site = Location::caller();
        let (promise, resolver) = Promise::pending(self, Lineage::Root, site, "reject");
        resolver.reject_at(reason.into(), StackFrame::from_location("reject", site));
        promise
    }

    /// Creates a tracked promise and runs `resolver` with its resolution
    /// capability. An `Err` from `resolver` rejects the promise.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::rc::Rc;
    /// use promise_core::{make_core, CoreOptions, PromiseState, Task, Value};
    ///
    /// let flavor = make_core(CoreOptions::new(Rc::new(|task: Task| task.run())));
    /// let failed = flavor.promise(|_resolver| Err(Value::from("no")));
    /// assert_eq!(failed.inspect(), PromiseState::Rejected(Value::from("no")));
    /// ```
    #[track_caller]
    pub fn promise<F>(&self, resolver: F) -> Promise
    where
        F: FnOnce(&Resolver) -> Result<(), Value>,
    {
        let site = Location::caller();
        let (promise, handle) = Promise::pending(self, Lineage::Root, site, "promise");
        if let Err(reason) = resolver(&handle) {
            handle.reject_at(reason, StackFrame::from_location("promise", site));
        }
        promise
    }

    /// Creates a tracked pending promise and hands back its resolver.
    #[track_caller]
    pub fn defer(&self) -> (Promise, Resolver) {
        Promise::pending(self, Lineage::Root, Location::caller(), "defer")
    }

    /// Derives a flavor with the function members of `api` added.
    ///
    /// Non-function members are ignored. `value_type` defaults to the derived
    /// flavor itself. The parent is not modified.
    pub fn extend(&self, api: Api, value_type: Option<&Flavor>) -> Flavor {
        let methods = api
            .members
            .into_iter()
            .filter_map(|(key, value)| match value {
                Value::Function(function) => Some((key, function)),
                _ => None,
            })
            .collect();
        Flavor {
            inner: Rc::new(FlavorInner {
                core: self.inner.core.clone(),
                name: api.name.unwrap_or_else(|| format!("{}+", self.name())),
                parent: Some(self.clone()),
                methods,
                value_type: value_type.cloned(),
            }),
        }
    }

    /// Looks a capability up along the derivation chain.
    pub fn method(&self, name: &str) -> Option<Function> {
        let mut flavor = Some(self);
        while let Some(current) = flavor {
            if let Some(method) = current.inner.methods.get(name) {
                return Some(method.clone());
            }
            flavor = current.parent();
        }
        None
    }

    /// Returns true if the capability is available on this flavor.
    pub fn has_method(&self, name: &str) -> bool {
        self.method(name).is_some()
    }

    /// Returns true if `ancestor` is this flavor or one it derives from.
    pub fn is_derived_from(&self, ancestor: &Flavor) -> bool {
        let mut flavor = Some(self);
        while let Some(current) = flavor {
            if current.ptr_eq(ancestor) {
                return true;
            }
            flavor = current.parent();
        }
        false
    }

    /// Returns true if both flavors run on the same engine core.
    pub fn shares_core(&self, other: &Flavor) -> bool {
        Rc::ptr_eq(&self.inner.core, &other.inner.core)
    }

    /// Returns true if both handles refer to the same flavor.
    pub fn ptr_eq(&self, other: &Flavor) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Snapshot of a pending promise.
    pub fn to_pending_state(&self) -> PromiseState {
        PromiseState::Pending
    }

    /// Snapshot of a promise fulfilled with `value`.
    pub fn to_fulfilled_state(&self, value: Value) -> PromiseState {
        PromiseState::Fulfilled(value)
    }

    /// Snapshot of a promise rejected with `reason`.
    pub fn to_rejected_state(&self, reason: Value) -> PromiseState {
        PromiseState::Rejected(reason)
    }
}

impl fmt::Debug for Flavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut methods = Vec::new();
        let mut flavor = Some(self);
        while let Some(current) = flavor {
            methods.extend(current.inner.methods.keys().cloned());
            flavor = current.parent();
        }
        f.debug_struct("Flavor")
            .field("name", &self.name())
            .field("methods", &methods)
            .finish()
    }
}

/// Members to extend a flavor with.
#[derive(Default)]
pub struct Api {
    name: Option<String>,
    members: Vec<(String, Value)>,
}

impl Api {
    /// Creates an anonymous, empty API.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty API whose derived flavor is called `name`.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            members: Vec::new(),
        }
    }

    /// Adds a raw member. Only function members become capabilities.
    pub fn member(mut self, key: impl Into<String>, value: Value) -> Self {
        self.members.push((key.into(), value));
        self
    }

    /// Adds a capability invoked with the receiving promise as `this`.
    pub fn method<F>(self, key: &str, method: F) -> Self
    where
        F: Fn(&Promise, &[Value]) -> Completion + 'static,
    {
        let name = key.to_string();
        let function = Function::native(key, move |this, args| match this {
            Value::Promise(promise) => method(promise, args),
            other => Err(JsError::type_error(format!(
                "{} called on non-promise {}",
                name, other
            ))
            .into()),
        });
        self.member(key, Value::Function(function))
    }

    /// Appends the members of `other`; later members win on lookup.
    pub fn merge(mut self, other: Api) -> Self {
        if self.name.is_none() {
            self.name = other.name;
        }
        for (key, value) in other.members {
            self.members.retain(|(existing, _)| *existing != key);
            self.members.push((key, value));
        }
        self
    }

    /// Returns the member names.
    pub fn keys(&self) -> Vec<&str> {
        self.members.iter().map(|(key, _)| key.as_str()).collect()
    }
}
