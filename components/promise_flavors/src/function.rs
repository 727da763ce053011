//! Function-aware promises and function lifting.

use core_types::JsError;
use promise_core::{Api, Flavor, Function, Object, Promise, Value};

use crate::array::{all, slots};

/// Builds the function capability set.
pub fn function_api() -> Api {
    Api::named("function")
        .method("call", |this, args| {
            let this_arg = args.first().cloned().unwrap_or(Value::Undefined);
            let rest = args.get(1..).unwrap_or_default().to_vec();
            Ok(apply(this, this_arg, Value::from(rest)).into())
        })
        .method("apply", |this, args| {
            let this_arg = args.first().cloned().unwrap_or(Value::Undefined);
            let list = args.get(1).cloned().unwrap_or_else(|| Value::from(Vec::new()));
            Ok(apply(this, this_arg, list).into())
        })
        .method("bind", |this, args| {
            let this_arg = args.first().cloned().unwrap_or(Value::Undefined);
            let leading = args.get(1..).unwrap_or_default().to_vec();
            Ok(bind(this, this_arg, leading).into())
        })
}

/// Derives the function flavor from `base`.
pub fn function_flavor(base: &Flavor) -> Flavor {
    base.extend(function_api(), None)
}

fn callable(value: &Value) -> Result<Function, Value> {
    match value {
        Value::Function(function) => Ok(function.clone()),
        other => Err(JsError::type_error(format!("{} is not a function", other)).into()),
    }
}

/// Resolves the argument list (itself possibly promised, elements possibly
/// promised), then calls the eventual function.
fn apply(this: &Promise, this_arg: Value, list: Value) -> Promise {
    let flavor = this.flavor().clone();
    this.and_then(move |target| {
        let function = callable(&target)?;
        let this_arg = this_arg.clone();
        let arguments = all(&flavor.lift(list.clone()));
        Ok(arguments
            .and_then(move |values| {
                let values: Vec<Value> = slots(&values)
                    .into_iter()
                    .map(|slot| slot.unwrap_or(Value::Undefined))
                    .collect();
                function.call(&this_arg, &values)
            })
            .into())
    })
}

fn bind(this: &Promise, this_arg: Value, leading: Vec<Value>) -> Promise {
    this.and_then(move |target| Ok(callable(&target)?.bind(this_arg.clone(), leading.clone()).into()))
}

/// Typed access to the function capabilities of a promise.
pub trait FunctionPromise {
    /// Calls the eventual function with `this_arg` and `args`.
    fn call(&self, this_arg: Value, args: Vec<Value>) -> Promise;
    /// Calls the eventual function with an argument list that may itself be
    /// a promise or contain promises.
    fn apply(&self, this_arg: Value, args: Value) -> Promise;
    /// Fulfills with the eventual function bound to `this_arg` and `leading`.
    fn bind(&self, this_arg: Value, leading: Vec<Value>) -> Promise;
}

impl FunctionPromise for Promise {
    fn call(&self, this_arg: Value, args: Vec<Value>) -> Promise {
        let mut all = vec![this_arg];
        all.extend(args);
        self.send("call", &all)
    }

    fn apply(&self, this_arg: Value, args: Value) -> Promise {
        self.send("apply", &[this_arg, args])
    }

    fn bind(&self, this_arg: Value, leading: Vec<Value>) -> Promise {
        let mut all = vec![this_arg];
        all.extend(leading);
        self.send("bind", &all)
    }
}

/// Turns `f` into a function that accepts promised arguments and returns a
/// promise of `flavor` for its result.
///
/// # Examples
///
/// ```
/// use std::rc::Rc;
/// use promise_core::{make_core, CoreOptions, EventLoop, Function, PromiseState, Scheduler, Value};
/// use promise_flavors::lift_function;
///
/// let event_loop = EventLoop::with_virtual_clock();
/// let scheduler = Scheduler::with_host(event_loop.host_ticks()).unwrap();
/// let flavor = make_core(CoreOptions::new(Rc::new(scheduler)));
///
/// let shout = lift_function(&flavor, &Function::new(|s| Ok(Value::from(format!("{}!", s)))));
/// let (later, resolver) = flavor.defer();
/// let result = shout.call(&Value::Undefined, &[later.into()]).unwrap();
/// resolver.resolve("hey");
///
/// event_loop.run_until_done();
/// assert_eq!(
///     result.as_promise().unwrap().inspect(),
///     PromiseState::Fulfilled(Value::from("hey!"))
/// );
/// ```
pub fn lift_function(flavor: &Flavor, f: &Function) -> Function {
    let (flavor, f) = (flavor.clone(), f.clone());
    Function::native(f.name().to_string(), move |this, args| {
        let this = this.clone();
        let target = f.clone();
        let arguments = all(&flavor.lift(Value::from(args.to_vec())));
        Ok(arguments
            .and_then(move |values| {
                let values: Vec<Value> = slots(&values)
                    .into_iter()
                    .map(|slot| slot.unwrap_or(Value::Undefined))
                    .collect();
                target.call(&this, &values)
            })
            .into())
    })
}

/// Appends `Async` to a member name.
pub fn default_namer(key: &str) -> String {
    format!("{}Async", key)
}

/// Returns a copy of `api` in which every function member is also present,
/// lifted, under the key `namer(key)`.
///
/// With a namer returning the key unchanged, lifted functions replace the
/// originals. Reading a failing accessor propagates its error.
pub fn lift_all<N>(flavor: &Flavor, api: &Object, namer: N) -> Result<Object, Value>
where
    N: Fn(&str) -> String,
{
    let lifted = Object::new();
    for key in api.keys() {
        let member = api.get(&key)?;
        if !lifted.has(&key) {
            lifted.set(key.clone(), member.clone());
        }
        if let Value::Function(function) = &member {
            lifted.set(namer(&key), lift_function(flavor, function).into());
        }
    }
    Ok(lifted)
}
