//! Iterator-aware promises.
//!
//! An iterator is any value with a `next` method returning `{done, value}`.
//! Both the step and its `value` may be promises. `map`, `filter`, `take*`
//! and `drop*` wrap the iterator lazily; only `reduce` and `for_each` pull.
//!
//! A `take*` wrapper is permanently exhausted once it has reported done; a
//! further `next()` yields a rejected promise.

use std::cell::Cell;
use std::rc::Rc;

use core_types::JsError;
use promise_core::{Api, Completion, Flavor, Function, Object, Promise, Value};
use tracing::debug;

use crate::{count_arg, function_arg};

/// Builds a `{done, value}` step.
pub fn iter_result(done: bool, value: Value) -> Value {
    Value::Object(Object::from_entries([
        ("done", Value::from(done)),
        ("value", value),
    ]))
}

/// Builds an iterator whose `next` calls `next`.
///
/// # Examples
///
/// ```
/// use std::cell::Cell;
/// use promise_flavors::{iter_result, iterator_from_fn};
/// use promise_core::Value;
///
/// let count = Cell::new(0);
/// let counter = iterator_from_fn(move || {
///     count.set(count.get() + 1);
///     Ok(iter_result(false, Value::from(count.get())))
/// });
///
/// let next = counter.get_property("next").unwrap();
/// let step = next.call(&counter, &[]).unwrap();
/// assert_eq!(step.get_property("value").unwrap(), Value::from(1));
/// ```
pub fn iterator_from_fn<F>(next: F) -> Value
where
    F: Fn() -> Completion + 'static,
{
    let iterator = Object::new();
    iterator.set(
        "next",
        Function::native("next", move |_this, _args| next()).into(),
    );
    Value::Object(iterator)
}

fn pull(iterator: &Value) -> Completion {
    iterator.get_property("next")?.call(iterator, &[])
}

fn is_done(step: &Value) -> Result<bool, Value> {
    Ok(step.get_property("done")?.is_truthy())
}

/// Builds the iterator capability set.
pub fn iterator_api() -> Api {
    Api::named("iterator")
        .method("map", |this, args| Ok(map(this, function_arg(args, 0, "map")?).into()))
        .method("filter", |this, args| {
            Ok(filter(this, function_arg(args, 0, "filter")?).into())
        })
        .method("take", |this, args| Ok(take(this, count_arg(args, 0)).into()))
        .method("take_while", |this, args| {
            let predicate = function_arg(args, 0, "take_while")?;
            Ok(take_while(this, predicate, false).into())
        })
        .method("take_until", |this, args| {
            let predicate = function_arg(args, 0, "take_until")?;
            Ok(take_while(this, predicate, true).into())
        })
        .method("drop", |this, args| Ok(drop(this, count_arg(args, 0)).into()))
        .method("drop_while", |this, args| {
            let predicate = function_arg(args, 0, "drop_while")?;
            Ok(drop_while(this, predicate, false).into())
        })
        .method("drop_until", |this, args| {
            let predicate = function_arg(args, 0, "drop_until")?;
            Ok(drop_while(this, predicate, true).into())
        })
        .method("reduce", |this, args| {
            let reducer = function_arg(args, 0, "reduce")?;
            let initial = args.get(1).cloned().unwrap_or(Value::Undefined);
            Ok(reduce(this, reducer, initial).into())
        })
        .method("for_each", |this, args| {
            Ok(for_each(this, function_arg(args, 0, "for_each")?).into())
        })
}

/// Derives the iterator flavor from `base`.
pub fn iterator_flavor(base: &Flavor) -> Flavor {
    base.extend(iterator_api(), None)
}

/// Replaces the eventual iterator with `wrapper(value_type, iterator)`.
fn wrap<W>(this: &Promise, wrapper: W) -> Promise
where
    W: Fn(Flavor, Value) -> Value + 'static,
{
    let value_type = this.value_type();
    this.and_then(move |source| Ok(wrapper(value_type.clone(), source)))
}

fn map(this: &Promise, mapper: Function) -> Promise {
    wrap(this, move |value_type, source| {
        let mapper = mapper.clone();
        iterator_from_fn(move || {
            let (element_type, mapper) = (value_type.clone(), mapper.clone());
            let step = value_type.lift(pull(&source)?);
            Ok(step
                .and_then(move |step| {
                    if is_done(&step)? {
                        return Ok(step);
                    }
                    let value = element_type
                        .lift(step.get_property("value")?)
                        .then(Some(mapper.clone()), None, None);
                    Ok(iter_result(false, value.into()))
                })
                .into())
        })
    })
}

fn filter_next(value_type: Flavor, source: Value, condition: Function) -> Completion {
    let step = value_type.lift(pull(&source)?);
    Ok(step
        .and_then(move |step| {
            if is_done(&step)? {
                return Ok(step);
            }
            let value = value_type.lift(step.get_property("value")?);
            let (value_type, source, condition) =
                (value_type.clone(), source.clone(), condition.clone());
            Ok(value
                .and_then(move |value| {
                    if condition.call1(value.clone())?.is_truthy() {
                        Ok(iter_result(false, value))
                    } else {
                        filter_next(value_type.clone(), source.clone(), condition.clone())
                    }
                })
                .into())
        })
        .into())
}

fn filter(this: &Promise, condition: Function) -> Promise {
    wrap(this, move |value_type, source| {
        let condition = condition.clone();
        iterator_from_fn(move || filter_next(value_type.clone(), source.clone(), condition.clone()))
    })
}

fn drop(this: &Promise, count: usize) -> Promise {
    let seen = Rc::new(Cell::new(0));
    filter(
        this,
        Function::new(move |_| {
            if seen.get() < count {
                seen.set(seen.get() + 1);
                Ok(Value::from(false))
            } else {
                Ok(Value::from(true))
            }
        }),
    )
}

/// Drops values while `predicate` holds, or until it first holds when
/// `until` is set. Everything after the first kept value is kept.
fn drop_while(this: &Promise, predicate: Function, until: bool) -> Promise {
    let found = Rc::new(Cell::new(false));
    filter(
        this,
        Function::new(move |value| {
            if found.get() {
                return Ok(Value::from(true));
            }
            let matched = predicate.call1(value)?.is_truthy();
            let keep = matched == until;
            found.set(keep);
            Ok(Value::from(keep))
        }),
    )
}

type Keep = Box<dyn Fn(&Value) -> Result<bool, Value>>;

struct Limit {
    exhausted: Cell<bool>,
    remaining: Option<Cell<usize>>,
    keep: Option<Keep>,
}

fn limited_next(value_type: &Flavor, source: &Value, limit: &Rc<Limit>) -> Completion {
    if limit.exhausted.get() {
        debug!("next() called on an exhausted iterator");
        return Ok(value_type
            .reject(JsError::type_error("iterator is exhausted"))
            .into());
    }
    if let Some(remaining) = &limit.remaining {
        if remaining.get() == 0 {
            limit.exhausted.set(true);
            return Ok(iter_result(true, Value::Undefined));
        }
        remaining.set(remaining.get() - 1);
    }

    let (element_type, limit) = (value_type.clone(), limit.clone());
    let step = value_type.lift(pull(source)?);
    Ok(step
        .and_then(move |step| {
            if is_done(&step)? {
                limit.exhausted.set(true);
                return Ok(step);
            }
            if limit.keep.is_none() {
                return Ok(step);
            }
            let value = element_type.lift(step.get_property("value")?);
            let limit = limit.clone();
            Ok(value
                .and_then(move |value| {
                    let keep = match &limit.keep {
                        Some(keep) => keep(&value)?,
                        None => true,
                    };
                    if keep {
                        Ok(iter_result(false, value))
                    } else {
                        limit.exhausted.set(true);
                        Ok(iter_result(true, Value::Undefined))
                    }
                })
                .into())
        })
        .into())
}

fn limited(this: &Promise, remaining: Option<usize>, keep: Option<Keep>) -> Promise {
    let limit = Rc::new(Limit {
        exhausted: Cell::new(false),
        remaining: remaining.map(Cell::new),
        keep,
    });
    wrap(this, move |value_type, source| {
        let limit = limit.clone();
        iterator_from_fn(move || limited_next(&value_type, &source, &limit))
    })
}

fn take(this: &Promise, count: usize) -> Promise {
    limited(this, Some(count), None)
}

/// Takes values while `predicate` holds, or until it first holds when
/// `until` is set. The value that stops the iteration is not yielded.
fn take_while(this: &Promise, predicate: Function, until: bool) -> Promise {
    let keep: Keep = Box::new(move |value| {
        let matched = predicate.call1(value.clone())?.is_truthy();
        Ok(matched != until)
    });
    limited(this, None, Some(keep))
}

fn reduce_next(value_type: Flavor, source: Value, reducer: Function, acc: Value) -> Completion {
    let step = value_type.lift(pull(&source)?);
    Ok(step
        .and_then(move |step| {
            if is_done(&step)? {
                return Ok(acc.clone());
            }
            let value = step.get_property("value")?;
            let current = value_type.lift(acc.clone());
            let (value_type, source, reducer) =
                (value_type.clone(), source.clone(), reducer.clone());
            Ok(current
                .and_then(move |current| {
                    let item = value_type.lift(value.clone());
                    let (value_type, source, reducer) =
                        (value_type.clone(), source.clone(), reducer.clone());
                    Ok(item
                        .and_then(move |item| {
                            let next = reducer.call(&Value::Undefined, &[current.clone(), item])?;
                            reduce_next(value_type.clone(), source.clone(), reducer.clone(), next)
                        })
                        .into())
                })
                .into())
        })
        .into())
}

/// Pulls every value and folds it with `reducer(acc, value)`. Never settles
/// on an infinite iterator unless a step rejects.
fn reduce(this: &Promise, reducer: Function, initial: Value) -> Promise {
    let value_type = this.value_type();
    this.and_then(move |source| {
        reduce_next(value_type.clone(), source, reducer.clone(), initial.clone())
    })
}

fn for_each(this: &Promise, f: Function) -> Promise {
    let visit = Function::native("for_each", move |_this, args| {
        f.call1(args.get(1).cloned().unwrap_or(Value::Undefined))?;
        Ok(Value::Undefined)
    });
    reduce(this, visit, Value::Undefined)
}

/// Typed access to the iterator capabilities of a promise.
pub trait IteratorPromise {
    /// Lazily maps values.
    fn map(&self, mapper: Function) -> Promise;
    /// Lazily keeps values matching `condition`.
    fn filter(&self, condition: Function) -> Promise;
    /// Yields at most `count` values.
    fn take(&self, count: usize) -> Promise;
    /// Yields values while `predicate` holds.
    fn take_while(&self, predicate: Function) -> Promise;
    /// Yields values until `predicate` first holds.
    fn take_until(&self, predicate: Function) -> Promise;
    /// Skips the first `count` values.
    fn drop(&self, count: usize) -> Promise;
    /// Skips values while `predicate` holds.
    fn drop_while(&self, predicate: Function) -> Promise;
    /// Skips values until `predicate` first holds.
    fn drop_until(&self, predicate: Function) -> Promise;
    /// Folds every value.
    fn reduce(&self, reducer: Function, initial: Value) -> Promise;
    /// Visits every value.
    fn for_each(&self, f: Function) -> Promise;
}

impl IteratorPromise for Promise {
    fn map(&self, mapper: Function) -> Promise {
        self.send("map", &[mapper.into()])
    }

    fn filter(&self, condition: Function) -> Promise {
        self.send("filter", &[condition.into()])
    }

    fn take(&self, count: usize) -> Promise {
        self.send("take", &[Value::from(count)])
    }

    fn take_while(&self, predicate: Function) -> Promise {
        self.send("take_while", &[predicate.into()])
    }

    fn take_until(&self, predicate: Function) -> Promise {
        self.send("take_until", &[predicate.into()])
    }

    fn drop(&self, count: usize) -> Promise {
        self.send("drop", &[Value::from(count)])
    }

    fn drop_while(&self, predicate: Function) -> Promise {
        self.send("drop_while", &[predicate.into()])
    }

    fn drop_until(&self, predicate: Function) -> Promise {
        self.send("drop_until", &[predicate.into()])
    }

    fn reduce(&self, reducer: Function, initial: Value) -> Promise {
        self.send("reduce", &[reducer.into(), initial])
    }

    fn for_each(&self, f: Function) -> Promise {
        self.send("for_each", &[f.into()])
    }
}
