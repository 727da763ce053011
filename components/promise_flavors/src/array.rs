//! Array-aware promises.
//!
//! Operations act on the eventual array. A fulfillment that is not an array
//! is treated as an empty one. Holes are skipped by every element visitor and
//! kept as holes by `all`, `map`, `slice` and `concat`.

use std::cell::Cell;
use std::rc::Rc;

use core_types::JsError;
use promise_core::{Api, Array, Flavor, Function, Promise, Value};

use crate::function_arg;

/// Returns the slots of an array value, or none for anything else.
pub(crate) fn slots(value: &Value) -> Vec<Option<Value>> {
    value.as_array().map(Array::to_vec).unwrap_or_default()
}

/// Builds the array capability set.
pub fn array_api() -> Api {
    Api::named("array")
        .method("all", |this, _args| Ok(all(this).into()))
        .method("settle", |this, _args| Ok(settle(this).into()))
        .method("spread", |this, args| {
            Ok(spread(this, function_arg(args, 0, "spread")?).into())
        })
        .method("map", |this, args| {
            Ok(map(this, function_arg(args, 0, "map")?).into())
        })
        .method("reduce", |this, args| {
            let reducer = function_arg(args, 0, "reduce")?;
            Ok(reduce(this, reducer, args.get(1).cloned(), false).into())
        })
        .method("reduce_right", |this, args| {
            let reducer = function_arg(args, 0, "reduce_right")?;
            Ok(reduce(this, reducer, args.get(1).cloned(), true).into())
        })
        .method("filter", |this, args| {
            Ok(filter(this, function_arg(args, 0, "filter")?).into())
        })
        .method("concat", |this, args| Ok(concat(this, args.to_vec()).into()))
        .method("slice", |this, args| {
            Ok(slice(this, args.first().cloned(), args.get(1).cloned()).into())
        })
        .method("for_each", |this, args| {
            Ok(for_each(this, function_arg(args, 0, "for_each")?).into())
        })
}

/// Derives the array flavor from `base`.
pub fn array_flavor(base: &Flavor) -> Flavor {
    base.extend(array_api(), None)
}

/// Waits for every element of the slots and fulfills with their values.
///
/// Rejects with the first element rejection; progress is forwarded.
pub(crate) fn all_slots(value_type: &Flavor, slots: Vec<Option<Value>>) -> Promise {
    value_type.promise(move |resolver| {
        let results = Array::from_slots(vec![None; slots.len()]);
        let remaining = Rc::new(Cell::new(slots.iter().filter(|slot| slot.is_some()).count()));
        if remaining.get() == 0 {
            resolver.resolve(results);
            return Ok(());
        }

        for (index, item) in slots.into_iter().enumerate() {
            let Some(item) = item else { continue };
            let (results, remaining, done) = (results.clone(), remaining.clone(), resolver.clone());
            value_type.lift(item).then(
                Some(Function::new(move |value| {
                    results.set(index, value);
                    remaining.set(remaining.get() - 1);
                    if remaining.get() == 0 {
                        done.resolve(results.clone());
                    }
                    Ok(Value::Undefined)
                })),
                Some(resolver.reject_fn()),
                Some(resolver.notify_fn()),
            );
        }
        Ok(())
    })
}

pub(crate) fn all(this: &Promise) -> Promise {
    let value_type = this.value_type();
    this.and_then(move |value| Ok(all_slots(&value_type, slots(&value)).into()))
}

fn settle(this: &Promise) -> Promise {
    let value_type = this.value_type();
    let snapshots = this.and_then(move |value| {
        let states = slots(&value)
            .into_iter()
            .map(|slot| {
                slot.map(|item| {
                    let (on_fulfilled, on_rejected) = (value_type.clone(), value_type.clone());
                    value_type
                        .lift(item)
                        .then(
                            Some(Function::new(move |v| {
                                Ok(on_fulfilled.to_fulfilled_state(v).into())
                            })),
                            Some(Function::new(move |r| {
                                Ok(on_rejected.to_rejected_state(r).into())
                            })),
                            None,
                        )
                        .into()
                })
            })
            .collect();
        Ok(Array::from_slots(states).into())
    });
    all(&snapshots)
}

fn spread(this: &Promise, f: Function) -> Promise {
    all(this).and_then(move |values| {
        let args: Vec<Value> = slots(&values)
            .into_iter()
            .map(|slot| slot.unwrap_or(Value::Undefined))
            .collect();
        f.call(&Value::Undefined, &args)
    })
}

/// Dispatches `f` to every element eagerly; the result is an array of
/// promises until `all` is called on it.
fn map(this: &Promise, f: Function) -> Promise {
    let value_type = this.value_type();
    this.and_then(move |value| {
        let mapped = slots(&value)
            .into_iter()
            .map(|slot| {
                slot.map(|item| value_type.lift(item).then(Some(f.clone()), None, None).into())
            })
            .collect();
        Ok(Array::from_slots(mapped).into())
    })
}

/// Sequential, promise-aware reduction calling `f(acc, value, index, total)`.
fn reduce(this: &Promise, f: Function, initial: Option<Value>, from_right: bool) -> Promise {
    let value_type = this.value_type();
    this.and_then(move |value| {
        let slots = slots(&value);
        let total = slots.len();
        let mut items: Vec<(usize, Value)> = slots
            .into_iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.map(|item| (index, item)))
            .collect();
        if from_right {
            items.reverse();
        }

        let mut items = items.into_iter();
        let mut acc = match (&initial, items.next()) {
            (Some(initial), first) => {
                // The first item still needs reducing.
                let acc = value_type.lift(initial.clone());
                match first {
                    Some(first) => step(&value_type, acc, &f, first, total),
                    None => acc,
                }
            }
            (None, Some((_, first))) => value_type.lift(first),
            (None, None) => {
                return Err(JsError::type_error("reduce of empty array with no initial value").into())
            }
        };
        for item in items {
            acc = step(&value_type, acc, &f, item, total);
        }
        Ok(acc.into())
    })
}

fn step(value_type: &Flavor, acc: Promise, f: &Function, (index, item): (usize, Value), total: usize) -> Promise {
    let (value_type, f) = (value_type.clone(), f.clone());
    acc.and_then(move |current| {
        let f = f.clone();
        Ok(value_type
            .lift(item.clone())
            .and_then(move |value| {
                f.call(
                    &Value::Undefined,
                    &[current.clone(), value, Value::from(index), Value::from(total)],
                )
            })
            .into())
    })
}

/// Resolves every element, then keeps those for which `predicate(value, index)`
/// is truthy.
fn filter(this: &Promise, predicate: Function) -> Promise {
    all(this).and_then(move |values| {
        let kept = Array::new();
        for (index, slot) in slots(&values).into_iter().enumerate() {
            let Some(value) = slot else { continue };
            if predicate
                .call(&Value::Undefined, &[value.clone(), Value::from(index)])?
                .is_truthy()
            {
                kept.push(value);
            }
        }
        Ok(kept.into())
    })
}

/// Appends `tails`: arrays are spliced in one level deep, anything else is
/// appended as an element. Elements are never forced.
fn concat(this: &Promise, tails: Vec<Value>) -> Promise {
    let own = this.flavor().clone();
    this.and_then(move |head| {
        let tails = all_slots(&own, tails.iter().cloned().map(Some).collect());
        Ok(tails
            .and_then(move |tails| {
                let mut joined = slots(&head);
                for tail in slots(&tails).into_iter().flatten() {
                    match tail {
                        Value::Array(array) => joined.extend(array.to_vec()),
                        other => joined.push(Some(other)),
                    }
                }
                Ok(Array::from_slots(joined).into())
            })
            .into())
    })
}

fn relative_index(index: Option<&Value>, len: usize, default: usize) -> usize {
    let Some(n) = index.and_then(Value::as_number) else {
        return default;
    };
    if n.is_nan() {
        return 0;
    }
    let n = n.trunc();
    if n < 0.0 {
        (len as f64 + n).max(0.0) as usize
    } else {
        n.min(len as f64) as usize
    }
}

/// Copies `[start, end)` with negative indices counted from the end.
fn slice(this: &Promise, start: Option<Value>, end: Option<Value>) -> Promise {
    this.and_then(move |value| {
        let slots = slots(&value);
        let len = slots.len();
        let start = relative_index(start.as_ref(), len, 0);
        let end = relative_index(end.as_ref().filter(|end| !end.is_undefined()), len, len);
        let range = if start < end { slots[start..end].to_vec() } else { Vec::new() };
        Ok(Array::from_slots(range).into())
    })
}

/// Visits every resolved element in order. The callback's return value is
/// ignored; its `Err` rejects.
fn for_each(this: &Promise, f: Function) -> Promise {
    all(this).and_then(move |values| {
        for (index, slot) in slots(&values).into_iter().enumerate() {
            if let Some(value) = slot {
                f.call(&Value::Undefined, &[value, Value::from(index)])?;
            }
        }
        Ok(Value::Undefined)
    })
}

/// Typed access to the array capabilities of a promise.
///
/// Every method dispatches through [`Promise::send`], so it works on any
/// flavor derived from [`array_flavor`] and rejects with a `TypeError` on
/// flavors without the capability.
pub trait ArrayPromise {
    /// Fulfills with the array of resolved elements.
    fn all(&self) -> Promise;
    /// Fulfills with a `{state, value|reason}` snapshot per element.
    fn settle(&self) -> Promise;
    /// Calls `f` with the resolved elements as arguments.
    fn spread(&self, f: Function) -> Promise;
    /// Applies `f` to each element, yielding an array of promises.
    fn map(&self, f: Function) -> Promise;
    /// Reduces left to right.
    fn reduce(&self, f: Function, initial: Option<Value>) -> Promise;
    /// Reduces right to left.
    fn reduce_right(&self, f: Function, initial: Option<Value>) -> Promise;
    /// Keeps the elements matching `predicate`.
    fn filter(&self, predicate: Function) -> Promise;
    /// Appends arrays or values.
    fn concat(&self, tails: Vec<Value>) -> Promise;
    /// Copies a range.
    fn slice(&self, start: i64, end: Option<i64>) -> Promise;
    /// Visits each element.
    fn for_each(&self, f: Function) -> Promise;
}

fn with_initial(f: Function, initial: Option<Value>) -> Vec<Value> {
    let mut args = vec![Value::Function(f)];
    args.extend(initial);
    args
}

impl ArrayPromise for Promise {
    fn all(&self) -> Promise {
        self.send("all", &[])
    }

    fn settle(&self) -> Promise {
        self.send("settle", &[])
    }

    fn spread(&self, f: Function) -> Promise {
        self.send("spread", &[f.into()])
    }

    fn map(&self, f: Function) -> Promise {
        self.send("map", &[f.into()])
    }

    fn reduce(&self, f: Function, initial: Option<Value>) -> Promise {
        self.send("reduce", &with_initial(f, initial))
    }

    fn reduce_right(&self, f: Function, initial: Option<Value>) -> Promise {
        self.send("reduce_right", &with_initial(f, initial))
    }

    fn filter(&self, predicate: Function) -> Promise {
        self.send("filter", &[predicate.into()])
    }

    fn concat(&self, tails: Vec<Value>) -> Promise {
        self.send("concat", &tails)
    }

    fn slice(&self, start: i64, end: Option<i64>) -> Promise {
        let end = end.map(|end| Value::from(end as f64)).unwrap_or(Value::Undefined);
        self.send("slice", &[Value::from(start as f64), end])
    }

    fn for_each(&self, f: Function) -> Promise {
        self.send("for_each", &[f.into()])
    }
}
