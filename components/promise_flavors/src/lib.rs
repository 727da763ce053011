//! Capability mixins for promise flavors.
//!
//! Each mixin is an [`Api`](promise_core::Api) built only on `then`, the
//! receiving promise's flavor and its `value_type`:
//! - [`array`] - `all`, `settle`, `spread`, `map`, `reduce`, `reduce_right`,
//!   `filter`, `concat`, `slice`, `for_each`
//! - [`object`] - `get`, `set`, `delete`, `invoke`
//! - [`function`] - `call`, `apply`, `bind`, plus [`lift_function`] and
//!   [`lift_all`]
//! - [`iterator`] - lazy `map`, `filter`, `take*`, `drop*` and the terminal
//!   `reduce` and `for_each` over a pull-based `{ next() }` protocol
//!
//! # Examples
//!
//! ```
//! use std::rc::Rc;
//! use promise_core::{make_core, CoreOptions, EventLoop, Function, PromiseState, Scheduler, Value};
//! use promise_flavors::{array_flavor, ArrayPromise};
//!
//! let event_loop = EventLoop::with_virtual_clock();
//! let scheduler = Scheduler::with_host(event_loop.host_ticks()).unwrap();
//! let arrays = array_flavor(&make_core(CoreOptions::new(Rc::new(scheduler))));
//!
//! let items = Value::from(vec![Value::from(1), Value::from(2), Value::from(3)]);
//! let sum = arrays.lift(items).reduce(
//!     Function::native("add", |_this, args| {
//!         let a = args[0].as_number().unwrap_or(0.0);
//!         let b = args[1].as_number().unwrap_or(0.0);
//!         Ok(Value::from(a + b))
//!     }),
//!     None,
//! );
//!
//! event_loop.run_until_done();
//! assert_eq!(sum.inspect(), PromiseState::Fulfilled(Value::from(6)));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod array;
pub mod function;
pub mod iterator;
pub mod object;

pub use array::{array_api, array_flavor, ArrayPromise};
pub use function::{default_namer, function_api, function_flavor, lift_all, lift_function, FunctionPromise};
pub use iterator::{iter_result, iterator_api, iterator_flavor, iterator_from_fn, IteratorPromise};
pub use object::{object_api, object_flavor, ObjectPromise};

use core_types::JsError;
use promise_core::{Function, Value};

/// Extracts a callable argument or throws a `TypeError`.
pub(crate) fn function_arg(args: &[Value], index: usize, operation: &str) -> Result<Function, Value> {
    match args.get(index) {
        Some(Value::Function(function)) => Ok(function.clone()),
        Some(other) => Err(JsError::type_error(format!(
            "{}: {} is not a function",
            operation, other
        ))
        .into()),
        None => Err(JsError::type_error(format!("{}: missing function argument", operation)).into()),
    }
}

/// Extracts a property key argument; any value is converted to its string form.
pub(crate) fn key_arg(args: &[Value], index: usize) -> String {
    args.get(index).map(Value::to_string).unwrap_or_else(|| "undefined".to_string())
}

/// Extracts a non-negative count argument, treating anything else as zero.
pub(crate) fn count_arg(args: &[Value], index: usize) -> usize {
    match args.get(index).and_then(Value::as_number) {
        Some(n) if n.is_finite() && n > 0.0 => n as usize,
        _ => 0,
    }
}
