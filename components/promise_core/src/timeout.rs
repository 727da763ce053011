//! Deadline combinator.
//!
//! [`timeout`] races a promise against a host timer. There is no native
//! cancellation: when the trigger wins, the timer is cancelled; when the
//! timer wins, the trigger's eventual outcome is ignored.

use std::panic::Location;
use std::rc::Rc;
use std::time::Duration;

use core_types::{JsError, StackFrame};

use crate::flavor::Flavor;
use crate::promise::Promise;
use crate::task_queue::Task;
use crate::timer::Timer;
use crate::value::{Function, Value};

/// Returns a promise that adopts `trigger`'s outcome, or rejects with a
/// `TimeoutError` if `trigger` has not settled after `duration`.
///
/// Progress updates of `trigger` are forwarded.
///
/// # Examples
///
/// ```
/// use std::rc::Rc;
/// use std::time::Duration;
/// use promise_core::{make_core, timeout, CoreOptions, EventLoop, Scheduler};
///
/// let event_loop = EventLoop::with_virtual_clock();
/// let scheduler = Scheduler::with_host(event_loop.host_ticks()).unwrap();
/// let flavor = make_core(CoreOptions::new(Rc::new(scheduler)));
///
/// let (never, _resolver) = flavor.defer();
/// let limited = timeout(&flavor, Rc::new(event_loop.clone()), Duration::from_millis(50), never);
///
/// event_loop.run_until_done();
/// assert!(limited.inspect().is_rejected());
/// assert_eq!(event_loop.now(), Duration::from_millis(50));
/// ```
#[track_caller]
pub fn timeout(
    flavor: &Flavor,
    timer: Rc<dyn Timer>,
    duration: Duration,
    trigger: impl Into<Value>,
) -> Promise {
    let site = Location::caller();
    let (promise, resolver) = flavor.defer();

    let expired = resolver.clone();
    let token = timer.set(
        Task::new(move || {
            expired.reject_at(
                JsError::timeout(duration.as_millis()).into(),
                StackFrame::from_location("timeout", site),
            );
        }),
        duration,
    );

    let (fulfill_timer, fulfill) = (timer.clone(), resolver.clone());
    let (reject_timer, reject) = (timer, resolver.clone());
    flavor.lift(trigger).then(
        Some(Function::new(move |value| {
            fulfill_timer.cancel(token);
            fulfill.resolve(value);
            Ok(Value::Undefined)
        })),
        Some(Function::new(move |reason| {
            reject_timer.cancel(token);
            reject.reject_at(reason, StackFrame::from_location("timeout", site));
            Ok(Value::Undefined)
        })),
        Some(resolver.notify_fn()),
    );
    promise
}
