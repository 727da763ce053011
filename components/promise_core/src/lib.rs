//! Composable promise engine.
//!
//! This crate provides one resolution core with Promises/A+ settlement
//! semantics and a layering mechanism that derives specialized flavors
//! sharing it:
//! - [`Promise`] and [`Resolver`] - the state machine and message-passing
//!   continuations, including one-time assimilation of foreign thenables
//! - [`Scheduler`] - the trampoline every continuation runs on
//! - [`Flavor`] and [`Api`] - capability bundles built with [`make_core`] and
//!   [`Flavor::extend`]
//! - [`PromiseMonitor`] - lifecycle hooks for unhandled-rejection tracking
//! - [`timeout`] - a deadline combinator over a host [`Timer`]
//! - [`EventLoop`] - a deterministic single-threaded host
//! - [`Value`] - the dynamic values promises carry
//!
//! # Examples
//!
//! ```
//! use std::rc::Rc;
//! use promise_core::{make_core, CoreOptions, EventLoop, PromiseState, Scheduler, Value};
//!
//! let event_loop = EventLoop::with_virtual_clock();
//! let scheduler = Scheduler::with_host(event_loop.host_ticks()).unwrap();
//! let flavor = make_core(CoreOptions::new(Rc::new(scheduler)));
//!
//! let (promise, resolver) = flavor.defer();
//! let greeting = promise.and_then(|name| Ok(Value::from(format!("hello {}", name))));
//! resolver.resolve("world");
//!
//! event_loop.run_until_done();
//! assert_eq!(greeting.inspect(), PromiseState::Fulfilled(Value::from("hello world")));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod event_loop;
pub mod flavor;
pub mod monitor;
pub mod promise;
pub mod scheduler;
pub mod task_queue;
pub mod timeout;
pub mod timer;
pub mod value;

// Re-export main types at crate root
pub use event_loop::EventLoop;
pub use flavor::{make_core, Api, CoreOptions, Flavor};
pub use monitor::{PromiseId, PromiseMonitor};
pub use promise::{Promise, PromiseState, Resolver};
pub use scheduler::{HostTicks, Schedule, Scheduler, TickFn, TickSource};
pub use task_queue::{Task, TaskQueue};
pub use timeout::timeout;
pub use timer::{Timer, TimerToken};
pub use value::{Array, Completion, Function, Object, Property, Value};
