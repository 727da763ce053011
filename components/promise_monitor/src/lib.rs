//! Unhandled-rejection monitoring for promise cores.
//!
//! An [`Aggregator`] implements the core's `PromiseMonitor` hooks. It keeps a
//! record per unobserved promise and hands the unhandled set to a
//! [`Reporter`] whenever it changes. [`TracingReporter`] logs the set through
//! `tracing`, with stacks stitched by a [`Formatter`] from the creation site,
//! the ancestor creation sites and the rejection site.
//!
//! # Examples
//!
//! ```
//! use std::rc::Rc;
//! use promise_core::{make_core, CoreOptions, EventLoop, Scheduler};
//! use promise_monitor::{Aggregator, Formatter, TracingReporter};
//!
//! let aggregator = Aggregator::new(TracingReporter::new(Formatter::default()));
//! let event_loop = EventLoop::with_virtual_clock();
//! let scheduler = Scheduler::with_host(event_loop.host_ticks()).unwrap();
//! let flavor = make_core(
//!     CoreOptions::new(Rc::new(scheduler)).with_monitor(aggregator.publish()),
//! );
//!
//! let rejected = flavor.reject("lost");
//! event_loop.run_until_done();
//! assert_eq!(aggregator.unhandled().len(), 1);
//!
//! let _handled = rejected.otherwise(|_| Ok(().into()));
//! assert!(aggregator.unhandled().is_empty());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod aggregator;
pub mod formatter;
pub mod reporter;

pub use aggregator::{Aggregator, Record, Rejection, UnhandledRejection};
pub use formatter::{FormattedRejection, Formatter, FormatterConfig};
pub use reporter::{Reporter, TracingReporter};
