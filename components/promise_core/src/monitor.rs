//! Hook interface for promise monitors.
//!
//! A core built with a monitor reports the lifecycle of every tracked promise
//! (flavor constructors and `then` derivations). Hooks receive ids, never
//! promise handles, so a monitor cannot keep promises alive.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use core_types::StackFrame;

use crate::scheduler::Schedule;
use crate::task_queue::Task;
use crate::value::Value;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a promise, distinct from its eventual resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PromiseId(u64);

impl PromiseId {
    pub(crate) fn next() -> Self {
        PromiseId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Rebuilds an id from its raw value, e.g. when replaying recorded
    /// hook events.
    pub fn from_raw(raw: u64) -> Self {
        PromiseId(raw)
    }

    /// Returns the raw id.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PromiseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle hooks for tracked promises.
pub trait PromiseMonitor {
    /// A tracked promise was created. `parent` is the promise `then` was
    /// called on, if that promise is tracked.
    fn promise_pending(&self, id: PromiseId, parent: Option<PromiseId>, created_at: StackFrame);

    /// `then` was called on the promise for the first time.
    fn promise_observed(&self, id: PromiseId);

    /// The promise fulfilled.
    fn promise_fulfilled(&self, id: PromiseId);

    /// The promise rejected and was still unobserved one scheduler tick
    /// after the rejection was seen.
    fn unhandled_rejection(&self, id: PromiseId, reason: &Value, rejected_at: StackFrame);
}

/// Monitor bookkeeping attached to one tracked promise.
pub(crate) struct Status {
    id: PromiseId,
    monitor: Rc<dyn PromiseMonitor>,
    scheduler: Rc<dyn Schedule>,
    observed: Cell<bool>,
}

impl Status {
    pub(crate) fn new(
        id: PromiseId,
        parent: Option<PromiseId>,
        created_at: StackFrame,
        monitor: Rc<dyn PromiseMonitor>,
        scheduler: Rc<dyn Schedule>,
    ) -> Rc<Self> {
        monitor.promise_pending(id, parent, created_at);
        Rc::new(Self {
            id,
            monitor,
            scheduler,
            observed: Cell::new(false),
        })
    }

    pub(crate) fn id(&self) -> PromiseId {
        self.id
    }

    pub(crate) fn observe(&self) {
        if !self.observed.replace(true) {
            self.monitor.promise_observed(self.id);
        }
    }

    pub(crate) fn fulfilled(&self) {
        self.monitor.promise_fulfilled(self.id);
    }

    pub(crate) fn rejected(self: &Rc<Self>, reason: Value, rejected_at: StackFrame) {
        let status = self.clone();
        self.scheduler.enqueue(Task::new(move || {
            if !status.observed.get() {
                status
                    .monitor
                    .unhandled_rejection(status.id, &reason, rejected_at);
            }
        }));
    }
}
