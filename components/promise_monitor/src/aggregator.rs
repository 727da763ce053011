//! Unhandled-rejection bookkeeping.
//!
//! The aggregator keeps one record per tracked promise that is still a leaf
//! of its chain. Observing or fulfilling a promise removes its record; an
//! unhandled rejection annotates it and triggers a report.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::SystemTime;

use core_types::StackFrame;
use promise_core::{PromiseId, PromiseMonitor, Value};
use tracing::debug;

use crate::reporter::Reporter;

/// Where and why a promise rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    /// Rejection reason
    pub reason: Value,
    /// Call site that rejected the promise
    pub rejected_at: StackFrame,
}

/// Bookkeeping for one tracked promise.
///
/// Records hold their parent record directly, so a causal chain survives
/// the removal of its ancestors from the aggregator.
#[derive(Debug)]
pub struct Record {
    id: PromiseId,
    created: SystemTime,
    created_at: StackFrame,
    parent: Option<Rc<Record>>,
    rejection: RefCell<Option<Rejection>>,
    reported: Cell<bool>,
}

impl Record {
    /// Returns the promise id.
    pub fn id(&self) -> PromiseId {
        self.id
    }

    /// Returns when the promise was created.
    pub fn created(&self) -> SystemTime {
        self.created
    }

    /// Returns the call site that created the promise.
    pub fn created_at(&self) -> &StackFrame {
        &self.created_at
    }

    /// Returns the record of the promise this one was derived from.
    pub fn parent(&self) -> Option<&Rc<Record>> {
        self.parent.as_ref()
    }

    /// Walks the parent chain, nearest ancestor first.
    pub fn ancestors(&self) -> impl Iterator<Item = &Record> {
        std::iter::successors(self.parent.as_deref(), |record| record.parent.as_deref())
    }

    /// Returns the rejection, if the promise was reported unhandled.
    pub fn rejection(&self) -> Option<Rejection> {
        self.rejection.borrow().clone()
    }

    /// Returns true once the promise was reported unhandled.
    pub fn is_rejected(&self) -> bool {
        self.rejection.borrow().is_some()
    }
}

/// One entry of a report.
#[derive(Debug, Clone)]
pub struct UnhandledRejection {
    /// The annotated record
    pub record: Rc<Record>,
    /// True if this is the first report containing the record
    pub first_report: bool,
}

struct AggregatorInner {
    records: RefCell<BTreeMap<PromiseId, Rc<Record>>>,
    reporter: Box<dyn Reporter>,
}

/// Collects monitor hooks into records and hands unhandled rejections to a
/// [`Reporter`].
///
/// # Examples
///
/// ```
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use promise_core::{make_core, CoreOptions, EventLoop, Scheduler};
/// use promise_monitor::{Aggregator, UnhandledRejection};
///
/// let seen = Rc::new(Cell::new(0));
/// let counter = seen.clone();
/// let aggregator = Aggregator::new(move |unhandled: &[UnhandledRejection]| {
///     counter.set(unhandled.len());
/// });
///
/// let event_loop = EventLoop::with_virtual_clock();
/// let scheduler = Scheduler::with_host(event_loop.host_ticks()).unwrap();
/// let flavor = make_core(
///     CoreOptions::new(Rc::new(scheduler)).with_monitor(aggregator.publish()),
/// );
///
/// let _lost = flavor.reject("nobody listens");
/// event_loop.run_until_done();
/// assert_eq!(seen.get(), 1);
/// ```
#[derive(Clone)]
pub struct Aggregator {
    inner: Rc<AggregatorInner>,
}

impl Aggregator {
    /// Creates an aggregator reporting to `reporter`.
    pub fn new(reporter: impl Reporter + 'static) -> Self {
        Self {
            inner: Rc::new(AggregatorInner {
                records: RefCell::new(BTreeMap::new()),
                reporter: Box::new(reporter),
            }),
        }
    }

    /// Returns the hook handle to pass to `CoreOptions::with_monitor`.
    pub fn publish(&self) -> Rc<dyn PromiseMonitor> {
        Rc::new(self.clone())
    }

    /// Forgets every record.
    pub fn reset(&self) {
        self.inner.records.borrow_mut().clear();
    }

    /// Passes the current unhandled set to the reporter.
    pub fn report(&self) {
        let unhandled: Vec<UnhandledRejection> = self
            .inner
            .records
            .borrow()
            .values()
            .filter(|record| record.is_rejected())
            .map(|record| UnhandledRejection {
                record: record.clone(),
                first_report: !record.reported.replace(true),
            })
            .collect();
        self.inner.reporter.report(&unhandled);
    }

    /// Returns the number of live records.
    pub fn len(&self) -> usize {
        self.inner.records.borrow().len()
    }

    /// Returns true if no promise is being tracked.
    pub fn is_empty(&self) -> bool {
        self.inner.records.borrow().is_empty()
    }

    /// Returns the record of a tracked promise.
    pub fn record(&self, id: PromiseId) -> Option<Rc<Record>> {
        self.inner.records.borrow().get(&id).cloned()
    }

    /// Returns the records currently annotated as unhandled.
    pub fn unhandled(&self) -> Vec<Rc<Record>> {
        self.inner
            .records
            .borrow()
            .values()
            .filter(|record| record.is_rejected())
            .cloned()
            .collect()
    }

    fn remove(&self, id: PromiseId) -> Option<Rc<Record>> {
        self.inner.records.borrow_mut().remove(&id)
    }
}

impl PromiseMonitor for Aggregator {
    fn promise_pending(&self, id: PromiseId, parent: Option<PromiseId>, created_at: StackFrame) {
        let mut records = self.inner.records.borrow_mut();
        let parent = parent.and_then(|parent| records.get(&parent).cloned());
        records.insert(
            id,
            Rc::new(Record {
                id,
                created: SystemTime::now(),
                created_at,
                parent,
                rejection: RefCell::new(None),
                reported: Cell::new(false),
            }),
        );
    }

    fn promise_observed(&self, id: PromiseId) {
        // A handler attached after the report: reporters need the shrunken set.
        if let Some(record) = self.remove(id) {
            if record.reported.get() {
                self.report();
            }
        }
    }

    fn promise_fulfilled(&self, id: PromiseId) {
        self.remove(id);
    }

    fn unhandled_rejection(&self, id: PromiseId, reason: &Value, rejected_at: StackFrame) {
        let Some(record) = self.record(id) else {
            debug!(promise = %id, "unhandled rejection for an untracked promise");
            return;
        };
        *record.rejection.borrow_mut() = Some(Rejection {
            reason: reason.clone(),
            rejected_at,
        });
        self.report();
    }
}
