//! Trampoline scheduler.
//!
//! Every continuation the engine runs goes through a [`Schedule`]. The
//! [`Scheduler`] keeps one FIFO queue and asks the host for a single drain
//! whenever the queue goes from empty to non-empty, so a burst of settlements
//! costs one host tick.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use core_types::JsError;
use tracing::trace;

use crate::task_queue::Task;
use crate::timer::Timer;

/// The scheduling seam of the engine.
///
/// Any `Fn(Task)` is a `Schedule`, which makes a synchronous scheduler a
/// one-liner in tests:
///
/// ```
/// use promise_core::{Schedule, Task};
///
/// let run_now = |task: Task| task.run();
/// run_now.enqueue(Task::new(|| {}));
/// ```
pub trait Schedule {
    /// Queues `task` to run in a later tick.
    fn enqueue(&self, task: Task);
}

impl<F> Schedule for F
where
    F: Fn(Task),
{
    fn enqueue(&self, task: Task) {
        self(task)
    }
}

/// A host callback that runs a task in some later tick.
pub type TickFn = Rc<dyn Fn(Task)>;

/// The host mechanism a [`Scheduler`] drains on.
#[derive(Clone)]
pub enum TickSource {
    /// An immediate-callback mechanism
    Immediate(TickFn),
    /// A microtask channel
    Microtask(TickFn),
    /// A next-tick hook
    NextTick(TickFn),
    /// A zero-delay timer
    Timer(Rc<dyn Timer>),
}

impl TickSource {
    fn request(&self, task: Task) {
        match self {
            TickSource::Immediate(tick)
            | TickSource::Microtask(tick)
            | TickSource::NextTick(tick) => tick(task),
            TickSource::Timer(timer) => {
                timer.set(task, Duration::ZERO);
            }
        }
    }

    fn name(&self) -> &'static str {
        match self {
            TickSource::Immediate(_) => "immediate",
            TickSource::Microtask(_) => "microtask",
            TickSource::NextTick(_) => "next-tick",
            TickSource::Timer(_) => "timer",
        }
    }
}

impl std::fmt::Debug for TickSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TickSource({})", self.name())
    }
}

/// The tick mechanisms a host offers.
///
/// # Examples
///
/// ```
/// use std::rc::Rc;
/// use promise_core::{HostTicks, Task};
///
/// let ticks = HostTicks::new().with_microtask(Rc::new(|task: Task| task.run()));
/// assert!(ticks.select().is_ok());
/// assert!(HostTicks::new().select().is_err());
/// ```
#[derive(Clone, Default)]
pub struct HostTicks {
    immediate: Option<TickFn>,
    microtask: Option<TickFn>,
    next_tick: Option<TickFn>,
    timer: Option<Rc<dyn Timer>>,
}

impl HostTicks {
    /// Creates an empty set of tick mechanisms.
    pub fn new() -> Self {
        Self::default()
    }

    /// Offers an immediate-callback mechanism.
    pub fn with_immediate(mut self, tick: TickFn) -> Self {
        self.immediate = Some(tick);
        self
    }

    /// Offers a microtask channel.
    pub fn with_microtask(mut self, tick: TickFn) -> Self {
        self.microtask = Some(tick);
        self
    }

    /// Offers a next-tick hook.
    pub fn with_next_tick(mut self, tick: TickFn) -> Self {
        self.next_tick = Some(tick);
        self
    }

    /// Offers a timer for zero-delay scheduling.
    pub fn with_timer(mut self, timer: Rc<dyn Timer>) -> Self {
        self.timer = Some(timer);
        self
    }

    /// Picks the preferred mechanism: immediate, then microtask, then
    /// next-tick, then a zero-delay timer.
    pub fn select(&self) -> Result<TickSource, JsError> {
        if let Some(tick) = &self.immediate {
            return Ok(TickSource::Immediate(tick.clone()));
        }
        if let Some(tick) = &self.microtask {
            return Ok(TickSource::Microtask(tick.clone()));
        }
        if let Some(tick) = &self.next_tick {
            return Ok(TickSource::NextTick(tick.clone()));
        }
        if let Some(timer) = &self.timer {
            return Ok(TickSource::Timer(timer.clone()));
        }
        Err(JsError::internal(
            "no host tick mechanism available for the scheduler",
        ))
    }
}

struct SchedulerInner {
    queue: RefCell<Vec<Option<Task>>>,
    tick: TickSource,
}

/// A FIFO trampoline draining on a host tick.
///
/// Handles are cheap to clone and share one queue.
///
/// # Examples
///
/// ```
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use promise_core::{EventLoop, Schedule, Scheduler, Task};
///
/// let event_loop = EventLoop::new();
/// let scheduler = Scheduler::with_host(event_loop.host_ticks()).unwrap();
/// let log = Rc::new(RefCell::new(Vec::new()));
///
/// let l = log.clone();
/// scheduler.enqueue(Task::new(move || l.borrow_mut().push(1)));
/// assert!(log.borrow().is_empty());
///
/// event_loop.run_until_idle();
/// assert_eq!(*log.borrow(), vec![1]);
/// ```
#[derive(Clone)]
pub struct Scheduler {
    inner: Rc<SchedulerInner>,
}

impl Scheduler {
    /// Creates a scheduler draining on `tick`.
    pub fn new(tick: TickSource) -> Self {
        Self {
            inner: Rc::new(SchedulerInner {
                queue: RefCell::new(Vec::new()),
                tick,
            }),
        }
    }

    /// Creates a scheduler on the host's preferred tick mechanism.
    ///
    /// Fails if the host offers none.
    pub fn with_host(ticks: HostTicks) -> Result<Self, JsError> {
        Ok(Self::new(ticks.select()?))
    }

    /// Returns the number of queued tasks, including ones already run in the
    /// current drain.
    pub fn len(&self) -> usize {
        self.inner.queue.borrow().len()
    }

    /// Returns true if no drain is pending.
    pub fn is_empty(&self) -> bool {
        self.inner.queue.borrow().is_empty()
    }

    fn drain(inner: &SchedulerInner) {
        let mut index = 0;
        loop {
            let task = {
                let mut queue = inner.queue.borrow_mut();
                match queue.get_mut(index) {
                    Some(slot) => slot.take(),
                    None => break,
                }
            };
            // Borrow released: tasks may enqueue more work.
            if let Some(task) = task {
                task.run();
            }
            index += 1;
        }
        inner.queue.borrow_mut().clear();
        trace!(tasks = index, tick = inner.tick.name(), "scheduler drained");
    }
}

impl Schedule for Scheduler {
    fn enqueue(&self, task: Task) {
        let first = {
            let mut queue = self.inner.queue.borrow_mut();
            queue.push(Some(task));
            queue.len() == 1
        };
        if first {
            let inner = self.inner.clone();
            self.inner
                .tick
                .request(Task::new(move || Scheduler::drain(&inner)));
        }
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("tick", &self.inner.tick)
            .field("queued", &self.len())
            .finish()
    }
}
