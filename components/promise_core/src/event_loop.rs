//! Deterministic single-threaded host.
//!
//! The engine composes atop whatever async primitive the host provides. The
//! [`EventLoop`] is that host for tests and embedders without one: a task
//! queue, a microtask queue drained after every task, and a timer wheel on
//! either the real clock or a virtual one that only moves when the loop is
//! waiting.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

use tracing::trace;

use crate::scheduler::HostTicks;
use crate::task_queue::{Task, TaskQueue};
use crate::timer::{Timer, TimerToken};

enum Clock {
    Real(Instant),
    Virtual(Cell<Duration>),
}

struct LoopInner {
    tasks: RefCell<TaskQueue>,
    microtasks: RefCell<TaskQueue>,
    timers: RefCell<BTreeMap<(Duration, TimerToken), Task>>,
    next_token: Cell<u64>,
    clock: Clock,
}

/// A single-threaded event loop.
///
/// Each turn takes the oldest task, runs it, then drains every microtask.
/// Timers fire once the task queues are idle, in deadline order.
///
/// # Examples
///
/// ```
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use std::time::Duration;
/// use promise_core::{EventLoop, Task, Timer};
///
/// let event_loop = EventLoop::with_virtual_clock();
/// let fired = Rc::new(Cell::new(false));
///
/// let f = fired.clone();
/// event_loop.set(Task::new(move || f.set(true)), Duration::from_millis(50));
/// event_loop.run_until_done();
///
/// assert!(fired.get());
/// assert_eq!(event_loop.now(), Duration::from_millis(50));
/// ```
#[derive(Clone)]
pub struct EventLoop {
    inner: Rc<LoopInner>,
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLoop {
    /// Creates an event loop on the real clock.
    pub fn new() -> Self {
        Self::with_clock(Clock::Real(Instant::now()))
    }

    /// Creates an event loop whose clock starts at zero and advances only
    /// while the loop waits for a timer.
    pub fn with_virtual_clock() -> Self {
        Self::with_clock(Clock::Virtual(Cell::new(Duration::ZERO)))
    }

    fn with_clock(clock: Clock) -> Self {
        Self {
            inner: Rc::new(LoopInner {
                tasks: RefCell::new(TaskQueue::new()),
                microtasks: RefCell::new(TaskQueue::new()),
                timers: RefCell::new(BTreeMap::new()),
                next_token: Cell::new(0),
                clock,
            }),
        }
    }

    /// Returns the time elapsed since the loop was created.
    pub fn now(&self) -> Duration {
        match &self.inner.clock {
            Clock::Real(start) => start.elapsed(),
            Clock::Virtual(now) => now.get(),
        }
    }

    /// Adds a task to the task queue.
    pub fn enqueue_task(&self, task: Task) {
        self.inner.tasks.borrow_mut().enqueue(task);
    }

    /// Adds a microtask to the microtask queue.
    ///
    /// The microtask runs after the current task completes.
    pub fn enqueue_microtask(&self, microtask: Task) {
        self.inner.microtasks.borrow_mut().enqueue(microtask);
    }

    /// Returns true if the task queue is empty.
    pub fn is_task_queue_empty(&self) -> bool {
        self.inner.tasks.borrow().is_empty()
    }

    /// Returns true if the microtask queue is empty.
    pub fn is_microtask_queue_empty(&self) -> bool {
        self.inner.microtasks.borrow().is_empty()
    }

    /// Returns the number of timers that have not fired or been cancelled.
    pub fn pending_timers(&self) -> usize {
        self.inner.timers.borrow().len()
    }

    /// Returns the tick mechanisms this loop offers a [`Scheduler`].
    ///
    /// [`Scheduler`]: crate::Scheduler
    pub fn host_ticks(&self) -> HostTicks {
        let tasks = self.clone();
        let microtasks = self.clone();
        HostTicks::new()
            .with_immediate(Rc::new(move |task| tasks.enqueue_task(task)))
            .with_microtask(Rc::new(move |task| microtasks.enqueue_microtask(task)))
            .with_timer(Rc::new(self.clone()))
    }

    /// Runs microtasks until the queue is empty, including microtasks queued
    /// along the way.
    pub fn run_all_microtasks(&self) {
        loop {
            let next = self.inner.microtasks.borrow_mut().dequeue();
            match next {
                Some(microtask) => microtask.run(),
                None => break,
            }
        }
    }

    /// Processes one turn: one task followed by all microtasks.
    pub fn process_one_cycle(&self) {
        let next = self.inner.tasks.borrow_mut().dequeue();
        if let Some(task) = next {
            task.run();
        }
        self.run_all_microtasks();
    }

    /// Runs tasks, microtasks and already-due timers until nothing is
    /// runnable without waiting.
    pub fn run_until_idle(&self) {
        loop {
            while !self.is_task_queue_empty() || !self.is_microtask_queue_empty() {
                self.process_one_cycle();
            }
            match self.next_deadline() {
                Some(deadline) if deadline <= self.now() => {
                    self.fire_next();
                }
                _ => break,
            }
        }
    }

    /// Runs until every queue is empty and every timer has fired, waiting for
    /// timer deadlines as needed.
    pub fn run_until_done(&self) {
        loop {
            self.run_until_idle();
            match self.next_deadline() {
                Some(deadline) => {
                    self.wait_until(deadline);
                    self.fire_next();
                }
                None => break,
            }
        }
    }

    /// Runs the loop for `duration`, firing every timer that falls due within
    /// it. On the virtual clock this is instantaneous.
    pub fn advance_by(&self, duration: Duration) {
        let target = self.now() + duration;
        loop {
            self.run_until_idle();
            match self.next_deadline() {
                Some(deadline) if deadline <= target => {
                    self.wait_until(deadline);
                    self.fire_next();
                }
                _ => break,
            }
        }
        self.wait_until(target);
        self.run_until_idle();
    }

    fn next_deadline(&self) -> Option<Duration> {
        self.inner
            .timers
            .borrow()
            .keys()
            .next()
            .map(|(deadline, _)| *deadline)
    }

    fn wait_until(&self, deadline: Duration) {
        match &self.inner.clock {
            Clock::Real(start) => {
                let now = start.elapsed();
                if deadline > now {
                    std::thread::sleep(deadline - now);
                }
            }
            Clock::Virtual(now) => {
                if deadline > now.get() {
                    now.set(deadline);
                }
            }
        }
    }

    fn fire_next(&self) {
        let entry = self.inner.timers.borrow_mut().pop_first();
        if let Some(((deadline, token), task)) = entry {
            trace!(token = token.0, deadline_ms = deadline.as_millis() as u64, "timer fired");
            task.run();
            self.run_all_microtasks();
        }
    }
}

impl Timer for EventLoop {
    fn set(&self, task: Task, delay: Duration) -> TimerToken {
        let token = TimerToken(self.inner.next_token.get());
        self.inner.next_token.set(token.0 + 1);
        let deadline = self.now() + delay;
        self.inner
            .timers
            .borrow_mut()
            .insert((deadline, token), task);
        token
    }

    fn cancel(&self, token: TimerToken) {
        self.inner
            .timers
            .borrow_mut()
            .retain(|(_, pending), _| *pending != token);
    }
}

impl std::fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLoop")
            .field("now", &self.now())
            .field("tasks", &self.inner.tasks.borrow().len())
            .field("microtasks", &self.inner.microtasks.borrow().len())
            .field("timers", &self.pending_timers())
            .finish()
    }
}
