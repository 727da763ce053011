//! Host timer capability.

use std::time::Duration;

use crate::task_queue::Task;

/// Handle to a pending timer, used for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerToken(pub u64);

/// A host facility that runs a task after a delay.
///
/// Timers fire in deadline order; timers sharing a deadline fire in the order
/// they were set. Cancelling a fired or unknown token is a no-op.
pub trait Timer {
    /// Schedules `task` to run once `delay` has elapsed.
    fn set(&self, task: Task, delay: Duration) -> TimerToken;

    /// Cancels a pending timer.
    fn cancel(&self, token: TimerToken);
}
