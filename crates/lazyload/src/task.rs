//! A single fetch attempt and its lifecycle.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

const PENDING: u8 = 0;
const RUNNING: u8 = 1;
const COMPLETED: u8 = 2;
const FAILED: u8 = 3;
const CANCELLED: u8 = 4;

/// The lifecycle state of a [`Task`].
///
/// States advance `Pending → Running → {Completed, Failed, Cancelled}`.
/// Terminal states are sticky; there are no transitions out of them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskState {
    /// Created but not yet picked up by a worker.
    Pending,
    /// The fetch body is executing on a worker.
    Running,
    /// The fetch finished and its result was queued for delivery.
    Completed,
    /// The fetch failed and its error was queued for delivery.
    Failed,
    /// The task was superseded before finishing; its result is discarded.
    Cancelled,
}

impl TaskState {
    /// True for `Completed`, `Failed` and `Cancelled`.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed | TaskState::Cancelled
        )
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            PENDING => TaskState::Pending,
            RUNNING => TaskState::Running,
            COMPLETED => TaskState::Completed,
            FAILED => TaskState::Failed,
            _ => TaskState::Cancelled,
        }
    }
}

/// One fetch attempt, owned by the [`TaskSlot`](crate::slot::TaskSlot) that
/// created it.
///
/// The task itself carries no payload; it is the bookkeeping handle used to
/// decide whether a result that arrives from a worker is still wanted.
#[derive(Debug)]
pub struct Task {
    generation: u64,
    state: AtomicU8,
    cancelled: Arc<AtomicBool>,
}

impl Task {
    pub(crate) fn new(generation: u64) -> Self {
        Task {
            generation,
            state: AtomicU8::new(PENDING),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The monotonically increasing number this task was installed under.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The current lifecycle state.
    pub fn state(&self) -> TaskState {
        TaskState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// True once the task has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.state().is_terminal()
    }

    /// A token for the cooperative cancellation checks inside the fetch body.
    pub fn token(&self) -> CancelToken {
        CancelToken(Arc::clone(&self.cancelled))
    }

    /// Cooperatively cancels the task unless it already reached a terminal
    /// state.
    ///
    /// The underlying fetch may still run to completion in the background;
    /// its result will fail [`try_finish`](Self::try_finish) and be
    /// discarded.
    pub(crate) fn cancel(&self) {
        loop {
            let current = self.state.load(Ordering::Acquire);
            if TaskState::from_u8(current).is_terminal() {
                return;
            }
            self.cancelled.store(true, Ordering::Release);
            if self
                .state
                .compare_exchange(current, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return;
            }
        }
    }

    pub(crate) fn mark_running(&self) {
        let _ = self
            .state
            .compare_exchange(PENDING, RUNNING, Ordering::AcqRel, Ordering::Acquire);
    }

    /// Transitions into `Completed` or `Failed`.
    ///
    /// Returns `false` when the task was cancelled in the meantime, in which
    /// case the caller must discard the result without delivering it.
    pub(crate) fn try_finish(&self, success: bool) -> bool {
        let target = if success { COMPLETED } else { FAILED };
        self.state
            .compare_exchange(RUNNING, target, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// A shared flag the fetch body checks before each side-effecting step.
///
/// Cancellation is cooperative only: the flag flipping does not stop the
/// underlying work, it merely tells it that nobody wants the result anymore.
#[derive(Clone, Debug)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A standalone token that is never cancelled.
    ///
    /// Useful when calling [`resolve`](crate::fetch::resolve) outside of a
    /// slot.
    pub fn new() -> Self {
        CancelToken(Arc::new(AtomicBool::new(false)))
    }

    /// True once the owning task has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
