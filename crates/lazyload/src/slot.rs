//! The per-consumer single-flight coordinator.
//!
//! A [`TaskSlot`] owns at most one outstanding fetch. Installing a new task
//! atomically retires the previous one: the old task is cancelled and its
//! result, should it still arrive from the worker, is discarded without a
//! callback. Terminal results of tasks that were still current when they
//! finished are queued in FIFO order and handed back to the control context
//! through [`next_completed`](TaskSlot::next_completed) /
//! [`try_completed`](TaskSlot::try_completed).
//!
//! Two submission flavors cover the two consumer behaviors built on top of
//! this:
//!
//! - [`submit`](TaskSlot::submit) cancels and replaces whatever is in flight
//!   (last-writer-wins, used for keyed resource loading), while
//! - [`submit_if_idle`](TaskSlot::submit_if_idle) drops the new request on
//!   the floor while a task is still running (used for paging, where a
//!   duplicate "load more" is noise rather than fresher intent).

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::fetch::FetchError;
use crate::task::{CancelToken, Task};

/// A terminal result queued for delivery on the control context.
#[derive(Debug)]
pub struct Completion<T> {
    /// The generation of the task that produced this result.
    pub generation: u64,
    /// The fetch outcome.
    pub outcome: Result<T, FetchError>,
}

/// Coordinates at most one in-flight fetch for a single consumer.
///
/// Submissions happen from a single control context; completions arrive from
/// workers and are re-delivered on the control context. See the [module
/// docs](self) for the semantics.
pub struct TaskSlot<T> {
    runtime: tokio::runtime::Handle,
    generation: AtomicU64,
    current: Mutex<Option<Arc<Task>>>,
    completions_tx: mpsc::UnboundedSender<Completion<T>>,
    completions_rx: mpsc::UnboundedReceiver<Completion<T>>,
}

impl<T> fmt::Debug for TaskSlot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let current = self
            .current
            .try_lock()
            .map(|task| task.as_ref().map(|t| t.state()))
            .unwrap_or_default();
        f.debug_struct("TaskSlot")
            .field("generation", &self.generation.load(Ordering::Relaxed))
            .field("current", &current)
            .finish()
    }
}

impl<T: Send + 'static> TaskSlot<T> {
    /// Creates a slot that spawns its work on the given runtime.
    pub fn new(runtime: tokio::runtime::Handle) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        TaskSlot {
            runtime,
            generation: AtomicU64::new(0),
            current: Mutex::new(None),
            completions_tx,
            completions_rx,
        }
    }

    /// Cancel-and-replace submission.
    ///
    /// Any task still in flight is cancelled, a fresh task is installed as
    /// current, `pre` is invoked synchronously on the submitting context, and
    /// only then is the work spawned on a worker.
    pub fn submit<P, W, F>(&self, pre: P, work: W) -> Arc<Task>
    where
        P: FnOnce(),
        W: FnOnce(CancelToken) -> F,
        F: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        let task = {
            let mut current = self.current.lock().unwrap();
            if let Some(previous) = current.take() {
                previous.cancel();
            }
            let task = Arc::new(Task::new(self.next_generation()));
            *current = Some(Arc::clone(&task));
            task
        };

        pre();
        self.spawn(Arc::clone(&task), work(task.token()));
        task
    }

    /// Drop-while-busy submission.
    ///
    /// Accepted only when no task is installed or the current one already
    /// reached a terminal state. Otherwise this is a no-op returning `None`:
    /// no task is created, `pre` is not invoked and no work is spawned.
    pub fn submit_if_idle<P, W, F>(&self, pre: P, work: W) -> Option<Arc<Task>>
    where
        P: FnOnce(),
        W: FnOnce(CancelToken) -> F,
        F: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        let task = {
            let mut current = self.current.lock().unwrap();
            if let Some(task) = current.as_ref() {
                if !task.is_terminal() {
                    tracing::trace!(
                        generation = task.generation(),
                        "dropping submission, slot is busy"
                    );
                    return None;
                }
            }
            let task = Arc::new(Task::new(self.next_generation()));
            *current = Some(Arc::clone(&task));
            task
        };

        pre();
        self.spawn(Arc::clone(&task), work(task.token()));
        Some(task)
    }

    /// True when no task is installed or the current one is terminal.
    pub fn is_idle(&self) -> bool {
        self.current
            .lock()
            .unwrap()
            .as_ref()
            .is_none_or(|task| task.is_terminal())
    }

    /// The task currently installed, if any.
    pub fn current_task(&self) -> Option<Arc<Task>> {
        self.current.lock().unwrap().clone()
    }

    /// Awaits the next terminal result.
    ///
    /// Results arrive in the order their tasks were installed; superseded
    /// tasks never produce one.
    pub async fn next_completed(&mut self) -> Completion<T> {
        match self.completions_rx.recv().await {
            Some(completion) => completion,
            // The slot holds its own sender, so the channel can not close.
            None => unreachable!("completion channel closed"),
        }
    }

    /// Returns the next terminal result without waiting, if one is queued.
    pub fn try_completed(&mut self) -> Option<Completion<T>> {
        self.completions_rx.try_recv().ok()
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn spawn<F>(&self, task: Arc<Task>, work: F)
    where
        F: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        let completions = self.completions_tx.clone();
        self.runtime.spawn(async move {
            task.mark_running();
            let outcome = work.await;

            // A task superseded mid-flight loses this transition; its result
            // is dropped here without a callback.
            if task.try_finish(outcome.is_ok()) {
                let _ = completions.send(Completion {
                    generation: task.generation(),
                    outcome,
                });
            } else {
                tracing::trace!(
                    generation = task.generation(),
                    "discarding result of superseded task"
                );
            }
        });
    }
}
