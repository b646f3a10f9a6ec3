//! Cancellable scheduled tasks for keystroke debouncing
//!
//! A [`Scheduler`] runs a task once after a delay and hands back a
//! [`TaskHandle`] that can cancel it. [`Debouncer`] keeps at most one pending
//! task: submitting a new one cancels the previous, so only the most recent
//! keystroke is ever searched.
//!
//! Two schedulers exist:
//! - [`TokioScheduler`]: spawns a `tokio::time::sleep` task on a runtime
//! - [`ManualScheduler`]: queues tasks until [`ManualScheduler::advance`]
//!   moves its virtual clock past their deadline

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::trace;

pub type Task = Box<dyn FnOnce() + Send + 'static>;

const PENDING: u8 = 0;
const RUNNING: u8 = 1;
const CANCELLED: u8 = 2;

/// Runs a task once after a delay
pub trait Scheduler: Send + Sync {
    fn schedule(&self, delay: Duration, task: Task) -> TaskHandle;
}

/// Handle to a scheduled task
///
/// The state moves from pending to either running or cancelled exactly once,
/// so a cancelled task can never start.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    state: Arc<AtomicU8>,
    abort: Option<tokio::task::AbortHandle>,
}

impl TaskHandle {
    fn new(abort: Option<tokio::task::AbortHandle>) -> Self {
        Self { state: Arc::new(AtomicU8::new(PENDING)), abort }
    }

    /// Cancel the task; returns `true` if it had not started yet
    pub fn cancel(&self) -> bool {
        let cancelled = self
            .state
            .compare_exchange(PENDING, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if cancelled {
            if let Some(ref abort) = self.abort {
                abort.abort();
            }
        }
        cancelled
    }

    pub fn is_pending(&self) -> bool {
        self.state.load(Ordering::Acquire) == PENDING
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.load(Ordering::Acquire) == CANCELLED
    }

    /// Claim the right to run; `false` once cancelled
    fn begin(&self) -> bool {
        self.state
            .compare_exchange(PENDING, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Scheduler backed by a tokio runtime
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    runtime: Handle,
}

impl TokioScheduler {
    pub fn new(runtime: Handle) -> Self {
        Self { runtime }
    }

    /// Scheduler on the runtime of the calling task
    pub fn current() -> Result<Self, tokio::runtime::TryCurrentError> {
        Handle::try_current().map(Self::new)
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: Task) -> TaskHandle {
        let state = Arc::new(AtomicU8::new(PENDING));
        let claim = TaskHandle { state: Arc::clone(&state), abort: None };

        let join = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if claim.begin() {
                task();
            } else {
                trace!("Scheduled task cancelled before it ran");
            }
        });

        TaskHandle { state, abort: Some(join.abort_handle()) }
    }
}

struct ManualEntry {
    due: Duration,
    handle: TaskHandle,
    task: Task,
}

/// Scheduler driven by an explicit virtual clock
#[derive(Default)]
pub struct ManualScheduler {
    elapsed: Mutex<Duration>,
    queue: Mutex<Vec<ManualEntry>>,
}

impl std::fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("elapsed", &*self.elapsed.lock())
            .field("queued", &self.queue.lock().len())
            .finish()
    }
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward and run every task now due, in deadline order
    ///
    /// Returns how many tasks ran.
    pub fn advance(&self, by: Duration) -> usize {
        let now = {
            let mut elapsed = self.elapsed.lock();
            *elapsed += by;
            *elapsed
        };

        let mut due: Vec<ManualEntry> = {
            let mut queue = self.queue.lock();
            let (ready, waiting): (Vec<_>, Vec<_>) = queue.drain(..).partition(|e| e.due <= now);
            *queue = waiting;
            ready
        };
        due.sort_by_key(|entry| entry.due);

        let mut ran = 0;
        for entry in due {
            if entry.handle.begin() {
                (entry.task)();
                ran += 1;
            }
        }
        ran
    }

    /// Tasks neither run nor cancelled
    pub fn pending(&self) -> usize {
        self.queue.lock().iter().filter(|e| e.handle.is_pending()).count()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, task: Task) -> TaskHandle {
        let handle = TaskHandle::new(None);
        let due = *self.elapsed.lock() + delay;
        self.queue.lock().push(ManualEntry { due, handle: handle.clone(), task });
        handle
    }
}

/// Keeps at most one pending task
pub struct Debouncer {
    scheduler: Arc<dyn Scheduler>,
    delay: Duration,
    pending: Mutex<Option<TaskHandle>>,
}

impl std::fmt::Debug for Debouncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debouncer")
            .field("delay", &self.delay)
            .field("pending", &self.is_pending())
            .finish()
    }
}

impl Debouncer {
    pub fn new(scheduler: Arc<dyn Scheduler>, delay: Duration) -> Self {
        Self { scheduler, delay, pending: Mutex::new(None) }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule `task`, cancelling the previous one
    ///
    /// Returns `true` when a still-pending task was superseded.
    pub fn submit<F>(&self, task: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let mut pending = self.pending.lock();
        let superseded = pending.take().is_some_and(|handle| handle.cancel());
        *pending = Some(self.scheduler.schedule(self.delay, Box::new(task)));
        superseded
    }

    /// Cancel the pending task, if any
    pub fn cancel(&self) -> bool {
        self.pending.lock().take().is_some_and(|handle| handle.cancel())
    }

    pub fn is_pending(&self) -> bool {
        self.pending.lock().as_ref().is_some_and(TaskHandle::is_pending)
    }
}
