//! Delayed task scheduling
//!
//! Wraps "run this once after a delay, unless canceled" behind a trait. The
//! gate arms at most one task at a time; the scheduler itself is shared
//! infrastructure and accepts any number.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::debug;

/// Deferred unit of work handed to a [`Scheduler`].
pub type Task = Box<dyn FnOnce() + Send>;

/// Identifies one scheduled task for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskHandle(pub(crate) u64);

/// One-shot delayed execution with cancellation.
///
/// Implementations run each task at most once. Canceling a handle that
/// already fired or was already canceled is a no-op.
pub trait Scheduler: Send + Sync {
    /// Run `task` once after `delay`. The returned handle can cancel it.
    fn schedule(&self, delay: Duration, task: Task) -> TaskHandle;

    /// Cancel a scheduled task if it has not fired yet.
    fn cancel(&self, handle: TaskHandle);
}

/// Scheduler backed by tokio timers.
///
/// Each task becomes a spawned sleep tracked in a handle map, so canceling
/// aborts the sleep. Tasks must be scheduled from within a tokio runtime.
pub struct TokioScheduler {
    /// Spawned sleeps, keyed by handle id.
    tasks: DashMap<u64, JoinHandle<()>>,

    /// Next handle id.
    next_id: AtomicU64,
}

impl TokioScheduler {
    /// Create a new scheduler.
    pub fn new() -> Self {
        Self {
            tasks: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Number of tasks scheduled but not yet fired or canceled.
    pub fn pending_count(&self) -> usize {
        self.tasks
            .iter()
            .filter(|item| !item.value().is_finished())
            .count()
    }
}

impl Default for TokioScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: Task) -> TaskHandle {
        // Sweep handles of tasks that already ran.
        self.tasks.retain(|_, handle| !handle.is_finished());

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task();
        });
        self.tasks.insert(id, handle);
        debug!(
            task_id = id,
            delay_ms = delay.as_millis() as u64,
            "Scheduled delayed task"
        );
        TaskHandle(id)
    }

    fn cancel(&self, handle: TaskHandle) {
        if let Some((_, join)) = self.tasks.remove(&handle.0) {
            join.abort();
            debug!(task_id = handle.0, "Canceled delayed task");
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        // Abort anything still pending
        for item in self.tasks.iter() {
            item.value().abort();
        }
    }
}
