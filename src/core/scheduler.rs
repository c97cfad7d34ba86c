//! Task Scheduler
//!
//! One-shot scheduling interface for background renewal. Each schedule call
//! arms exactly one future execution; cancelling the handle (or arming a
//! replacement) invalidates the previous one.

use futures::future::BoxFuture;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::AbortHandle;

/// A unit of work to run once at the scheduled instant.
pub type ScheduledTask = BoxFuture<'static, ()>;

/// Handle to a scheduled execution. Dropping the handle does not cancel it.
#[derive(Clone)]
pub struct ScheduleHandle {
    cancelled: Arc<AtomicBool>,
    abort: Option<AbortHandle>,
}

impl ScheduleHandle {
    fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            abort: None,
        }
    }

    /// Cancel the scheduled execution. A cancelled task never runs, and a
    /// still-sleeping worker is torn down immediately rather than idling
    /// out its delay.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Some(abort) = &self.abort {
            abort.abort();
        }
    }

    /// Whether the execution has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Scheduler interface (for dependency injection).
pub trait TaskScheduler: Send + Sync {
    /// Run `task` once after `delay`, on a worker distinct from the caller.
    fn schedule_once(&self, delay: Duration, task: ScheduledTask) -> ScheduleHandle;
}

/// Default tokio-based scheduler.
#[derive(Default)]
pub struct TokioScheduler;

impl TokioScheduler {
    /// Create a new tokio scheduler.
    pub fn new() -> Self {
        Self
    }
}

impl TaskScheduler for TokioScheduler {
    fn schedule_once(&self, delay: Duration, task: ScheduledTask) -> ScheduleHandle {
        let mut handle = ScheduleHandle::new();
        let guard = handle.clone();

        // The flag covers a cancel racing an already-woken worker.
        let worker = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if guard.is_cancelled() {
                return;
            }
            task.await;
        });
        handle.abort = Some(worker.abort_handle());

        handle
    }
}

struct MockEntry {
    delay: Duration,
    handle: ScheduleHandle,
    task: Option<ScheduledTask>,
}

/// Mock scheduler for testing: records schedules, fires on demand.
#[derive(Default)]
pub struct MockScheduler {
    entries: Mutex<Vec<MockEntry>>,
}

impl MockScheduler {
    /// Create new mock scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays of all schedule calls, in order.
    pub fn delays(&self) -> Vec<Duration> {
        self.entries.lock().unwrap().iter().map(|e| e.delay).collect()
    }

    /// Delay of the most recent schedule call.
    pub fn last_delay(&self) -> Option<Duration> {
        self.entries.lock().unwrap().last().map(|e| e.delay)
    }

    /// Number of schedule calls so far.
    pub fn scheduled_count(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Run the next pending task inline, honouring cancellation.
    ///
    /// Returns `true` if a task executed.
    pub async fn fire_next(&self) -> bool {
        loop {
            let next = {
                let mut entries = self.entries.lock().unwrap();
                entries.iter_mut().find_map(|e| {
                    e.task.take().map(|task| (task, e.handle.clone()))
                })
            };

            match next {
                Some((task, handle)) => {
                    if handle.is_cancelled() {
                        continue;
                    }
                    task.await;
                    return true;
                }
                None => return false,
            }
        }
    }
}

impl TaskScheduler for MockScheduler {
    fn schedule_once(&self, delay: Duration, task: ScheduledTask) -> ScheduleHandle {
        let handle = ScheduleHandle::new();
        self.entries.lock().unwrap().push(MockEntry {
            delay,
            handle: handle.clone(),
            task: Some(task),
        });
        handle
    }
}
