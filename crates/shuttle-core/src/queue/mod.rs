//! Queue module: backlog, worker pool, drain loop and statistics.

pub(crate) mod state;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};

use self::state::{DrainStep, QueueState, lock};
use crate::app::ReaperLoop;
use crate::config::QueueConfig;
use crate::domain::{RunOutcome, Statistics, Task, TaskMetadata, TaskReport};
use crate::error::ShuttleError;
use crate::impls::SimulatedWork;
use crate::ports::{TaskListener, UnitOfWork};
use crate::worker::Worker;

/// Self-scaling in-process task queue.
///
/// Design:
/// - `add_task` only appends to the backlog; nothing runs until `process`.
/// - `process` drains the backlog one task at a time: each task's full
///   retry cycle finishes before the next task is dequeued, so completions
///   arrive in enqueue order.
/// - Workers are created on demand up to `max_workers` and delete
///   themselves after `idle_timeout`; deleted workers are reaped at the
///   start of every drain step and, if configured, by a `ReaperLoop`.
///
/// Share it as `Arc<TaskQueue>` when several callers need to trigger
/// `process`; a second concurrent call is a no-op.
pub struct TaskQueue {
    config: QueueConfig,
    work: Arc<dyn UnitOfWork>,
    listener: Arc<dyn TaskListener>,
    state: Arc<Mutex<QueueState>>,
    processing: AtomicBool,
    reaper: Mutex<Option<ReaperLoop>>,
}

/// Holds the processing flag; clears it on drop (including when the drain
/// future is cancelled).
struct ProcessingGuard<'a>(&'a AtomicBool);

impl<'a> ProcessingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// A reserved worker and a copy of its task while `execute` is pending.
///
/// Dropped while still armed (the drain future was cancelled): the task
/// goes back to the backlog head and the worker is released.
struct InFlight<'a> {
    state: &'a Mutex<QueueState>,
    worker: Arc<Worker>,
    task: Option<Task>,
}

impl<'a> InFlight<'a> {
    fn arm(state: &'a Mutex<QueueState>, worker: &Arc<Worker>, task: &Task) -> Self {
        Self {
            state,
            worker: Arc::clone(worker),
            task: Some(task.clone()),
        }
    }

    fn disarm(mut self) {
        self.task = None;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        warn!(worker_id = %self.worker.id(), task_id = %task.id(), "dispatch abandoned, requeueing");
        self.worker.release();
        lock(self.state).backlog.push_front(task);
    }
}

impl TaskQueue {
    /// Validate `config` and build the queue.
    ///
    /// If `worker_cleanup_interval` is set, a `ReaperLoop` is spawned, which
    /// requires a running tokio runtime (`ShuttleError::NoRuntime` otherwise).
    pub fn new(
        config: QueueConfig,
        work: Arc<dyn UnitOfWork>,
        listener: Arc<dyn TaskListener>,
    ) -> Result<Self, ShuttleError> {
        config.validate()?;

        let state = Arc::new(Mutex::new(QueueState::new(config.average_policy)));
        let reaper = match config.worker_cleanup_interval() {
            Some(interval) => Some(ReaperLoop::spawn(interval, Arc::downgrade(&state))?),
            None => None,
        };

        Ok(Self {
            config,
            work,
            listener,
            state,
            processing: AtomicBool::new(false),
            reaper: Mutex::new(reaper),
        })
    }

    /// Queue backed by `SimulatedWork`.
    pub fn simulated(
        config: QueueConfig,
        listener: Arc<dyn TaskListener>,
    ) -> Result<Self, ShuttleError> {
        Self::new(config, Arc::new(SimulatedWork::new()), listener)
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        lock(&self.state)
    }

    /// Append to the backlog tail. Duplicate ids are not checked.
    pub fn add_task(&self, task: Task) {
        debug!(task_id = %task.id(), "task enqueued");
        self.lock().backlog.push_back(task);
    }

    /// Append several tasks, keeping their order.
    pub fn add_tasks(&self, tasks: impl IntoIterator<Item = Task>) {
        self.lock().backlog.extend(tasks);
    }

    /// `true` while a drain loop is running.
    pub fn is_busy(&self) -> bool {
        self.processing.load(Ordering::Acquire)
    }

    pub fn worker_count(&self) -> usize {
        self.lock().workers.len()
    }

    pub fn statistics(&self) -> Statistics {
        self.lock().statistics()
    }

    /// Remove deleted workers from the pool. Returns how many were removed.
    pub fn clear_deleted_workers(&self) -> usize {
        let removed = self.lock().clear_deleted_workers();
        if removed > 0 {
            info!(removed, "cleared deleted workers");
        }
        removed
    }

    /// Stop the background reaper, if any. Idempotent.
    pub fn cleanup(&self) {
        let reaper = self
            .reaper
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        if let Some(reaper) = reaper {
            reaper.request_shutdown();
            info!("worker reaper released");
        }
    }

    /// Drain the backlog until it is empty.
    ///
    /// Returns immediately if another `process` call is already draining.
    /// Task failures never surface here; they go to the listener.
    pub async fn process(&self) {
        loop {
            let Some(guard) = ProcessingGuard::acquire(&self.processing) else {
                debug!("drain already in progress");
                return;
            };

            let dispatched = self.drain().await;
            drop(guard);

            // guard を外した後に積まれたタスクを取りこぼさない
            if self.lock().backlog.is_empty() {
                if dispatched > 0 {
                    info!(dispatched, "drain finished");
                }
                return;
            }
        }
    }

    async fn drain(&self) -> usize {
        let max_workers = self.config.max_workers.get();
        let settings = &self.config.worker_settings;
        let mut dispatched = 0;

        loop {
            let step = self.lock().next_step(max_workers, settings, &self.work);

            match step {
                DrainStep::Drained => return dispatched,
                DrainStep::Saturated => {
                    debug!(delay = ?self.config.no_workers_delay(), "no idle worker, backing off");
                    tokio::time::sleep(self.config.no_workers_delay()).await;
                }
                DrainStep::Dispatch(worker, task) => {
                    let metadata = TaskMetadata::for_dispatch(worker.id(), &task);
                    let in_flight = InFlight::arm(&self.state, &worker, &task);
                    let result = worker.execute(&task).await;
                    in_flight.disarm();

                    match result {
                        Ok(outcome) => {
                            dispatched += 1;
                            self.settle(&task, metadata, outcome);
                        }
                        Err(err) => {
                            // 予約後に外から delete された場合のみ。順序を保って先頭に戻す
                            warn!(error = %err, task_id = %task.id(), "dispatch rejected, requeueing");
                            self.lock().backlog.push_front(task);
                        }
                    }
                }
            }
        }
    }

    fn settle(&self, task: &Task, metadata: TaskMetadata, outcome: RunOutcome) {
        self.lock().stats.record(&outcome);

        let report = TaskReport::new(metadata, outcome.metadata());
        match outcome {
            RunOutcome::Completed(_) => self.listener.on_complete(task, &report),
            RunOutcome::Failed(_) => self.listener.on_fail(task, &report),
        }
    }
}

impl Drop for TaskQueue {
    fn drop(&mut self) {
        self.cleanup();
    }
}
