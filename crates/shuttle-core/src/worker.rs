//! Worker: executes one task at a time with bounded retry.
//!
//! State transitions:
//! - Idle -> Busy      (`reserve` / `execute`; the idle timer is cancelled)
//! - Busy -> Idle      (retry loop ended, or an abandoned reservation is
//!                      released; the idle timer is re-armed)
//! - Idle -> Deleted   (idle timer fired, or `delete`)
//! - Busy -> Deleted   (`delete` while executing; the run still finishes)
//!
//! `Deleted` is terminal.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::WorkerSettings;
use crate::domain::{RunMetadata, RunOutcome, Task, WorkerId};
use crate::error::ShuttleError;
use crate::ports::UnitOfWork;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkerStatus {
    /// Ready for a task; the idle timer may be running.
    Idle,

    /// Reserved by the queue or running its retry loop.
    Busy,

    /// Expired or explicitly deleted. Never leaves this state.
    Deleted,
}

/// Owned handle to a spawned idle-expiry sleep. Dropping it cancels the timer.
struct IdleTimer(JoinHandle<()>);

impl Drop for IdleTimer {
    fn drop(&mut self) {
        self.0.abort();
    }
}

struct WorkerState {
    status: WorkerStatus,

    /// Bumped every time the timer is armed or cancelled. A timer that wakes
    /// up with a stale generation does nothing.
    generation: u64,

    idle_timer: Option<IdleTimer>,
}

impl WorkerState {
    fn cancel_idle_timer(&mut self) {
        self.generation += 1;
        self.idle_timer = None;
    }
}

fn lock(state: &Mutex<WorkerState>) -> MutexGuard<'_, WorkerState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct Worker {
    id: WorkerId,
    settings: WorkerSettings,
    work: Arc<dyn UnitOfWork>,

    // idle timer は Weak で参照する（Worker を drop したら timer も止まる）
    state: Arc<Mutex<WorkerState>>,
}

impl Worker {
    /// Create an idle worker. The idle timer is first armed after the
    /// first `execute`.
    pub fn new(settings: WorkerSettings, work: Arc<dyn UnitOfWork>) -> Self {
        Self {
            id: WorkerId::generate(),
            settings,
            work,
            state: Arc::new(Mutex::new(WorkerState {
                status: WorkerStatus::Idle,
                generation: 0,
                idle_timer: None,
            })),
        }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub fn status(&self) -> WorkerStatus {
        lock(&self.state).status
    }

    pub fn is_busy(&self) -> bool {
        self.status() == WorkerStatus::Busy
    }

    pub fn is_idle(&self) -> bool {
        self.status() == WorkerStatus::Idle
    }

    pub fn is_deleted(&self) -> bool {
        self.status() == WorkerStatus::Deleted
    }

    /// Atomically claim an idle worker for the next task.
    ///
    /// Returns `false` if the worker is busy or deleted. A successful
    /// reservation cancels the idle timer, so the worker cannot expire
    /// between being picked and being handed its task.
    pub fn reserve(&self) -> bool {
        let mut state = lock(&self.state);
        if state.status != WorkerStatus::Idle {
            return false;
        }
        state.status = WorkerStatus::Busy;
        state.cancel_idle_timer();
        true
    }

    /// Cancel the idle timer and mark the worker deleted. Idempotent.
    pub fn delete(&self) {
        let mut state = lock(&self.state);
        if state.status == WorkerStatus::Deleted {
            return;
        }
        state.status = WorkerStatus::Deleted;
        state.cancel_idle_timer();
        info!(worker_id = %self.id, "worker deleted");
    }

    /// Run `task` through the retry loop.
    ///
    /// Attempt failures are absorbed until `max_retries` attempts have been
    /// made; only the final outcome is returned. After the loop the worker
    /// goes back to idle and its idle timer is re-armed, whatever the
    /// outcome.
    ///
    /// Must be called from within a tokio runtime (the idle timer is a
    /// spawned task).
    pub async fn execute(&self, task: &Task) -> Result<RunOutcome, ShuttleError> {
        {
            let mut state = lock(&self.state);
            if state.status == WorkerStatus::Deleted {
                return Err(ShuttleError::WorkerDeleted(self.id));
            }
            state.status = WorkerStatus::Busy;
            state.cancel_idle_timer();
        }

        let outcome = self.run_with_retries(task).await;
        self.finish();
        Ok(outcome)
    }

    async fn run_with_retries(&self, task: &Task) -> RunOutcome {
        let max_retries = self.settings.max_retries.get();
        let time_to_complete = self.settings.time_to_complete();
        let failure_chance = self.settings.failure_chance;

        let mut attempts = 0;
        loop {
            let started = Instant::now();
            let result = self.work.run(task, time_to_complete, failure_chance).await;
            let processing_time = started.elapsed();
            attempts += 1;

            match result {
                Ok(()) => {
                    debug!(worker_id = %self.id, task_id = %task.id(), attempts, "task completed");
                    return RunOutcome::Completed(RunMetadata::new(attempts, processing_time));
                }
                Err(err) if attempts >= max_retries => {
                    warn!(
                        worker_id = %self.id,
                        task_id = %task.id(),
                        attempts,
                        error = %err,
                        "task failed, retries exhausted"
                    );
                    return RunOutcome::Failed(RunMetadata::new(attempts, processing_time));
                }
                Err(err) => {
                    debug!(worker_id = %self.id, task_id = %task.id(), attempts, error = %err, "attempt failed, retrying");
                }
            }
        }
    }

    /// Hand a reserved worker back to the pool without running anything.
    ///
    /// Used when a dispatch is abandoned (the drain future was dropped while
    /// `execute` was pending). Busy -> Idle with a fresh idle timer.
    pub(crate) fn release(&self) {
        self.finish();
    }

    fn finish(&self) {
        let mut state = lock(&self.state);
        // delete() が実行中に呼ばれていたら Deleted のまま（単調）
        if state.status != WorkerStatus::Busy {
            return;
        }
        state.status = WorkerStatus::Idle;
        self.arm_idle_timer(&mut state);
    }

    fn arm_idle_timer(&self, state: &mut WorkerState) {
        state.generation += 1;
        let generation = state.generation;
        let weak: Weak<Mutex<WorkerState>> = Arc::downgrade(&self.state);
        let timeout = self.settings.idle_timeout();
        let id = self.id;

        // runtime の外（shutdown 中の drop など）ではタイマーを張れないので削除扱い
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            state.status = WorkerStatus::Deleted;
            state.idle_timer = None;
            info!(worker_id = %id, "no runtime for idle timer, worker deleted");
            return;
        };

        let handle = runtime.spawn(async move {
            tokio::time::sleep(timeout).await;

            let Some(state) = weak.upgrade() else {
                return;
            };
            let mut state = lock(&state);
            if state.status == WorkerStatus::Idle && state.generation == generation {
                state.status = WorkerStatus::Deleted;
                // 発火済みの自分の handle を外す
                let _expired = state.idle_timer.take();
                info!(worker_id = %id, ?timeout, "idle worker expired");
            }
        });

        state.idle_timer = Some(IdleTimer(handle));
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id)
            .field("status", &self.status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU32;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use super::*;
    use crate::impls::scripted::ScriptedWork;

    fn settings(time_to_complete: u64, max_retries: u32, idle_timeout: u64) -> WorkerSettings {
        WorkerSettings {
            time_to_complete,
            failure_chance: 0,
            max_retries: NonZeroU32::new(max_retries).unwrap(),
            idle_timeout,
        }
    }

    #[test]
    fn new_worker_is_idle() {
        let worker = Worker::new(settings(0, 3, 50), Arc::new(ScriptedWork::always_ok()));
        assert!(worker.is_idle());
        assert!(!worker.is_busy());
        assert!(!worker.is_deleted());
        assert!(worker.id().to_string().starts_with("worker-"));
    }

    #[tokio::test(start_paused = true)]
    async fn success_on_first_attempt() {
        let work = Arc::new(ScriptedWork::always_ok());
        let worker = Worker::new(settings(100, 3, 1_000), work.clone());

        let outcome = worker.execute(&Task::new("a", "m")).await.unwrap();

        assert!(outcome.is_success());
        assert_eq!(outcome.metadata().attempts, 1);
        assert!(outcome.metadata().processing_time >= Duration::from_millis(100));
        assert_eq!(work.calls.load(Ordering::SeqCst), 1);
        assert!(worker.is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn always_failing_task_uses_every_retry() {
        let work = Arc::new(ScriptedWork::always_fail());
        let worker = Worker::new(settings(0, 4, 1_000), work.clone());

        let outcome = worker.execute(&Task::new("a", "m")).await.unwrap();

        assert_eq!(outcome, RunOutcome::Failed(outcome.metadata()));
        assert_eq!(outcome.metadata().attempts, 4);
        assert_eq!(work.calls.load(Ordering::SeqCst), 4);
        assert!(worker.is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_absorbed() {
        let work = Arc::new(ScriptedWork::fail_first(2));
        let worker = Worker::new(settings(0, 3, 1_000), work);

        let outcome = worker.execute(&Task::new("a", "m")).await.unwrap();

        assert!(outcome.is_success());
        assert_eq!(outcome.metadata().attempts, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn single_retry_budget_fails_fast() {
        let worker = Worker::new(settings(0, 1, 1_000), Arc::new(ScriptedWork::fail_first(1)));

        let outcome = worker.execute(&Task::new("a", "m")).await.unwrap();

        assert!(!outcome.is_success());
        assert_eq!(outcome.metadata().attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn busy_while_executing() {
        let worker = Arc::new(Worker::new(
            settings(100, 1, 1_000),
            Arc::new(ScriptedWork::always_ok()),
        ));

        let running = tokio::spawn({
            let worker = worker.clone();
            async move { worker.execute(&Task::new("a", "m")).await }
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(worker.is_busy());
        assert!(!worker.reserve());

        running.await.unwrap().unwrap();
        assert!(worker.is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn idle_timeout_deletes_worker() {
        let worker = Worker::new(settings(0, 1, 50), Arc::new(ScriptedWork::always_ok()));
        worker.execute(&Task::new("a", "m")).await.unwrap();

        tokio::time::sleep(Duration::from_millis(49)).await;
        assert!(worker.is_idle());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert!(worker.is_deleted());
    }

    #[tokio::test(start_paused = true)]
    async fn new_execute_restarts_idle_timer() {
        let worker = Worker::new(settings(0, 1, 50), Arc::new(ScriptedWork::always_ok()));
        worker.execute(&Task::new("a", "m")).await.unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        worker.execute(&Task::new("b", "m")).await.unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(worker.is_idle(), "first timer must have been cancelled");

        tokio::time::sleep(Duration::from_millis(25)).await;
        assert!(worker.is_deleted());
    }

    #[tokio::test(start_paused = true)]
    async fn reservation_cancels_idle_timer() {
        let worker = Worker::new(settings(0, 1, 50), Arc::new(ScriptedWork::always_ok()));
        worker.execute(&Task::new("a", "m")).await.unwrap();

        assert!(worker.reserve());
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(worker.is_busy());
    }

    #[tokio::test]
    async fn deleted_worker_rejects_tasks() {
        let worker = Worker::new(settings(0, 1, 50), Arc::new(ScriptedWork::always_ok()));
        worker.delete();
        worker.delete();
        assert!(worker.is_deleted());
        assert!(!worker.reserve());

        let err = worker.execute(&Task::new("a", "m")).await.unwrap_err();
        assert!(matches!(err, ShuttleError::WorkerDeleted(id) if id == worker.id()));
    }

    #[tokio::test(start_paused = true)]
    async fn released_worker_becomes_idle_and_can_expire() {
        let worker = Worker::new(settings(0, 1, 50), Arc::new(ScriptedWork::always_ok()));
        assert!(worker.reserve());

        worker.release();
        assert!(worker.is_idle());

        tokio::time::sleep(Duration::from_millis(51)).await;
        assert!(worker.is_deleted());
    }

    #[test]
    fn release_outside_runtime_deletes_worker() {
        let worker = Worker::new(settings(0, 1, 50), Arc::new(ScriptedWork::always_ok()));
        assert!(worker.reserve());

        worker.release();
        assert!(worker.is_deleted());
    }

    #[tokio::test]
    async fn release_keeps_deleted_worker_deleted() {
        let worker = Worker::new(settings(0, 1, 50), Arc::new(ScriptedWork::always_ok()));
        worker.delete();
        worker.release();
        assert!(worker.is_deleted());
    }

    #[tokio::test(start_paused = true)]
    async fn delete_during_execution_is_not_undone() {
        let worker = Arc::new(Worker::new(
            settings(100, 1, 1_000),
            Arc::new(ScriptedWork::always_ok()),
        ));

        let running = tokio::spawn({
            let worker = worker.clone();
            async move { worker.execute(&Task::new("a", "m")).await }
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        worker.delete();

        let outcome = running.await.unwrap().unwrap();
        assert!(outcome.is_success());
        assert!(worker.is_deleted());
    }
}
