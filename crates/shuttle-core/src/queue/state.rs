//! Mutable queue state: backlog, worker pool, counters.
//!
//! Everything here is touched under one `std::sync::Mutex`, and the lock is
//! never held across an `.await`.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::info;

use crate::config::WorkerSettings;
use crate::domain::{AveragePolicy, Statistics, StatsAccumulator, Task};
use crate::ports::UnitOfWork;
use crate::worker::{Worker, WorkerStatus};

/// What the drain loop should do next.
pub(crate) enum DrainStep {
    /// Head task paired with a reserved worker.
    Dispatch(Arc<Worker>, Task),

    /// Pool is full and every worker is busy. The head task stays put.
    Saturated,

    /// Backlog is empty.
    Drained,
}

pub(crate) struct QueueState {
    pub(crate) backlog: VecDeque<Task>,
    pub(crate) workers: Vec<Arc<Worker>>,
    pub(crate) stats: StatsAccumulator,
}

pub(crate) fn lock(state: &Mutex<QueueState>) -> MutexGuard<'_, QueueState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl QueueState {
    pub(crate) fn new(policy: AveragePolicy) -> Self {
        Self {
            backlog: VecDeque::new(),
            workers: Vec::new(),
            stats: StatsAccumulator::new(policy),
        }
    }

    /// Drop every deleted worker from the pool. Returns how many went.
    pub(crate) fn clear_deleted_workers(&mut self) -> usize {
        let before = self.workers.len();
        self.workers.retain(|worker| !worker.is_deleted());
        before - self.workers.len()
    }

    /// Grow the pool while under `max_workers`, otherwise reuse the first
    /// idle worker. The returned worker is already reserved (Busy).
    pub(crate) fn acquire_worker(
        &mut self,
        max_workers: usize,
        settings: &WorkerSettings,
        work: &Arc<dyn UnitOfWork>,
    ) -> Option<Arc<Worker>> {
        if self.workers.len() < max_workers {
            let worker = Arc::new(Worker::new(settings.clone(), Arc::clone(work)));
            if worker.reserve() {
                info!(worker_id = %worker.id(), pool_size = self.workers.len() + 1, "worker created");
                self.workers.push(Arc::clone(&worker));
                return Some(worker);
            }
        }

        self.workers.iter().find(|worker| worker.reserve()).cloned()
    }

    /// One drain step, decided atomically under the lock.
    pub(crate) fn next_step(
        &mut self,
        max_workers: usize,
        settings: &WorkerSettings,
        work: &Arc<dyn UnitOfWork>,
    ) -> DrainStep {
        self.clear_deleted_workers();

        let Some(task) = self.backlog.pop_front() else {
            return DrainStep::Drained;
        };

        match self.acquire_worker(max_workers, settings, work) {
            Some(worker) => DrainStep::Dispatch(worker, task),
            None => {
                // タスクは消費しない（先頭に戻す）
                self.backlog.push_front(task);
                DrainStep::Saturated
            }
        }
    }

    pub(crate) fn statistics(&self) -> Statistics {
        let (idle, hot) = self
            .workers
            .iter()
            .fold((0, 0), |(idle, hot), worker| match worker.status() {
                WorkerStatus::Idle => (idle + 1, hot),
                WorkerStatus::Busy => (idle, hot + 1),
                WorkerStatus::Deleted => (idle, hot),
            });
        self.stats.snapshot(self.backlog.len(), idle, hot)
    }
}
