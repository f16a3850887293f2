//! Deterministic test doubles.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{Task, TaskId, TaskReport};
use crate::error::ExecutionError;
use crate::ports::{TaskListener, UnitOfWork, WorkItem};

/// Sleeps `time_to_complete`, then fails the first `failures` calls
/// (per work id) and succeeds afterwards.
///
/// `failing_ids` always fail regardless of the counter.
pub(crate) struct ScriptedWork {
    failures: u32,
    failing_ids: Vec<String>,
    seen: Mutex<HashMap<String, u32>>,
    pub(crate) calls: AtomicU32,
}

impl ScriptedWork {
    pub(crate) fn always_ok() -> Self {
        Self::fail_first(0)
    }

    pub(crate) fn always_fail() -> Self {
        Self::fail_first(u32::MAX)
    }

    pub(crate) fn fail_first(failures: u32) -> Self {
        Self {
            failures,
            failing_ids: Vec::new(),
            seen: Mutex::new(HashMap::new()),
            calls: AtomicU32::new(0),
        }
    }

    pub(crate) fn failing_ids(ids: &[&str]) -> Self {
        Self {
            failing_ids: ids.iter().map(|s| s.to_string()).collect(),
            ..Self::always_ok()
        }
    }
}

#[async_trait]
impl UnitOfWork for ScriptedWork {
    async fn run(
        &self,
        item: &dyn WorkItem,
        time_to_complete: Duration,
        _failure_chance: u8,
    ) -> Result<(), ExecutionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(time_to_complete).await;

        let id = item.work_id().to_string();
        if self.failing_ids.contains(&id) {
            return Err(ExecutionError::new(format!("{id} always fails")));
        }

        let mut seen = self.seen.lock().unwrap();
        let count = seen.entry(id.clone()).or_insert(0);
        *count += 1;
        if *count <= self.failures {
            return Err(ExecutionError::new(format!("{id} failed attempt {count}")));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Event {
    Completed(TaskId, u32),
    Failed(TaskId, u32),
}

/// Records every callback in arrival order.
#[derive(Default)]
pub(crate) struct RecordingListener {
    pub(crate) events: Mutex<Vec<Event>>,
    pub(crate) reports: Mutex<Vec<TaskReport>>,
}

impl RecordingListener {
    pub(crate) fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub(crate) fn reports(&self) -> Vec<TaskReport> {
        self.reports.lock().unwrap().clone()
    }
}

impl TaskListener for RecordingListener {
    fn on_complete(&self, task: &Task, report: &TaskReport) {
        self.events
            .lock()
            .unwrap()
            .push(Event::Completed(task.id().clone(), report.attempts()));
        self.reports.lock().unwrap().push(report.clone());
    }

    fn on_fail(&self, task: &Task, report: &TaskReport) {
        self.events
            .lock()
            .unwrap()
            .push(Event::Failed(task.id().clone(), report.attempts()));
        self.reports.lock().unwrap().push(report.clone());
    }
}
