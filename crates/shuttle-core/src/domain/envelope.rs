//! Dispatch envelope and the report handed to listeners.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{RunMetadata, Task, TaskId, WorkerId};

/// Identifying fields captured when a task is paired with a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskMetadata {
    pub worker_id: WorkerId,

    /// When the task was dispatched.
    pub timestamp: DateTime<Utc>,

    pub task_id: TaskId,
    pub task_message: String,
}

impl TaskMetadata {
    pub fn for_dispatch(worker_id: WorkerId, task: &Task) -> Self {
        Self {
            worker_id,
            timestamp: Utc::now(),
            task_id: task.id().clone(),
            task_message: task.message().to_string(),
        }
    }
}

/// `TaskMetadata` merged with the worker's `RunMetadata`.
///
/// Serializes flat:
/// `{workerId, timestamp, taskId, taskMessage, attempts, processingTimeMs}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskReport {
    #[serde(flatten)]
    pub task: TaskMetadata,

    #[serde(flatten)]
    pub run: RunMetadata,
}

impl TaskReport {
    pub fn new(task: TaskMetadata, run: RunMetadata) -> Self {
        Self { task, run }
    }

    pub fn attempts(&self) -> u32 {
        self.run.attempts
    }
}
