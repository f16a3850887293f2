use serde::{Deserialize, Serialize};

use super::TaskId;
use crate::ports::WorkItem;

/// A unit of caller-submitted work.
///
/// Immutable once enqueued: the queue owns it while pending, a worker
/// borrows it while executing, and it is handed back to the listener with
/// the terminal report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    message: String,
}

impl Task {
    pub fn new(id: impl Into<TaskId>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            message: message.into(),
        }
    }

    pub fn id(&self) -> &TaskId {
        &self.id
    }

    /// Opaque payload.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl WorkItem for Task {
    fn work_id(&self) -> &str {
        self.id.as_str()
    }
}
