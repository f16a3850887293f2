//! TaskListener port - 終端コールバック（onComplete / onFail）

use crate::domain::{Task, TaskReport};

/// Receives exactly one terminal callback per dispatched task.
///
/// Called from the drain loop after the queue's own counters are updated.
/// Implementations should return quickly; the next task is not dispatched
/// until the callback returns.
pub trait TaskListener: Send + Sync {
    fn on_complete(&self, task: &Task, report: &TaskReport);

    fn on_fail(&self, task: &Task, report: &TaskReport);
}
