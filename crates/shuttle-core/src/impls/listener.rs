//! TaskListener implementations.

use crate::domain::{Task, TaskReport};
use crate::ports::TaskListener;

/// Listener that ignores every callback.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopListener;

impl TaskListener for NoopListener {
    fn on_complete(&self, _task: &Task, _report: &TaskReport) {}

    fn on_fail(&self, _task: &Task, _report: &TaskReport) {}
}

/// Adapts a pair of closures into a `TaskListener`.
///
/// ```ignore
/// let listener = FnListener::new(
///     |task, report| println!("done {} in {:?}", task.id(), report.run.processing_time),
///     |task, report| eprintln!("gave up on {} after {}", task.id(), report.attempts()),
/// );
/// ```
pub struct FnListener<C, F> {
    on_complete: C,
    on_fail: F,
}

impl<C, F> FnListener<C, F>
where
    C: Fn(&Task, &TaskReport) + Send + Sync,
    F: Fn(&Task, &TaskReport) + Send + Sync,
{
    pub fn new(on_complete: C, on_fail: F) -> Self {
        Self {
            on_complete,
            on_fail,
        }
    }
}

impl<C, F> TaskListener for FnListener<C, F>
where
    C: Fn(&Task, &TaskReport) + Send + Sync,
    F: Fn(&Task, &TaskReport) + Send + Sync,
{
    fn on_complete(&self, task: &Task, report: &TaskReport) {
        (self.on_complete)(task, report)
    }

    fn on_fail(&self, task: &Task, report: &TaskReport) {
        (self.on_fail)(task, report)
    }
}
