//! Domain model: tasks, ids, run metadata, statistics.

pub mod attempt;
pub mod duration_ms;
pub mod envelope;
pub mod ids;
pub mod stats;
pub mod task;

pub use attempt::{RunMetadata, RunOutcome};
pub use envelope::{TaskMetadata, TaskReport};
pub use ids::{TaskId, WorkerId};
pub use stats::{AveragePolicy, Statistics, StatsAccumulator};
pub use task::Task;
