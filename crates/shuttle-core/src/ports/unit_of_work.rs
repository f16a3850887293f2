//! UnitOfWork port - 実際の仕事をする部分の抽象化
//!
//! Worker は「どう実行するか」を知らない。リトライ・計測・状態遷移だけを担当し、
//! 1 回の試行はこの trait に委譲する。

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ExecutionError;

/// The narrow view of a task that a unit of work receives.
///
/// Only an identifier is required, so executors can be reused outside the
/// queue's own `Task` type.
pub trait WorkItem: Send + Sync {
    fn work_id(&self) -> &str;
}

impl WorkItem for &str {
    fn work_id(&self) -> &str {
        self
    }
}

/// One attempt at doing the actual work.
///
/// `time_to_complete` and `failure_chance` come straight from
/// `WorkerSettings`; an implementation may ignore them.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    async fn run(
        &self,
        item: &dyn WorkItem,
        time_to_complete: Duration,
        failure_chance: u8,
    ) -> Result<(), ExecutionError>;
}
