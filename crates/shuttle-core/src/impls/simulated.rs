//! SimulatedWork - sleep してから確率的に失敗する UnitOfWork

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tracing::debug;

use crate::error::ExecutionError;
use crate::ports::{UnitOfWork, WorkItem};

/// Succeeds after `time_to_complete` with probability
/// `(100 - failure_chance) / 100`, otherwise fails.
///
/// Randomness comes from `rand::thread_rng`; it is not meant to be
/// cryptographically strong.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedWork;

impl SimulatedWork {
    pub fn new() -> Self {
        Self
    }

    fn roll_fails(failure_chance: u8) -> bool {
        let roll: u8 = rand::thread_rng().gen_range(0..100);
        roll < failure_chance
    }
}

#[async_trait]
impl UnitOfWork for SimulatedWork {
    async fn run(
        &self,
        item: &dyn WorkItem,
        time_to_complete: Duration,
        failure_chance: u8,
    ) -> Result<(), ExecutionError> {
        tokio::time::sleep(time_to_complete).await;

        if Self::roll_fails(failure_chance) {
            debug!(work_id = item.work_id(), "simulated attempt failed");
            return Err(ExecutionError::new(format!(
                "simulated failure for {}",
                item.work_id()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn zero_failure_chance_always_succeeds() {
        let work = SimulatedWork::new();
        for _ in 0..50 {
            work.run(&"a", Duration::from_millis(10), 0).await.unwrap();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn full_failure_chance_always_fails() {
        let work = SimulatedWork::new();
        for _ in 0..50 {
            let err = work.run(&"a", Duration::ZERO, 100).await.unwrap_err();
            assert!(err.to_string().contains("a"));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn waits_for_time_to_complete() {
        let start = tokio::time::Instant::now();
        SimulatedWork::new()
            .run(&"a", Duration::from_millis(250), 0)
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_millis(250));
    }
}
