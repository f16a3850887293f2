//! Lifetime statistics.
//!
//! `StatsAccumulator` は Queue のロックの内側で更新される。
//! `Statistics` は外に渡すスナップショット（読み取り専用）。

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::RunOutcome;

/// Which terminal runs feed the average processing time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AveragePolicy {
    /// Only successful completions are sampled.
    #[default]
    SuccessOnly,

    /// Successes and exhausted-retry failures are both sampled.
    AllTerminal,
}

/// Running counters, updated once per terminal outcome.
#[derive(Debug, Clone, Default)]
pub struct StatsAccumulator {
    policy: AveragePolicy,
    lifetime_task_counter: u64,
    number_of_task_tries: u64,
    success_count: u64,
    failure_count: u64,
    samples: u64,
    average_ms: f64,
}

impl StatsAccumulator {
    pub fn new(policy: AveragePolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn record(&mut self, outcome: &RunOutcome) {
        let meta = outcome.metadata();
        self.lifetime_task_counter += 1;
        self.number_of_task_tries += u64::from(meta.attempts);

        let sampled = match outcome {
            RunOutcome::Completed(_) => {
                self.success_count += 1;
                true
            }
            RunOutcome::Failed(_) => {
                self.failure_count += 1;
                self.policy == AveragePolicy::AllTerminal
            }
        };

        if sampled {
            // running mean: avg += (x - avg) / n
            self.samples += 1;
            let x = meta.processing_time.as_secs_f64() * 1000.0;
            self.average_ms += (x - self.average_ms) / self.samples as f64;
        }
    }

    pub fn success_count(&self) -> u64 {
        self.success_count
    }

    pub fn failure_count(&self) -> u64 {
        self.failure_count
    }

    /// Build a snapshot; queue/pool figures come from the caller.
    pub fn snapshot(
        &self,
        current_queue_length: usize,
        idle_workers: usize,
        hot_workers: usize,
    ) -> Statistics {
        Statistics {
            lifetime_task_counter: self.lifetime_task_counter,
            number_of_task_tries: self.number_of_task_tries,
            success_to_failure_ratio: self.success_count as f64
                / self.failure_count.max(1) as f64,
            average_processing_time_ms: self.average_ms,
            current_queue_length,
            idle_workers,
            hot_workers,
        }
    }
}

/// Point-in-time view returned by `TaskQueue::statistics`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub lifetime_task_counter: u64,
    pub number_of_task_tries: u64,
    pub success_to_failure_ratio: f64,
    pub average_processing_time_ms: f64,
    pub current_queue_length: usize,
    pub idle_workers: usize,
    pub hot_workers: usize,
}

impl Statistics {
    pub fn average_processing_time(&self) -> Duration {
        Duration::from_secs_f64(self.average_processing_time_ms.max(0.0) / 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::domain::RunMetadata;

    fn ok(attempts: u32, ms: u64) -> RunOutcome {
        RunOutcome::Completed(RunMetadata::new(attempts, Duration::from_millis(ms)))
    }

    fn failed(attempts: u32, ms: u64) -> RunOutcome {
        RunOutcome::Failed(RunMetadata::new(attempts, Duration::from_millis(ms)))
    }

    #[test]
    fn counters_follow_outcomes() {
        let mut acc = StatsAccumulator::new(AveragePolicy::SuccessOnly);
        acc.record(&ok(1, 10));
        acc.record(&ok(2, 30));
        acc.record(&failed(3, 5));

        let stats = acc.snapshot(4, 1, 0);
        assert_eq!(stats.lifetime_task_counter, 3);
        assert_eq!(stats.number_of_task_tries, 6);
        assert_eq!(
            stats.lifetime_task_counter,
            acc.success_count() + acc.failure_count()
        );
        assert_eq!(stats.current_queue_length, 4);
        assert_eq!(stats.idle_workers, 1);
        assert_eq!(stats.hot_workers, 0);
    }

    #[test]
    fn success_only_policy_ignores_failed_timing() {
        let mut acc = StatsAccumulator::new(AveragePolicy::SuccessOnly);
        acc.record(&ok(1, 10));
        acc.record(&ok(1, 30));
        acc.record(&failed(3, 1000));

        let stats = acc.snapshot(0, 0, 0);
        assert!((stats.average_processing_time_ms - 20.0).abs() < 1e-9);
        assert_eq!(stats.average_processing_time(), Duration::from_millis(20));
    }

    #[test]
    fn all_terminal_policy_samples_failures() {
        let mut acc = StatsAccumulator::new(AveragePolicy::AllTerminal);
        acc.record(&ok(1, 10));
        acc.record(&failed(3, 50));

        let stats = acc.snapshot(0, 0, 0);
        assert!((stats.average_processing_time_ms - 30.0).abs() < 1e-9);
    }

    #[rstest]
    #[case(0, 0, 0.0)]
    #[case(3, 0, 3.0)]
    #[case(3, 1, 3.0)]
    #[case(4, 2, 2.0)]
    #[case(1, 4, 0.25)]
    fn ratio_divides_by_at_least_one(
        #[case] successes: u32,
        #[case] failures: u32,
        #[case] expected: f64,
    ) {
        let mut acc = StatsAccumulator::new(AveragePolicy::default());
        for _ in 0..successes {
            acc.record(&ok(1, 1));
        }
        for _ in 0..failures {
            acc.record(&failed(1, 1));
        }
        let stats = acc.snapshot(0, 0, 0);
        assert!((stats.success_to_failure_ratio - expected).abs() < 1e-9);
    }

    #[test]
    fn statistics_use_camel_case_keys() {
        let stats = StatsAccumulator::default().snapshot(2, 1, 1);
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["currentQueueLength"], 2);
        assert_eq!(json["idleWorkers"], 1);
        assert_eq!(json["hotWorkers"], 1);
        assert_eq!(json["lifetimeTaskCounter"], 0);
    }
}
