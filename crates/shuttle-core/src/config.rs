//! Queue and worker configuration.
//!
//! JSON のキーは camelCase（`maxWorkers`, `workerSettings.timeToComplete` など）。
//! 時間はすべてミリ秒の整数で受け取り、`Duration` のアクセサで使う。

use std::num::{NonZeroU32, NonZeroUsize};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::AveragePolicy;
use crate::error::ShuttleError;

/// Settings forwarded verbatim to every worker the queue creates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkerSettings {
    /// Simulated latency of one attempt (ms).
    pub time_to_complete: u64,

    /// Percent chance (0..=100) that one attempt fails.
    pub failure_chance: u8,

    /// Attempts per task; zero is unrepresentable.
    pub max_retries: NonZeroU32,

    /// How long an idle worker survives before deleting itself (ms).
    pub idle_timeout: u64,
}

impl WorkerSettings {
    pub fn time_to_complete(&self) -> Duration {
        Duration::from_millis(self.time_to_complete)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout)
    }

    pub fn validate(&self) -> Result<(), ShuttleError> {
        if self.failure_chance > 100 {
            return Err(ShuttleError::InvalidConfig(format!(
                "failureChance must be within 0..=100, got {}",
                self.failure_chance
            )));
        }
        Ok(())
    }
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            time_to_complete: 1000,
            failure_chance: 10,
            max_retries: NonZeroU32::new(3).unwrap_or(NonZeroU32::MIN),
            idle_timeout: 5000,
        }
    }
}

/// Everything `TaskQueue::new` needs apart from the injected capabilities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueueConfig {
    /// Pool capacity ceiling.
    pub max_workers: NonZeroUsize,

    pub worker_settings: WorkerSettings,

    /// Backoff when the pool is saturated (ms).
    pub no_workers_delay: u64,

    /// Period of the background reaper (ms). `None` disables it.
    pub worker_cleanup_interval: Option<u64>,

    pub average_policy: AveragePolicy,
}

impl QueueConfig {
    /// Load a config from a JSON file. Missing keys fall back to defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ShuttleError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ShuttleError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self, ShuttleError> {
        let config: QueueConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ShuttleError> {
        self.worker_settings.validate()?;
        if self.worker_cleanup_interval == Some(0) {
            return Err(ShuttleError::InvalidConfig(
                "workerCleanupInterval must be positive when set".to_string(),
            ));
        }
        Ok(())
    }

    pub fn no_workers_delay(&self) -> Duration {
        Duration::from_millis(self.no_workers_delay)
    }

    pub fn worker_cleanup_interval(&self) -> Option<Duration> {
        self.worker_cleanup_interval.map(Duration::from_millis)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_workers: NonZeroUsize::new(4).unwrap_or(NonZeroUsize::MIN),
            worker_settings: WorkerSettings::default(),
            no_workers_delay: 100,
            worker_cleanup_interval: Some(10_000),
            average_policy: AveragePolicy::SuccessOnly,
        }
    }
}
