//! Per-execution run metadata.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// What a worker reports after its retry loop ends.
///
/// - `attempts`: how many times the unit of work was invoked (always >= 1)
/// - `processing_time`: wall time of the final attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMetadata {
    pub attempts: u32,

    #[serde(rename = "processingTimeMs", with = "super::duration_ms")]
    pub processing_time: Duration,
}

impl RunMetadata {
    pub fn new(attempts: u32, processing_time: Duration) -> Self {
        Self {
            attempts,
            processing_time,
        }
    }
}

/// Terminal result of one `Worker::execute` call.
///
/// Exactly one of these is produced per call, which is what lets the queue
/// fire exactly one of `on_complete` / `on_fail`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// An attempt succeeded.
    Completed(RunMetadata),

    /// Every attempt failed (`attempts == max_retries`).
    Failed(RunMetadata),
}

impl RunOutcome {
    pub fn metadata(&self) -> RunMetadata {
        match self {
            RunOutcome::Completed(meta) | RunOutcome::Failed(meta) => *meta,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Completed(_))
    }
}
