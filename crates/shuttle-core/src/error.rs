use std::path::PathBuf;

use thiserror::Error;

use crate::domain::WorkerId;

#[derive(Debug, Error)]
pub enum ShuttleError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to read config file {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("no tokio runtime available to spawn the worker reaper")]
    NoRuntime,

    #[error("worker {0} is deleted and cannot accept tasks")]
    WorkerDeleted(WorkerId),
}

/// A single failed attempt reported by a unit of work.
///
/// Transient by definition: the worker absorbs it and retries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ExecutionError(String);

impl ExecutionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
