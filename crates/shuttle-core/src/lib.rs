//! shuttle-core
//!
//! A self-scaling in-process task queue.
//!
//! Callers submit identified tasks; a bounded pool of workers runs them one
//! at a time, retries transient failures, grows with demand and deletes
//! workers that stay idle past a timeout.
//!
//! # モジュール構成
//! - **domain**: Task, ids, RunMetadata, TaskReport, Statistics
//! - **config**: QueueConfig / WorkerSettings（JSON から読み込み可能）
//! - **ports**: 差し替え可能な能力（UnitOfWork, TaskListener）
//! - **impls**: ports の実装（SimulatedWork, FnListener）
//! - **worker**: Idle / Busy / Deleted の状態機械とリトライ
//! - **queue**: backlog + worker pool + drain loop + 統計
//! - **app**: バックグラウンドループ（ReaperLoop）
//!
//! ```ignore
//! let queue = Arc::new(TaskQueue::simulated(QueueConfig::default(), Arc::new(NoopListener))?);
//! queue.add_task(Task::new("a", "hello"));
//! queue.process().await;
//! println!("{:?}", queue.statistics());
//! queue.cleanup();
//! ```

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod impls;
pub mod ports;
pub mod queue;
pub mod worker;

pub use config::{QueueConfig, WorkerSettings};
pub use domain::{
    AveragePolicy, RunMetadata, RunOutcome, Statistics, Task, TaskId, TaskMetadata, TaskReport,
    WorkerId,
};
pub use error::{ExecutionError, ShuttleError};
pub use impls::{FnListener, NoopListener, SimulatedWork};
pub use ports::{TaskListener, UnitOfWork, WorkItem};
pub use queue::TaskQueue;
pub use worker::{Worker, WorkerStatus};
