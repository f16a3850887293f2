//! ReaperLoop - 削除済みワーカーの定期回収
//!
//! # フロー
//! 1. `interval` ごとに起きる
//! 2. QueueState をロックして Deleted のワーカーを pool から外す
//! 3. shutdown が来るか、Queue が drop されたら終了

use std::sync::{Mutex, Weak};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::error::ShuttleError;
use crate::queue::state::{QueueState, lock};

/// Handle to the periodic reaping task.
///
/// - `request_shutdown()` stops the loop at its next wake-up
/// - dropping the handle aborts the task outright
pub struct ReaperLoop {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl ReaperLoop {
    /// Spawn onto the current tokio runtime.
    pub(crate) fn spawn(
        interval: Duration,
        state: Weak<Mutex<QueueState>>,
    ) -> Result<Self, ShuttleError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| ShuttleError::NoRuntime)?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let join = runtime.spawn(reaper_loop(interval, state, shutdown_rx));
        info!(?interval, "worker reaper started");

        Ok(Self { shutdown_tx, join })
    }

    pub fn request_shutdown(&self) {
        // receiver が既に居なくても問題ない
        let _ = self.shutdown_tx.send(true);
    }
}

impl Drop for ReaperLoop {
    fn drop(&mut self) {
        self.request_shutdown();
        self.join.abort();
    }
}

async fn reaper_loop(
    interval: Duration,
    state: Weak<Mutex<QueueState>>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // 最初の tick は即時なので捨てる
    ticker.tick().await;

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                let Some(state) = state.upgrade() else {
                    break;
                };
                let removed = lock(&state).clear_deleted_workers();
                if removed > 0 {
                    info!(removed, "reaped deleted workers");
                }
            }
        }
    }

    debug!("worker reaper stopped");
}
