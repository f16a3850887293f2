use std::num::{NonZeroU32, NonZeroUsize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use shuttle_core::{QueueConfig, Task, TaskQueue};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod sink;

use sink::ReportSink;

#[derive(Parser, Debug)]
#[command(name = "shuttle")]
#[command(about = "Run a batch of simulated tasks through a self-scaling worker pool", long_about = None)]
struct Args {
    /// JSON config file (camelCase keys, durations in ms)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of tasks to enqueue
    #[arg(short, long, default_value = "20")]
    tasks: usize,

    /// Override maxWorkers
    #[arg(long)]
    max_workers: Option<NonZeroUsize>,

    /// Override workerSettings.maxRetries
    #[arg(long)]
    max_retries: Option<NonZeroU32>,

    /// Override workerSettings.failureChance (0-100)
    #[arg(long)]
    failure_chance: Option<u8>,

    /// Override workerSettings.timeToComplete (ms)
    #[arg(long)]
    time_to_complete: Option<u64>,

    /// Append every terminal report to <DIR>/tasks.log as JSON lines
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Log statistics every N ms while draining (0 disables)
    #[arg(long, default_value = "1000")]
    stats_interval: u64,
}

impl Args {
    fn load_config(&self) -> anyhow::Result<QueueConfig> {
        let mut config = match &self.config {
            Some(path) => QueueConfig::from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => QueueConfig::default(),
        };

        if let Some(n) = self.max_workers {
            config.max_workers = n;
        }
        if let Some(n) = self.max_retries {
            config.worker_settings.max_retries = n;
        }
        if let Some(chance) = self.failure_chance {
            config.worker_settings.failure_chance = chance;
        }
        if let Some(ms) = self.time_to_complete {
            config.worker_settings.time_to_complete = ms;
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config = args.load_config()?;
    tracing::info!(
        max_workers = config.max_workers.get(),
        max_retries = config.worker_settings.max_retries.get(),
        failure_chance = config.worker_settings.failure_chance,
        "starting"
    );

    let sink = Arc::new(ReportSink::new(args.log_dir.as_deref())?);
    let queue = Arc::new(TaskQueue::simulated(config, sink)?);

    queue.add_tasks((1..=args.tasks).map(|i| Task::new(format!("task-{i}"), format!("message {i}"))));

    // (A) 定期的に統計をログに出す
    let reporter = (args.stats_interval > 0).then(|| {
        let queue = Arc::clone(&queue);
        let period = Duration::from_millis(args.stats_interval);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let stats = queue.statistics();
                tracing::info!(
                    queued = stats.current_queue_length,
                    hot = stats.hot_workers,
                    idle = stats.idle_workers,
                    done = stats.lifetime_task_counter,
                    "progress"
                );
            }
        })
    });

    // (B) drain（Ctrl-C で待つのをやめる。実行中のタスクは中断しない設計）
    tokio::select! {
        _ = queue.process() => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received shutdown signal");
        }
    }

    if let Some(reporter) = reporter {
        reporter.abort();
    }
    queue.cleanup();

    let stats = queue.statistics();
    println!("{}", serde_json::to_string_pretty(&stats)?);

    Ok(())
}
