//! Listener used by the CLI: logs every terminal report and, optionally,
//! appends it as one JSON line to `<dir>/tasks.log`.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;
use shuttle_core::{Task, TaskListener, TaskReport};
use tracing::{info, warn};

pub struct ReportSink {
    file: Option<(PathBuf, Mutex<File>)>,
}

impl ReportSink {
    pub fn new(log_dir: Option<&Path>) -> anyhow::Result<Self> {
        let Some(dir) = log_dir else {
            return Ok(Self { file: None });
        };

        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating log directory {}", dir.display()))?;
        let path = dir.join("tasks.log");
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening {}", path.display()))?;

        Ok(Self {
            file: Some((path, Mutex::new(file))),
        })
    }

    fn append(&self, status: &str, report: &TaskReport) {
        let Some((path, file)) = &self.file else {
            return;
        };

        let mut line = match serde_json::to_value(report) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "failed to serialize task report");
                return;
            }
        };
        line["status"] = serde_json::Value::from(status);

        let mut file = file.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Err(e) = writeln!(file, "{line}") {
            warn!(path = %path.display(), error = %e, "failed to append task report");
        }
    }
}

impl TaskListener for ReportSink {
    fn on_complete(&self, task: &Task, report: &TaskReport) {
        info!(
            task_id = %task.id(),
            worker_id = %report.task.worker_id,
            attempts = report.attempts(),
            processing_time = ?report.run.processing_time,
            "task completed"
        );
        self.append("completed", report);
    }

    fn on_fail(&self, task: &Task, report: &TaskReport) {
        warn!(
            task_id = %task.id(),
            worker_id = %report.task.worker_id,
            attempts = report.attempts(),
            "task failed"
        );
        self.append("failed", report);
    }
}
