//! Fire-and-forget work detached from the request that triggered it.

use std::fmt::Display;
use std::future::Future;

use metrics::counter;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

const SOURCE: &str = "tutorium::tasks";
const METRIC_TASK_FAILURES: &str = "tutorium_background_task_failures_total";

/// Tracks detached tasks so shutdown can wait for them.
#[derive(Debug, Clone, Default)]
pub struct BackgroundTasks {
    tracker: TaskTracker,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` in the background. A failure is logged and counted; it never
    /// reaches the submitter.
    pub fn spawn<F, E>(&self, name: &'static str, task: F)
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        self.tracker.spawn(async move {
            match task.await {
                Ok(()) => debug!(target = SOURCE, task = name, "Background task finished"),
                Err(err) => {
                    warn!(target = SOURCE, task = name, error = %err, "Background task failed");
                    counter!(METRIC_TASK_FAILURES, "task" => name).increment(1);
                }
            }
        });
    }

    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Wait for every task submitted so far while still accepting new ones.
    pub async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// Stop accepting work and wait for in-flight tasks.
    pub async fn shutdown(&self) {
        self.tracker.close();
        let pending = self.tracker.len();
        if pending > 0 {
            debug!(target = SOURCE, pending, "Waiting for background tasks");
        }
        self.tracker.wait().await;
    }
}
