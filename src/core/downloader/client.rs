use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::task::{CompletedDownload, DownloadTask};
use crate::core::config::EngineConfig;
use crate::core::error::{DownloadFailure, MidnightError, MidnightResult};

/// Outcome of a batch: every task lands in exactly one list.
#[derive(Debug, Default)]
pub struct DownloadReport {
    pub completed: Vec<CompletedDownload>,
    pub failed: Vec<DownloadFailure>,
}

impl DownloadReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Completed downloads, or one error listing every failed destination.
    pub fn into_result(self) -> MidnightResult<Vec<CompletedDownload>> {
        if self.failed.is_empty() {
            Ok(self.completed)
        } else {
            Err(MidnightError::DownloadsFailed(self.failed))
        }
    }
}

/// Bounded concurrent downloader shared by every batch.
#[derive(Clone)]
pub struct Downloader {
    client: Client,
    /// Maximum number of parallel downloads.
    concurrency: usize,
    task_timeout: Duration,
    cancel: CancellationToken,
}

impl Downloader {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            concurrency: 8,
            task_timeout: Duration::from_secs(60 * 60),
            cancel: CancellationToken::new(),
        }
    }

    pub fn from_config(config: &EngineConfig, client: Client) -> Self {
        Self::new(client)
            .with_concurrency(config.concurrency)
            .with_task_timeout(Duration::from_secs(config.task_timeout_secs))
    }

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = timeout;
        self
    }

    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Cancelling this token aborts every in-flight and queued task.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    // ── Single task ─────────────────────────────────────

    /// Run one task under the per-task timeout.
    pub async fn download(&self, task: &DownloadTask) -> MidnightResult<CompletedDownload> {
        let fut = task.source.download(
            &self.client,
            &task.destination,
            task.on_progress.as_ref(),
            &self.cancel,
        );
        let bytes = match tokio::time::timeout(self.task_timeout, fut).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(MidnightError::TimedOut {
                    path: task.destination.clone(),
                    after: self.task_timeout,
                })
            }
        };
        debug!("Downloaded: {} -> {:?}", task.source.describe(), task.destination);
        Ok(CompletedDownload {
            destination: task.destination.clone(),
            bytes,
        })
    }

    // ── Batch ───────────────────────────────────────────

    /// Run every task with at most `concurrency` in flight.
    ///
    /// A failing task never cancels its siblings; failures are collected.
    pub async fn download_all(&self, tasks: Vec<DownloadTask>) -> DownloadReport {
        info!(
            "Starting batch download: {} files, concurrency={}",
            tasks.len(),
            self.concurrency
        );

        let results: Vec<_> = stream::iter(tasks)
            .map(|task| async move {
                let result = self.download(&task).await;
                (task, result)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut report = DownloadReport::default();
        for (task, result) in results {
            match result {
                Ok(done) => report.completed.push(done),
                Err(error) => {
                    warn!("Download into {:?} failed: {}", task.destination, error);
                    report.failed.push(DownloadFailure {
                        destination: task.destination,
                        error,
                    });
                }
            }
        }
        info!(
            "Batch finished: {} completed, {} failed",
            report.completed.len(),
            report.failed.len()
        );
        report
    }
}
