use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use super::downloadable::Downloadable;

/// Progress sink: `(bytes_done, bytes_total)`.
pub type ProgressFn = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// One unit of work for the [`Downloader`](super::Downloader).
#[derive(Clone)]
pub struct DownloadTask {
    pub destination: PathBuf,
    pub source: Downloadable,
    pub on_progress: Option<ProgressFn>,
}

impl DownloadTask {
    pub fn new(source: Downloadable, destination: impl Into<PathBuf>) -> Self {
        Self {
            destination: destination.into(),
            source,
            on_progress: None,
        }
    }

    pub fn with_progress(mut self, on_progress: ProgressFn) -> Self {
        self.on_progress = Some(on_progress);
        self
    }
}

impl fmt::Debug for DownloadTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadTask")
            .field("destination", &self.destination)
            .field("source", &self.source)
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

/// A task that finished successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedDownload {
    pub destination: PathBuf,
    pub bytes: u64,
}
