pub mod client;
pub mod downloadable;
pub mod task;

pub use client::{DownloadReport, Downloader};
pub use downloadable::{ApiCredential, Downloadable};
pub use task::{CompletedDownload, DownloadTask, ProgressFn};
