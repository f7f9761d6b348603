use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Central error type for the jar engine.
/// Every module returns `Result<T, MidnightError>`.
#[derive(Debug, Error)]
pub enum MidnightError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Network ─────────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Download failed for {url}: HTTP {status}")]
    DownloadFailed { url: String, status: u16 },

    #[error("API request to {url} returned HTTP {status}")]
    ApiStatus { url: String, status: u16 },

    #[error("Server did not report a content length for {url}")]
    MissingContentLength { url: String },

    #[error("Download of {url} was truncated: got {received} of {expected} bytes")]
    Truncated {
        url: String,
        received: u64,
        expected: u64,
    },

    #[error("Download into {0:?} was cancelled")]
    Cancelled(PathBuf),

    #[error("Download into {path:?} timed out after {after:?}")]
    TimedOut { path: PathBuf, after: Duration },

    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    // ── JSON ────────────────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Configuration ───────────────────────────────────
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Source '{0}' appears more than once in the source order")]
    DuplicateSource(String),

    #[error("Unknown platform type '{0}'")]
    UnknownPlatform(String),

    // ── Resolution ──────────────────────────────────────
    #[error("'{identifier}' is already declared for server {server}")]
    DuplicateArtifact { server: String, identifier: String },

    #[error("Could not resolve {}", ResolutionFailure::describe(.0))]
    Unresolvable(Vec<ResolutionFailure>),

    #[error("{first} and {second} would both be written to {path:?}")]
    DestinationConflict {
        first: String,
        second: String,
        path: PathBuf,
    },

    // ── Download batch ──────────────────────────────────
    #[error("{} download(s) failed: {}", .0.len(), DownloadFailure::destinations(.0))]
    DownloadsFailed(Vec<DownloadFailure>),

    // ── Generic ─────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type MidnightResult<T> = Result<T, MidnightError>;

impl From<std::io::Error> for MidnightError {
    fn from(source: std::io::Error) -> Self {
        MidnightError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}

impl MidnightError {
    /// Attach a path to an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MidnightError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Why a single identifier could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionFailure {
    /// Server the request belongs to, when resolving more than one server.
    pub server: Option<String>,
    pub identifier: String,
    pub reason: String,
}

impl ResolutionFailure {
    pub fn new(identifier: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            server: None,
            identifier: identifier.into(),
            reason: reason.into(),
        }
    }

    pub fn in_server(mut self, server: impl Into<String>) -> Self {
        self.server = Some(server.into());
        self
    }

    fn describe(failures: &[ResolutionFailure]) -> String {
        failures
            .iter()
            .map(|f| format!("{} ({})", f, f.reason))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for ResolutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.server {
            Some(server) => write!(f, "{}/{}", server, self.identifier),
            None => write!(f, "{}", self.identifier),
        }
    }
}

/// A download task that did not complete.
#[derive(Debug)]
pub struct DownloadFailure {
    pub destination: PathBuf,
    pub error: MidnightError,
}

impl DownloadFailure {
    fn destinations(failures: &[DownloadFailure]) -> String {
        failures
            .iter()
            .map(|f| format!("{} ({})", f.destination.display(), f.error))
            .collect::<Vec<_>>()
            .join("; ")
    }
}
