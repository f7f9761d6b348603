mod core;

use tracing_subscriber::EnvFilter;

pub use crate::core::config::{EngineConfig, TokenStore};
pub use crate::core::downloader::{
    ApiCredential, CompletedDownload, DownloadReport, DownloadTask, Downloadable, Downloader,
    ProgressFn,
};
pub use crate::core::error::{DownloadFailure, MidnightError, MidnightResult, ResolutionFailure};
pub use crate::core::http::build_http_client;
pub use crate::core::pipeline::{
    install_jars, DownloadProgress, JarFiles, JarPipeline, ProgressListener,
};
pub use crate::core::server::{JarKind, PlatformType, ServerContext, ServerSpec};
pub use crate::core::sources::direct::DirectSource;
pub use crate::core::sources::github::GithubSource;
pub use crate::core::sources::local::LocalSource;
pub use crate::core::sources::modrinth::ModrinthSource;
pub use crate::core::sources::{
    patterns, ArtifactLocation, ArtifactRequest, JarSource, ResolvedArtifact, ResolverChain,
    SourceKind,
};

/// Install the fmt subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    // Ignored when the host application already installed a subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,midnight_lib=debug")),
        )
        .try_init();
}
