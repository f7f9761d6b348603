use async_trait::async_trait;
use tracing::warn;

use super::source::{ArtifactLocation, ArtifactRequest, JarSource, ResolvedArtifact, SourceKind};
use crate::core::error::MidnightResult;
use crate::core::server::ServerContext;

/// Jars already present on this machine.
pub struct LocalSource;

#[async_trait]
impl JarSource for LocalSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Local
    }

    fn matches(&self, request: &ArtifactRequest, ctx: &ServerContext) -> bool {
        ctx.local_path(&request.version_expr).is_file()
    }

    async fn resolve(
        &self,
        request: &ArtifactRequest,
        ctx: &ServerContext,
    ) -> MidnightResult<Option<ResolvedArtifact>> {
        let path = ctx.local_path(&request.version_expr);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(None);
        }
        warn!(
            "Using local file {:?} for {}; the build is not reproducible on other machines",
            path, request.identifier
        );
        Ok(Some(ResolvedArtifact::new(
            &request.identifier,
            ArtifactLocation::Local(path),
        )))
    }
}
