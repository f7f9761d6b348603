use async_trait::async_trait;
use reqwest::Url;
use tracing::debug;

use super::source::{ArtifactLocation, ArtifactRequest, JarSource, ResolvedArtifact, SourceKind};
use crate::core::error::MidnightResult;
use crate::core::server::ServerContext;

const SCHEMES: [&str; 3] = ["http", "https", "file"];

/// Parse an expression as an absolute URL with a fetchable scheme.
pub fn parse_location_url(expr: &str) -> Option<Url> {
    let url = Url::parse(expr).ok()?;
    (SCHEMES.contains(&url.scheme()) && (url.has_host() || url.scheme() == "file")).then_some(url)
}

/// Treats the version expression as the download URL itself.
pub struct DirectSource;

#[async_trait]
impl JarSource for DirectSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Direct
    }

    fn matches(&self, request: &ArtifactRequest, _ctx: &ServerContext) -> bool {
        parse_location_url(&request.version_expr).is_some()
    }

    async fn resolve(
        &self,
        request: &ArtifactRequest,
        _ctx: &ServerContext,
    ) -> MidnightResult<Option<ResolvedArtifact>> {
        let Some(url) = parse_location_url(&request.version_expr) else {
            return Ok(None);
        };
        let location = if url.scheme() == "file" {
            match url.to_file_path() {
                Ok(path) => ArtifactLocation::Local(path),
                Err(()) => return Ok(None),
            }
        } else {
            ArtifactLocation::Remote(url)
        };
        debug!("Direct location for {}: {}", request.identifier, location);
        Ok(Some(ResolvedArtifact::new(&request.identifier, location)))
    }
}
