use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::debug;

use super::patterns::{is_modrinth_slug, LATEST};
use super::source::{
    api_url, is_literal_location, ArtifactLocation, ArtifactRequest, JarSource, ResolvedArtifact,
    SourceKind,
};
use crate::core::error::{MidnightError, MidnightResult};
use crate::core::server::ServerContext;

#[derive(Debug, Clone, Deserialize)]
pub struct ModrinthVersion {
    pub version_number: String,
    #[serde(default)]
    pub date_published: Option<DateTime<Utc>>,
    #[serde(default)]
    pub files: Vec<ModrinthFile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModrinthFile {
    pub url: String,
    pub filename: String,
    #[serde(default)]
    pub primary: bool,
}

/// Registry search over the Modrinth v2 API.
pub struct ModrinthSource {
    client: Client,
    endpoint: String,
}

impl ModrinthSource {
    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    /// `GET /v2/project/{slug}/version` filtered by loader and game version.
    fn versions_url(&self, slug: &str, ctx: &ServerContext) -> MidnightResult<Url> {
        let mut url = api_url(&self.endpoint, &["v2", "project", slug, "version"])?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("loaders", &json_array(ctx.platform.as_str()));
            if let Some(game_version) = &ctx.game_version {
                query.append_pair("game_versions", &json_array(game_version));
            }
        }
        Ok(url)
    }

    async fn fetch_versions(&self, url: Url) -> MidnightResult<Vec<ModrinthVersion>> {
        let resp = self.client.get(url.clone()).send().await?;
        if !resp.status().is_success() {
            return Err(MidnightError::ApiStatus {
                url: url.to_string(),
                status: resp.status().as_u16(),
            });
        }
        Ok(resp.json::<Vec<ModrinthVersion>>().await?)
    }
}

fn json_array(value: &str) -> String {
    serde_json::Value::Array(vec![serde_json::Value::String(value.to_string())]).to_string()
}

/// Pick the version an expression refers to: newest for `*`, otherwise the
/// exact `version_number`.
pub fn select_version<'a>(
    versions: &'a [ModrinthVersion],
    expr: &str,
) -> Option<&'a ModrinthVersion> {
    if expr == LATEST {
        let mut ordered: Vec<&ModrinthVersion> = versions.iter().collect();
        // Stable sort: API order decides ties and undated entries sink.
        ordered.sort_by(|a, b| b.date_published.cmp(&a.date_published));
        ordered.into_iter().next()
    } else {
        versions.iter().find(|v| v.version_number == expr)
    }
}

impl ModrinthVersion {
    /// The file flagged primary, else the first one.
    pub fn primary_file(&self) -> Option<&ModrinthFile> {
        self.files
            .iter()
            .find(|f| f.primary)
            .or_else(|| self.files.first())
    }
}

#[async_trait]
impl JarSource for ModrinthSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Modrinth
    }

    fn matches(&self, request: &ArtifactRequest, ctx: &ServerContext) -> bool {
        is_modrinth_slug(&request.identifier) && !is_literal_location(&request.version_expr, ctx)
    }

    async fn resolve(
        &self,
        request: &ArtifactRequest,
        ctx: &ServerContext,
    ) -> MidnightResult<Option<ResolvedArtifact>> {
        let url = self.versions_url(&request.identifier, ctx)?;
        debug!("Querying Modrinth: {}", url);
        let versions = self.fetch_versions(url).await?;

        let Some(version) = select_version(&versions, &request.version_expr) else {
            debug!(
                "No Modrinth version of {} matches '{}' ({} candidates)",
                request.identifier,
                request.version_expr,
                versions.len()
            );
            return Ok(None);
        };
        let Some(file) = version.primary_file() else {
            debug!(
                "Modrinth version {} of {} has no files",
                version.version_number, request.identifier
            );
            return Ok(None);
        };

        let location = Url::parse(&file.url).map_err(|e| MidnightError::InvalidUrl {
            url: file.url.clone(),
            reason: e.to_string(),
        })?;
        debug!(
            "Modrinth resolved {} {} -> {}",
            request.identifier, version.version_number, file.filename
        );
        Ok(Some(ResolvedArtifact::new(
            &request.identifier,
            ArtifactLocation::Remote(location),
        )))
    }
}
