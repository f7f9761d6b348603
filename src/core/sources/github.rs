use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use tracing::debug;

use super::patterns::{is_jar_name, split_github_project, split_tag_and_file, LATEST};
use super::source::{
    api_url, is_literal_location, ArtifactLocation, ArtifactRequest, JarSource, ResolvedArtifact,
    SourceKind,
};
use crate::core::error::{MidnightError, MidnightResult};
use crate::core::server::ServerContext;

const GITHUB_JSON: &str = "application/vnd.github+json";

#[derive(Debug, Clone, Deserialize)]
pub struct GithubRelease {
    #[serde(default)]
    pub tag_name: Option<String>,
    pub assets_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GithubAsset {
    pub name: String,
    /// API URL of the asset; serves the binary when asked for octet-stream.
    pub url: String,
}

/// Pick the asset named `file`, or the first `.jar` when no name is given.
pub fn pick_asset<'a>(assets: &'a [GithubAsset], file: Option<&str>) -> Option<&'a GithubAsset> {
    match file {
        Some(name) => assets.iter().find(|a| a.name == name),
        None => assets.iter().find(|a| is_jar_name(&a.name)),
    }
}

/// Release assets from the GitHub REST API.
pub struct GithubSource {
    client: Client,
    endpoint: String,
}

impl GithubSource {
    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    fn release_url(&self, owner: &str, repo: &str, tag: &str) -> MidnightResult<Url> {
        if tag == LATEST {
            api_url(&self.endpoint, &["repos", owner, repo, "releases", "latest"])
        } else {
            api_url(&self.endpoint, &["repos", owner, repo, "releases", "tags", tag])
        }
    }

    /// GET a GitHub API resource. A 404 is reported as `None`.
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        ctx: &ServerContext,
    ) -> MidnightResult<Option<T>> {
        let mut req = self.client.get(url).header(ACCEPT, GITHUB_JSON);
        if let Some(token) = &ctx.credential {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await?;

        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(resp.json::<T>().await?)),
            status => Err(MidnightError::ApiStatus {
                url: url.to_string(),
                status: status.as_u16(),
            }),
        }
    }
}

#[async_trait]
impl JarSource for GithubSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Github
    }

    fn matches(&self, request: &ArtifactRequest, ctx: &ServerContext) -> bool {
        split_github_project(&request.identifier).is_some()
            && !is_literal_location(&request.version_expr, ctx)
    }

    async fn resolve(
        &self,
        request: &ArtifactRequest,
        ctx: &ServerContext,
    ) -> MidnightResult<Option<ResolvedArtifact>> {
        let Some((owner, repo)) = split_github_project(&request.identifier) else {
            return Ok(None);
        };
        let (tag, file) = split_tag_and_file(&request.version_expr);

        let release_url = self.release_url(owner, repo, tag)?;
        debug!("Fetching GitHub release: {}", release_url);
        let Some(release) = self
            .get_json::<GithubRelease>(release_url.as_str(), ctx)
            .await?
        else {
            debug!("No release '{}' in {}/{}", tag, owner, repo);
            return Ok(None);
        };

        let assets = self
            .get_json::<Vec<GithubAsset>>(&release.assets_url, ctx)
            .await?
            .unwrap_or_default();

        let Some(asset) = pick_asset(&assets, file) else {
            debug!(
                "Release {} of {}/{} has no asset matching {:?}",
                release.tag_name.as_deref().unwrap_or(tag),
                owner,
                repo,
                file.unwrap_or("*.jar")
            );
            return Ok(None);
        };

        let location = Url::parse(&asset.url).map_err(|e| MidnightError::InvalidUrl {
            url: asset.url.clone(),
            reason: e.to_string(),
        })?;
        debug!("GitHub resolved {} -> {}", request.identifier, asset.name);
        Ok(Some(ResolvedArtifact::new(
            repo,
            ArtifactLocation::Remote(location),
        )))
    }
}
