use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::core::error::{MidnightError, MidnightResult};
use crate::core::server::ServerContext;

/// Names under which sources appear in the configured priority order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Modrinth,
    Github,
    Direct,
    Local,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Modrinth => "modrinth",
            SourceKind::Github => "github",
            SourceKind::Direct => "direct",
            SourceKind::Local => "local",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = MidnightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "modrinth" => Ok(SourceKind::Modrinth),
            "github" => Ok(SourceKind::Github),
            "direct" => Ok(SourceKind::Direct),
            "local" => Ok(SourceKind::Local),
            other => Err(MidnightError::Config(format!("unknown jar source '{other}'"))),
        }
    }
}

/// A single `identifier = versionExpr` entry of a mods/plugins table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRequest {
    pub identifier: String,
    pub version_expr: String,
}

impl ArtifactRequest {
    pub fn new(identifier: impl Into<String>, version_expr: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            version_expr: version_expr.into(),
        }
    }

    /// Requests for every entry of a jar table, in key order.
    pub fn from_table(table: &BTreeMap<String, String>) -> Vec<Self> {
        table
            .iter()
            .map(|(identifier, expr)| Self::new(identifier, expr))
            .collect()
    }
}

/// Where a resolved jar can be read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactLocation {
    Remote(Url),
    Local(PathBuf),
}

impl ArtifactLocation {
    /// The location as a URI (`file://` for local paths).
    pub fn to_uri(&self) -> String {
        match self {
            ArtifactLocation::Remote(url) => url.to_string(),
            ArtifactLocation::Local(path) => {
                let absolute = std::path::absolute(path).unwrap_or_else(|_| path.clone());
                Url::from_file_path(&absolute)
                    .map(|u| u.to_string())
                    .unwrap_or_else(|_| format!("file://{}", absolute.display()))
            }
        }
    }
}

impl fmt::Display for ArtifactLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_uri())
    }
}

/// Output of a successful resolution. `display_name` becomes the file stem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArtifact {
    pub display_name: String,
    pub location: ArtifactLocation,
}

impl ResolvedArtifact {
    pub fn new(display_name: impl Into<String>, location: ArtifactLocation) -> Self {
        Self {
            display_name: display_name.into(),
            location,
        }
    }
}

/// One backend able to turn `(identifier, versionExpr)` into a location.
///
/// `matches` must stay cheap: no network I/O, at most a filesystem stat.
/// `resolve` is only called after `matches` returned true for the same input.
/// `Ok(None)` means the source looked and found nothing; `Err` is a request
/// failure, which the chain also treats as "nothing found".
#[async_trait]
pub trait JarSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    fn matches(&self, request: &ArtifactRequest, ctx: &ServerContext) -> bool;

    async fn resolve(
        &self,
        request: &ArtifactRequest,
        ctx: &ServerContext,
    ) -> MidnightResult<Option<ResolvedArtifact>>;
}

/// True when the expression is itself a location (URL or existing file).
///
/// API-backed sources decline such expressions so that literal locations are
/// handled by the direct and local sources whatever the priority order.
pub fn is_literal_location(expr: &str, ctx: &ServerContext) -> bool {
    super::direct::parse_location_url(expr).is_some() || ctx.local_path(expr).is_file()
}

/// `{endpoint}/{segments...}` with each segment percent-encoded.
pub fn api_url(endpoint: &str, segments: &[&str]) -> MidnightResult<Url> {
    let invalid = |reason: String| MidnightError::InvalidUrl {
        url: endpoint.to_string(),
        reason,
    };
    let mut url = Url::parse(endpoint).map_err(|e| invalid(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| invalid("cannot be a base".into()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_kind_round_trips_through_names() {
        for kind in [
            SourceKind::Modrinth,
            SourceKind::Github,
            SourceKind::Direct,
            SourceKind::Local,
        ] {
            assert_eq!(kind.as_str().parse::<SourceKind>().unwrap(), kind);
        }
        assert!("curseforge".parse::<SourceKind>().is_err());
    }

    #[test]
    fn requests_follow_table_order() {
        let mut table = BTreeMap::new();
        table.insert("sodium".to_string(), "*".to_string());
        table.insert("lithium".to_string(), "0.11.2".to_string());
        let requests = ArtifactRequest::from_table(&table);
        assert_eq!(requests[0], ArtifactRequest::new("lithium", "0.11.2"));
        assert_eq!(requests[1], ArtifactRequest::new("sodium", "*"));
    }

    #[test]
    fn api_url_encodes_segments() {
        let url = api_url("https://api.github.com/", &["repos", "o", "r", "releases", "tags", "v 1#x"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.github.com/repos/o/r/releases/tags/v%201%23x"
        );
    }

    #[test]
    fn local_location_renders_as_file_uri() {
        let location = ArtifactLocation::Local(PathBuf::from("/srv/jars/custom.jar"));
        assert_eq!(location.to_uri(), "file:///srv/jars/custom.jar");
    }
}
