use std::collections::BTreeMap;

use reqwest::Client;
use tracing::{debug, info, warn};

use super::direct::DirectSource;
use super::github::GithubSource;
use super::local::LocalSource;
use super::modrinth::ModrinthSource;
use super::source::{ArtifactRequest, JarSource, ResolvedArtifact};
use crate::core::config::EngineConfig;
use crate::core::error::{MidnightError, MidnightResult, ResolutionFailure};
use crate::core::server::ServerContext;

/// Registry of sources probed in the context's priority order.
///
/// The first source whose `matches` accepts a request owns it. Its result is
/// final: an empty result is not retried with the next source.
pub struct ResolverChain {
    sources: Vec<Box<dyn JarSource>>,
}

impl ResolverChain {
    pub fn new(sources: Vec<Box<dyn JarSource>>) -> Self {
        Self { sources }
    }

    /// All four built-in sources sharing one HTTP client.
    pub fn builtin(config: &EngineConfig, client: Client) -> Self {
        Self::new(vec![
            Box::new(ModrinthSource::new(client.clone(), &config.modrinth_endpoint)),
            Box::new(GithubSource::new(client, &config.github_endpoint)),
            Box::new(DirectSource),
            Box::new(LocalSource),
        ])
    }

    /// The source that owns `request` under `ctx.source_order`, if any.
    pub fn select(&self, request: &ArtifactRequest, ctx: &ServerContext) -> Option<&dyn JarSource> {
        ctx.source_order.iter().find_map(|kind| {
            self.sources
                .iter()
                .find(|s| s.kind() == *kind)
                .filter(|s| s.matches(request, ctx))
                .map(|s| &**s)
        })
    }

    pub async fn resolve(
        &self,
        request: &ArtifactRequest,
        ctx: &ServerContext,
    ) -> Result<ResolvedArtifact, ResolutionFailure> {
        let Some(source) = self.select(request, ctx) else {
            return Err(ResolutionFailure::new(
                &request.identifier,
                format!("no configured source accepts '{}'", request.version_expr),
            ));
        };
        debug!("{} handled by {}", request.identifier, source.kind());

        match source.resolve(request, ctx).await {
            Ok(Some(artifact)) => Ok(artifact),
            Ok(None) => Err(ResolutionFailure::new(
                &request.identifier,
                format!("{} found nothing for '{}'", source.kind(), request.version_expr),
            )),
            Err(e) => {
                warn!("{} lookup of {} failed: {}", source.kind(), request.identifier, e);
                Err(ResolutionFailure::new(
                    &request.identifier,
                    format!("{} request failed: {}", source.kind(), e),
                ))
            }
        }
    }

    /// Resolve every entry, keeping successes and failures apart.
    pub async fn resolve_partitioned(
        &self,
        table: &BTreeMap<String, String>,
        ctx: &ServerContext,
    ) -> (BTreeMap<String, ResolvedArtifact>, Vec<ResolutionFailure>) {
        let mut resolved = BTreeMap::new();
        let mut failed = Vec::new();
        for request in ArtifactRequest::from_table(table) {
            match self.resolve(&request, ctx).await {
                Ok(artifact) => {
                    resolved.insert(request.identifier, artifact);
                }
                Err(failure) => failed.push(failure),
            }
        }
        (resolved, failed)
    }

    /// Resolve a whole table, failing with every unresolvable identifier.
    pub async fn resolve_all(
        &self,
        table: &BTreeMap<String, String>,
        ctx: &ServerContext,
    ) -> MidnightResult<BTreeMap<String, ResolvedArtifact>> {
        let (resolved, failed) = self.resolve_partitioned(table, ctx).await;
        if !failed.is_empty() {
            return Err(MidnightError::Unresolvable(failed));
        }
        info!("Resolved {} jar(s)", resolved.len());
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;
    use crate::core::server::PlatformType;
    use crate::core::sources::source::{ArtifactLocation, SourceKind};

    type Calls = Arc<Mutex<Vec<String>>>;

    enum Outcome {
        Found,
        Empty,
        Fails,
    }

    /// Accepts identifiers starting with `prefix` and records every call.
    struct FakeSource {
        kind: SourceKind,
        prefix: &'static str,
        outcome: Outcome,
        calls: Calls,
    }

    #[async_trait]
    impl JarSource for FakeSource {
        fn kind(&self) -> SourceKind {
            self.kind
        }

        fn matches(&self, request: &ArtifactRequest, _ctx: &ServerContext) -> bool {
            self.calls
                .lock()
                .unwrap()
                .push(format!("matches:{}:{}", self.kind, request.identifier));
            request.identifier.starts_with(self.prefix)
        }

        async fn resolve(
            &self,
            request: &ArtifactRequest,
            _ctx: &ServerContext,
        ) -> MidnightResult<Option<ResolvedArtifact>> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("resolve:{}:{}", self.kind, request.identifier));
            match self.outcome {
                Outcome::Found => Ok(Some(ResolvedArtifact::new(
                    format!("{}-{}", self.kind, request.identifier),
                    ArtifactLocation::Local(format!("/jars/{}.jar", request.identifier).into()),
                ))),
                Outcome::Empty => Ok(None),
                Outcome::Fails => Err(MidnightError::Other("boom".into())),
            }
        }
    }

    fn fake(kind: SourceKind, prefix: &'static str, outcome: Outcome, calls: &Calls) -> Box<dyn JarSource> {
        Box::new(FakeSource {
            kind,
            prefix,
            outcome,
            calls: calls.clone(),
        })
    }

    fn ctx(order: Vec<SourceKind>) -> ServerContext {
        ServerContext::new(PlatformType::Fabric, Some("1.20.1".into()), order).unwrap()
    }

    fn resolve_calls(calls: &Calls) -> Vec<String> {
        calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with("resolve:"))
            .cloned()
            .collect()
    }

    #[tokio::test]
    async fn first_matching_source_in_order_wins() {
        let calls = Calls::default();
        let chain = ResolverChain::new(vec![
            fake(SourceKind::Modrinth, "a", Outcome::Found, &calls),
            fake(SourceKind::Direct, "", Outcome::Found, &calls),
        ]);

        let order = vec![SourceKind::Direct, SourceKind::Modrinth];
        let artifact = chain
            .resolve(&ArtifactRequest::new("abc", "*"), &ctx(order))
            .await
            .unwrap();
        assert_eq!(artifact.display_name, "direct-abc");
        assert_eq!(resolve_calls(&calls), vec!["resolve:direct:abc"]);
    }

    #[tokio::test]
    async fn non_matching_sources_are_skipped() {
        let calls = Calls::default();
        let chain = ResolverChain::new(vec![
            fake(SourceKind::Local, "zzz", Outcome::Found, &calls),
            fake(SourceKind::Direct, "zzz", Outcome::Found, &calls),
            fake(SourceKind::Modrinth, "", Outcome::Found, &calls),
        ]);

        let order = vec![SourceKind::Local, SourceKind::Direct, SourceKind::Modrinth];
        let artifact = chain
            .resolve(&ArtifactRequest::new("sodium", "*"), &ctx(order))
            .await
            .unwrap();
        assert_eq!(artifact.display_name, "modrinth-sodium");
        assert_eq!(
            calls.lock().unwrap().clone(),
            vec![
                "matches:local:sodium",
                "matches:direct:sodium",
                "matches:modrinth:sodium",
                "resolve:modrinth:sodium",
            ]
        );
    }

    #[tokio::test]
    async fn empty_result_does_not_fall_back() {
        let calls = Calls::default();
        let chain = ResolverChain::new(vec![
            fake(SourceKind::Modrinth, "", Outcome::Empty, &calls),
            fake(SourceKind::Direct, "", Outcome::Found, &calls),
        ]);

        let order = vec![SourceKind::Modrinth, SourceKind::Direct];
        let failure = chain
            .resolve(&ArtifactRequest::new("sodium", "9.9.9"), &ctx(order))
            .await
            .unwrap_err();
        assert_eq!(failure.identifier, "sodium");
        assert!(failure.reason.contains("modrinth found nothing"));
        assert_eq!(resolve_calls(&calls), vec!["resolve:modrinth:sodium"]);
    }

    #[tokio::test]
    async fn sources_outside_the_order_are_never_consulted() {
        let calls = Calls::default();
        let chain = ResolverChain::new(vec![
            fake(SourceKind::Modrinth, "", Outcome::Found, &calls),
            fake(SourceKind::Local, "zzz", Outcome::Found, &calls),
        ]);

        let failure = chain
            .resolve(&ArtifactRequest::new("sodium", "*"), &ctx(vec![SourceKind::Local]))
            .await
            .unwrap_err();
        assert!(failure.reason.contains("no configured source"));
        assert!(calls.lock().unwrap().iter().all(|c| !c.contains("modrinth")));
    }

    #[tokio::test]
    async fn resolve_all_reports_every_failure() {
        let calls = Calls::default();
        let chain = ResolverChain::new(vec![
            fake(SourceKind::Modrinth, "ok", Outcome::Found, &calls),
            fake(SourceKind::Github, "err", Outcome::Fails, &calls),
        ]);
        let table: BTreeMap<String, String> = [
            ("ok-one", "*"),
            ("err-two", "*"),
            ("nobody", "*"),
            ("ok-three", "*"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let order = vec![SourceKind::Modrinth, SourceKind::Github];
        let (resolved, failed) = chain.resolve_partitioned(&table, &ctx(order.clone())).await;
        assert_eq!(resolved.len(), 2);
        let failed_ids: Vec<_> = failed.iter().map(|f| f.identifier.as_str()).collect();
        assert_eq!(failed_ids, vec!["err-two", "nobody"]);
        assert!(failed[0].reason.contains("github request failed: boom"));

        let err = chain.resolve_all(&table, &ctx(order)).await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("err-two") && msg.contains("nobody"));
        assert!(!msg.contains("ok-one"));
    }

    #[tokio::test]
    async fn builtin_registry_lookup_behind_non_matching_sources() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.path("/v2/project/sodium/version")
                    .query_param("loaders", "[\"fabric\"]")
                    .query_param("game_versions", "[\"1.20.1\"]");
                then.status(200).json_body(json!([{
                    "version_number": "0.5.3",
                    "date_published": "2023-09-01T00:00:00Z",
                    "files": [{ "url": "https://cdn.modrinth.com/sodium.jar", "filename": "sodium.jar", "primary": true }]
                }]));
            })
            .await;
        let config = EngineConfig {
            modrinth_endpoint: server.base_url(),
            github_endpoint: "http://127.0.0.1:9".into(),
            ..EngineConfig::default()
        };
        let chain = ResolverChain::builtin(&config, Client::new());

        let order = vec![
            SourceKind::Local,
            SourceKind::Direct,
            SourceKind::Github,
            SourceKind::Modrinth,
        ];
        let artifact = chain
            .resolve(&ArtifactRequest::new("sodium", "*"), &ctx(order))
            .await
            .unwrap();
        assert_eq!(artifact.display_name, "sodium");
        assert_eq!(artifact.location.to_uri(), "https://cdn.modrinth.com/sodium.jar");
    }

    #[test]
    fn literal_location_goes_to_whichever_of_local_or_direct_comes_first() {
        // A relative path that also parses as an absolute URL.
        let dir = tempfile::tempdir().unwrap();
        let expr = "https:/cdn.example/repo.jar";
        std::fs::create_dir_all(dir.path().join("https:/cdn.example")).unwrap();
        std::fs::write(dir.path().join(expr), b"jar").unwrap();

        let config = EngineConfig {
            modrinth_endpoint: "http://127.0.0.1:9".into(),
            github_endpoint: "http://127.0.0.1:9".into(),
            ..EngineConfig::default()
        };
        let chain = ResolverChain::builtin(&config, Client::new());
        let request = ArtifactRequest::new("owner/repo", expr);

        let local_first = ctx(vec![
            SourceKind::Local,
            SourceKind::Direct,
            SourceKind::Github,
            SourceKind::Modrinth,
        ])
        .with_base_dir(dir.path());
        assert_eq!(chain.select(&request, &local_first).unwrap().kind(), SourceKind::Local);

        let remote_first = ctx(vec![
            SourceKind::Github,
            SourceKind::Modrinth,
            SourceKind::Direct,
            SourceKind::Local,
        ])
        .with_base_dir(dir.path());
        assert_eq!(chain.select(&request, &remote_first).unwrap().kind(), SourceKind::Direct);
    }
}
