use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::core::config::{EngineConfig, TokenStore};
use crate::core::downloader::{ApiCredential, DownloadTask, Downloadable, Downloader, ProgressFn};
use crate::core::error::{MidnightError, MidnightResult};
use crate::core::http::build_http_client;
use crate::core::server::{JarKind, ServerContext, ServerSpec};
use crate::core::sources::{ResolvedArtifact, ResolverChain};

/// Progress of one jar, forwarded to the listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadProgress {
    pub server: String,
    pub identifier: String,
    pub file_name: String,
    pub bytes_done: u64,
    pub bytes_total: u64,
}

pub type ProgressListener = Arc<dyn Fn(&DownloadProgress) + Send + Sync>;

/// Downloaded jars of one server: identifier -> file path.
pub type JarFiles = BTreeMap<String, PathBuf>;

/// One resolved jar bound to its destination.
struct PlannedJar {
    server: String,
    identifier: String,
    artifact: ResolvedArtifact,
    destination: PathBuf,
}

/// Resolves jar tables through the source chain and downloads the results.
pub struct JarPipeline {
    config: EngineConfig,
    tokens: TokenStore,
    chain: ResolverChain,
    downloader: Downloader,
    base_dir: Option<PathBuf>,
    listener: Option<ProgressListener>,
}

impl JarPipeline {
    pub fn new(
        config: EngineConfig,
        tokens: TokenStore,
        chain: ResolverChain,
        downloader: Downloader,
    ) -> Self {
        Self {
            config,
            tokens,
            chain,
            downloader,
            base_dir: None,
            listener: None,
        }
    }

    /// Built-in sources and a downloader sharing one HTTP client.
    pub fn from_config(config: EngineConfig, tokens: TokenStore) -> MidnightResult<Self> {
        config.validate()?;
        let client = build_http_client(&config)?;
        let chain = ResolverChain::builtin(&config, client.clone());
        let downloader = Downloader::from_config(&config, client);
        Ok(Self::new(config, tokens, chain, downloader))
    }

    /// Directory that relative local jar paths are read from.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    pub fn with_listener(mut self, listener: ProgressListener) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn downloader(&self) -> &Downloader {
        &self.downloader
    }

    pub fn context_for(&self, server: &ServerSpec) -> MidnightResult<ServerContext> {
        let ctx = ServerContext::for_server(server, &self.config.source_order, &self.tokens)?;
        Ok(match &self.base_dir {
            Some(dir) => ctx.with_base_dir(dir),
            None => ctx,
        })
    }

    // ── Resolve + download ──────────────────────────────

    /// Resolve `table` and download every jar into `dest_dir`.
    pub async fn download_jars(
        &self,
        server_name: &str,
        table: &BTreeMap<String, String>,
        ctx: &ServerContext,
        dest_dir: &Path,
    ) -> MidnightResult<JarFiles> {
        let resolved = self.chain.resolve_all(table, ctx).await?;
        let planned = plan(server_name, resolved, dest_dir)?;
        let credential = self.credential(ctx);
        let mut files = self.run(planned, credential.as_ref()).await?;
        Ok(files.remove(server_name).unwrap_or_default())
    }

    /// Resolve and download the jars of one server into
    /// `{staging_root}/{server}/{mods|plugins}/`.
    pub async fn build_server(&self, server: &ServerSpec, staging_root: &Path) -> MidnightResult<JarFiles> {
        let mut servers = BTreeMap::new();
        servers.insert(server.name.clone(), server.clone());
        let mut built = self.build(&servers, staging_root).await?;
        Ok(built.remove(&server.name).unwrap_or_default())
    }

    /// Resolve every server first; any failure anywhere aborts before a
    /// single byte is downloaded. Downloads then run as one bounded batch.
    pub async fn build(
        &self,
        servers: &BTreeMap<String, ServerSpec>,
        staging_root: &Path,
    ) -> MidnightResult<BTreeMap<String, JarFiles>> {
        let mut failures = Vec::new();
        let mut planned = Vec::new();
        let mut credential = None;

        for (name, server) in servers {
            let (Some(kind), Some(table)) = (server.platform.jar_kind(), server.jars()) else {
                debug!("{} declares no jars", name);
                continue;
            };
            if table.is_empty() {
                continue;
            }
            let ctx = self.context_for(server)?;
            info!("Resolving {} {} for {}", table.len(), kind.folder(), name);

            let (resolved, failed) = self.chain.resolve_partitioned(table, &ctx).await;
            failures.extend(failed.into_iter().map(|f| f.in_server(name)));
            planned.extend(plan(name, resolved, &staging_dir(staging_root, name, kind))?);
            credential = credential.or_else(|| self.credential(&ctx));
        }

        if !failures.is_empty() {
            return Err(MidnightError::Unresolvable(failures));
        }
        check_disjoint(&planned)?;

        // Tokens are process-wide, so every server carries the same credential.
        let mut built = self.run(planned, credential.as_ref()).await?;
        for name in servers.keys() {
            built.entry(name.clone()).or_default();
        }
        Ok(built)
    }

    /// Add jars to a server: reject identifiers it already declares, download
    /// the new ones, then merge them into its table.
    pub async fn add(
        &self,
        server: &mut ServerSpec,
        additions: &BTreeMap<String, String>,
        staging_root: &Path,
    ) -> MidnightResult<JarFiles> {
        let Some(kind) = server.platform.jar_kind() else {
            return Err(MidnightError::Config(format!(
                "{} servers do not load mods or plugins",
                server.platform
            )));
        };
        if let Some(existing) = server.jars() {
            if let Some(identifier) = additions.keys().find(|id| existing.contains_key(*id)) {
                return Err(MidnightError::DuplicateArtifact {
                    server: server.name.clone(),
                    identifier: identifier.clone(),
                });
            }
        }

        let ctx = self.context_for(server)?;
        let dest_dir = staging_dir(staging_root, &server.name, kind);
        let files = self.download_jars(&server.name, additions, &ctx, &dest_dir).await?;

        if let Some(table) = server.jars_mut() {
            table.extend(additions.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        info!("Added {} jar(s) to {}", files.len(), server.name);
        Ok(files)
    }

    // ── Internals ───────────────────────────────────────

    fn credential(&self, ctx: &ServerContext) -> Option<ApiCredential> {
        let token = ctx.credential.as_deref()?;
        ApiCredential::for_endpoint(&self.config.github_endpoint, token)
    }

    async fn run(
        &self,
        planned: Vec<PlannedJar>,
        credential: Option<&ApiCredential>,
    ) -> MidnightResult<BTreeMap<String, JarFiles>> {
        let mut tasks = Vec::with_capacity(planned.len());
        let mut owners = HashMap::new();
        for jar in planned {
            let source = Downloadable::for_location(&jar.artifact.location, credential);
            let task = DownloadTask::new(source, &jar.destination)
                .with_progress(self.progress_fn(&jar));
            owners.insert(jar.destination, (jar.server, jar.identifier));
            tasks.push(task);
        }

        let completed = self.downloader.download_all(tasks).await.into_result()?;

        let mut files: BTreeMap<String, JarFiles> = BTreeMap::new();
        for done in completed {
            if let Some((server, identifier)) = owners.remove(&done.destination) {
                files.entry(server).or_default().insert(identifier, done.destination);
            }
        }
        Ok(files)
    }

    fn progress_fn(&self, jar: &PlannedJar) -> ProgressFn {
        let listener = self.listener.clone();
        let server = jar.server.clone();
        let identifier = jar.identifier.clone();
        let file_name = file_name_for(&jar.artifact);
        Arc::new(move |bytes_done, bytes_total| {
            if bytes_done == bytes_total {
                info!("Downloaded {}", file_name);
            }
            if let Some(listener) = &listener {
                listener(&DownloadProgress {
                    server: server.clone(),
                    identifier: identifier.clone(),
                    file_name: file_name.clone(),
                    bytes_done,
                    bytes_total,
                });
            }
        })
    }
}

/// Copy downloaded jars into `{data_dir}/{mods|plugins}/`, replacing existing files.
pub async fn install_jars(
    server: &ServerSpec,
    jars: &JarFiles,
    data_dir: &Path,
) -> MidnightResult<Vec<PathBuf>> {
    let Some(kind) = server.platform.jar_kind() else {
        return Ok(Vec::new());
    };
    let target_dir = data_dir.join(kind.folder());
    tokio::fs::create_dir_all(&target_dir)
        .await
        .map_err(|e| MidnightError::io(&target_dir, e))?;

    let mut installed = Vec::with_capacity(jars.len());
    for path in jars.values() {
        let Some(name) = path.file_name() else {
            continue;
        };
        let target = target_dir.join(name);
        tokio::fs::copy(path, &target)
            .await
            .map_err(|e| MidnightError::io(path, e))?;
        installed.push(target);
    }
    debug!("Installed {} jar(s) into {:?}", installed.len(), target_dir);
    Ok(installed)
}

fn staging_dir(staging_root: &Path, server: &str, kind: JarKind) -> PathBuf {
    staging_root.join(server).join(kind.folder())
}

/// `{displayName}.jar` with path separators neutralised.
fn file_name_for(artifact: &ResolvedArtifact) -> String {
    let stem: String = artifact
        .display_name
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    format!("{stem}.jar")
}

fn plan(
    server: &str,
    resolved: BTreeMap<String, ResolvedArtifact>,
    dest_dir: &Path,
) -> MidnightResult<Vec<PlannedJar>> {
    let planned: Vec<PlannedJar> = resolved
        .into_iter()
        .map(|(identifier, artifact)| PlannedJar {
            server: server.to_string(),
            destination: dest_dir.join(file_name_for(&artifact)),
            identifier,
            artifact,
        })
        .collect();
    check_disjoint(&planned)?;
    Ok(planned)
}

/// Every task must own its destination.
fn check_disjoint(planned: &[PlannedJar]) -> MidnightResult<()> {
    let mut owners: HashMap<&Path, &PlannedJar> = HashMap::new();
    for jar in planned {
        if let Some(first) = owners.insert(&jar.destination, jar) {
            return Err(MidnightError::DestinationConflict {
                first: first.identifier.clone(),
                second: jar.identifier.clone(),
                path: jar.destination.clone(),
            });
        }
    }
    Ok(())
}
