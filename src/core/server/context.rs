use std::path::{Path, PathBuf};

use crate::core::config::{check_unique_order, TokenStore};
use crate::core::error::MidnightResult;
use crate::core::server::model::{PlatformType, ServerSpec};
use crate::core::sources::SourceKind;

/// Immutable facts a source needs to disambiguate a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerContext {
    pub platform: PlatformType,
    pub game_version: Option<String>,
    pub source_order: Vec<SourceKind>,
    /// Bearer credential for the hosted-release source only.
    pub credential: Option<String>,
    /// Relative local paths are interpreted against this directory.
    pub base_dir: Option<PathBuf>,
}

impl ServerContext {
    pub fn new(
        platform: PlatformType,
        game_version: Option<String>,
        source_order: Vec<SourceKind>,
    ) -> MidnightResult<Self> {
        check_unique_order(&source_order)?;
        Ok(Self {
            platform,
            game_version,
            source_order,
            credential: None,
            base_dir: None,
        })
    }

    /// Context for a declared server, pulling the GitHub token from `tokens`.
    pub fn for_server(
        server: &ServerSpec,
        source_order: &[SourceKind],
        tokens: &TokenStore,
    ) -> MidnightResult<Self> {
        let mut ctx = Self::new(
            server.platform,
            server.minecraft_version().map(str::to_string),
            source_order.to_vec(),
        )?;
        ctx.credential = tokens.get(SourceKind::Github.as_str()).map(str::to_string);
        Ok(ctx)
    }

    pub fn with_credential(mut self, token: impl Into<String>) -> Self {
        self.credential = Some(token.into());
        self
    }

    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// Interpret a version expression as a filesystem path.
    pub fn local_path(&self, expr: &str) -> PathBuf {
        let path = Path::new(expr);
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}
