use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::error::{MidnightError, MidnightResult};
use crate::core::sources::SourceKind;

const APP_DIR_NAME: &str = "midnight";
const CONFIG_FILE: &str = "engine.json";
const TOKENS_FILE: &str = "tokens.properties";

pub const MODRINTH_ENDPOINT: &str = "https://api.modrinth.com";
pub const GITHUB_ENDPOINT: &str = "https://api.github.com";
const USER_AGENT: &str = "midnight/0.1.0";

/// Process-wide settings of the jar engine, persisted as JSON.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct EngineConfig {
    /// Priority order in which sources are probed for every request.
    #[serde(alias = "jar-source-order")]
    pub source_order: Vec<SourceKind>,
    /// Maximum number of simultaneous downloads.
    pub concurrency: usize,
    pub modrinth_endpoint: String,
    pub github_endpoint: String,
    pub user_agent: String,
    pub connect_timeout_secs: u64,
    /// Upper bound for a single HTTP request, body included.
    pub request_timeout_secs: u64,
    /// Upper bound for one download task.
    pub task_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            source_order: vec![
                SourceKind::Modrinth,
                SourceKind::Github,
                SourceKind::Direct,
                SourceKind::Local,
            ],
            concurrency: 8,
            modrinth_endpoint: MODRINTH_ENDPOINT.to_string(),
            github_endpoint: GITHUB_ENDPOINT.to_string(),
            user_agent: USER_AGENT.to_string(),
            connect_timeout_secs: 60,
            request_timeout_secs: 60 * 60,
            task_timeout_secs: 60 * 60,
        }
    }
}

impl EngineConfig {
    /// Load from the default location, falling back to defaults when absent.
    pub fn load_or_default() -> MidnightResult<Self> {
        let path = default_config_dir().join(CONFIG_FILE);
        if !path.exists() {
            debug!("No engine config at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        Self::load(&path)
    }

    pub fn load(path: &Path) -> MidnightResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| MidnightError::io(path, e))?;
        let config: EngineConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> MidnightResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| MidnightError::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| MidnightError::io(path, e))
    }

    pub fn validate(&self) -> MidnightResult<()> {
        if self.source_order.is_empty() {
            return Err(MidnightError::Config("source order is empty".into()));
        }
        check_unique_order(&self.source_order)?;
        if self.concurrency == 0 {
            return Err(MidnightError::Config("concurrency must be at least 1".into()));
        }
        Ok(())
    }
}

/// Reject an order that names the same source twice.
pub fn check_unique_order(order: &[SourceKind]) -> MidnightResult<()> {
    let mut seen = HashSet::new();
    for kind in order {
        if !seen.insert(*kind) {
            return Err(MidnightError::DuplicateSource(kind.to_string()));
        }
    }
    Ok(())
}

/// Credentials keyed by source name (`github`, ...).
#[derive(Debug, Clone, Default)]
pub struct TokenStore {
    tokens: HashMap<String, String>,
}

const TOKEN_ENV: [(&str, &str); 3] = [
    ("github", "MIDNIGHT_GITHUB_TOKEN"),
    ("github", "GITHUB_TOKEN"),
    ("github", "GH_TOKEN"),
];

impl TokenStore {
    /// Tokens file from the default location overlaid by environment variables.
    pub fn load_default() -> MidnightResult<Self> {
        let path = default_config_dir().join(TOKENS_FILE);
        let mut store = if path.exists() {
            Self::from_properties_file(&path)?
        } else {
            Self::default()
        };
        store.merge_env();
        Ok(store)
    }

    pub fn from_properties_file(path: &Path) -> MidnightResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| MidnightError::io(path, e))?;
        Ok(Self::parse_properties(&raw))
    }

    /// Parse `key=value` (or `key: value`) lines; `#` and `!` start comments.
    pub fn parse_properties(raw: &str) -> Self {
        let tokens = raw
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('!'))
            .filter_map(|line| {
                let idx = line.find(['=', ':'])?;
                let key = line[..idx].trim();
                let value = line[idx + 1..].trim();
                (!key.is_empty() && !value.is_empty()).then(|| (key.to_string(), value.to_string()))
            })
            .collect();
        Self { tokens }
    }

    /// Fill in tokens from the environment without overriding file entries.
    pub fn merge_env(&mut self) {
        for (key, var) in TOKEN_ENV {
            if self.tokens.contains_key(key) {
                continue;
            }
            if let Ok(value) = std::env::var(var) {
                if !value.trim().is_empty() {
                    self.tokens.insert(key.to_string(), value.trim().to_string());
                }
            }
        }
    }

    pub fn insert(&mut self, source: impl Into<String>, token: impl Into<String>) {
        self.tokens.insert(source.into(), token.into());
    }

    pub fn get(&self, source: &str) -> Option<&str> {
        self.tokens.get(source).map(String::as_str)
    }
}

fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_order_matches_documented_priority() {
        let config = EngineConfig::default();
        assert_eq!(
            config.source_order,
            vec![
                SourceKind::Modrinth,
                SourceKind::Github,
                SourceKind::Direct,
                SourceKind::Local
            ]
        );
        assert_eq!(config.request_timeout_secs, 3600);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{ "jar-source-order": ["local", "direct"], "concurrency": 2 }"#)
                .unwrap();
        assert_eq!(config.source_order, vec![SourceKind::Local, SourceKind::Direct]);
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.github_endpoint, GITHUB_ENDPOINT);
    }

    #[test]
    fn unknown_source_name_is_rejected() {
        let parsed = serde_json::from_str::<EngineConfig>(r#"{ "source-order": ["curseforge"] }"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn duplicate_source_fails_validation() {
        let config = EngineConfig {
            source_order: vec![SourceKind::Github, SourceKind::Github],
            ..EngineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(MidnightError::DuplicateSource(name)) if name == "github"
        ));
    }

    #[test]
    fn zero_concurrency_fails_validation() {
        let config = EngineConfig {
            concurrency: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(config.validate(), Err(MidnightError::Config(_))));
    }

    #[test]
    fn save_then_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);
        let config = EngineConfig {
            concurrency: 3,
            ..EngineConfig::default()
        };
        config.save(&path).unwrap();
        assert_eq!(EngineConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn properties_parsing_skips_comments_and_blanks() {
        let store = TokenStore::parse_properties(
            "# tokens\n! legacy comment\n\ngithub = ghp_abc\nmodrinth: mrp_xyz\nempty=\n",
        );
        assert_eq!(store.get("github"), Some("ghp_abc"));
        assert_eq!(store.get("modrinth"), Some("mrp_xyz"));
        assert_eq!(store.get("empty"), None);
    }

    #[test]
    fn env_tokens_fill_gaps_without_overriding_file() {
        std::env::set_var("MIDNIGHT_GITHUB_TOKEN", "ghp_midnight");
        std::env::set_var("GITHUB_TOKEN", "ghp_generic");

        let mut from_env = TokenStore::default();
        from_env.merge_env();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(TOKENS_FILE);
        std::fs::write(&path, "github=ghp_file\n").unwrap();
        let mut from_file = TokenStore::from_properties_file(&path).unwrap();
        from_file.merge_env();

        std::env::remove_var("MIDNIGHT_GITHUB_TOKEN");
        std::env::remove_var("GITHUB_TOKEN");

        assert_eq!(from_env.get("github"), Some("ghp_midnight"));
        assert_eq!(from_file.get("github"), Some("ghp_file"));
    }
}
