use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::error::MidnightError;

/// Server/loader flavours. Sent verbatim as the registry `loaders` filter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PlatformType {
    Vanilla,
    Fabric,
    Forge,
    Quilt,
    NeoForge,
    Paper,
    Spigot,
    Purpur,
    Velocity,
    Waterfall,
    BungeeCord,
}

impl fmt::Display for PlatformType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlatformType {
    type Err = MidnightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let platform = match s.to_ascii_lowercase().as_str() {
            "vanilla" => PlatformType::Vanilla,
            "fabric" => PlatformType::Fabric,
            "forge" => PlatformType::Forge,
            "quilt" => PlatformType::Quilt,
            "neoforge" => PlatformType::NeoForge,
            "paper" => PlatformType::Paper,
            "spigot" => PlatformType::Spigot,
            "purpur" => PlatformType::Purpur,
            "velocity" => PlatformType::Velocity,
            "waterfall" => PlatformType::Waterfall,
            "bungeecord" => PlatformType::BungeeCord,
            _ => return Err(MidnightError::UnknownPlatform(s.to_string())),
        };
        Ok(platform)
    }
}

impl PlatformType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformType::Vanilla => "vanilla",
            PlatformType::Fabric => "fabric",
            PlatformType::Forge => "forge",
            PlatformType::Quilt => "quilt",
            PlatformType::NeoForge => "neoforge",
            PlatformType::Paper => "paper",
            PlatformType::Spigot => "spigot",
            PlatformType::Purpur => "purpur",
            PlatformType::Velocity => "velocity",
            PlatformType::Waterfall => "waterfall",
            PlatformType::BungeeCord => "bungeecord",
        }
    }

    pub fn is_proxy(&self) -> bool {
        matches!(
            self,
            PlatformType::Velocity | PlatformType::Waterfall | PlatformType::BungeeCord
        )
    }

    pub fn is_modded(&self) -> bool {
        matches!(
            self,
            PlatformType::Fabric | PlatformType::Forge | PlatformType::Quilt | PlatformType::NeoForge
        )
    }

    pub fn is_plugin_server(&self) -> bool {
        matches!(
            self,
            PlatformType::Paper | PlatformType::Spigot | PlatformType::Purpur
        )
    }

    /// Plugin servers and proxies both load jars from `plugins/`.
    pub fn loads_plugins(&self) -> bool {
        self.is_plugin_server() || self.is_proxy()
    }

    /// Which jar table this platform reads, if any.
    pub fn jar_kind(&self) -> Option<JarKind> {
        if self.is_modded() {
            Some(JarKind::Mods)
        } else if self.loads_plugins() {
            Some(JarKind::Plugins)
        } else {
            None
        }
    }
}

/// The two jar tables a server may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JarKind {
    Mods,
    Plugins,
}

impl JarKind {
    /// Folder name used both for staging and inside the server data dir.
    pub fn folder(&self) -> &'static str {
        match self {
            JarKind::Mods => "mods",
            JarKind::Plugins => "plugins",
        }
    }
}

/// One server as declared in the fleet file.
///
/// The `version` field is interpreted per platform:
/// - modded: `"<loader version>:<game version>"`
/// - plugin server / vanilla: the game version
/// - proxy: the proxy software version (no game version)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ServerSpec {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub platform: PlatformType,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mods: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugins: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

impl ServerSpec {
    pub fn new(name: impl Into<String>, platform: PlatformType, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            platform,
            version: version.into(),
            mods: None,
            plugins: None,
            data_dir: None,
        }
    }

    /// Game version used to filter registry queries. Proxies have none.
    pub fn minecraft_version(&self) -> Option<&str> {
        if self.platform.is_proxy() {
            None
        } else if self.platform.is_modded() {
            Some(
                self.version
                    .split_once(':')
                    .map(|(_, game)| game)
                    .unwrap_or(&self.version),
            )
        } else {
            Some(&self.version)
        }
    }

    /// Loader or proxy software version, when the platform has one.
    pub fn software_version(&self) -> Option<&str> {
        if self.platform.is_proxy() {
            Some(&self.version)
        } else if self.platform.is_modded() {
            self.version.split_once(':').map(|(loader, _)| loader)
        } else {
            None
        }
    }

    /// The declared jar table for this platform (`mods` or `plugins`).
    pub fn jars(&self) -> Option<&BTreeMap<String, String>> {
        match self.platform.jar_kind()? {
            JarKind::Mods => self.mods.as_ref(),
            JarKind::Plugins => self.plugins.as_ref(),
        }
    }

    pub fn jars_mut(&mut self) -> Option<&mut BTreeMap<String, String>> {
        match self.platform.jar_kind()? {
            JarKind::Mods => Some(self.mods.get_or_insert_with(BTreeMap::new)),
            JarKind::Plugins => Some(self.plugins.get_or_insert_with(BTreeMap::new)),
        }
    }

    pub fn with_jar(mut self, identifier: impl Into<String>, version_expr: impl Into<String>) -> Self {
        if let Some(jars) = self.jars_mut() {
            jars.insert(identifier.into(), version_expr.into());
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_classification() {
        assert!(PlatformType::Fabric.is_modded());
        assert!(PlatformType::Paper.is_plugin_server());
        assert!(PlatformType::Velocity.is_proxy());
        assert!(PlatformType::Velocity.loads_plugins());
        assert_eq!(PlatformType::Vanilla.jar_kind(), None);
        assert_eq!(PlatformType::Forge.jar_kind(), Some(JarKind::Mods));
        assert_eq!(PlatformType::Waterfall.jar_kind(), Some(JarKind::Plugins));
    }

    #[test]
    fn platform_parses_case_insensitively() {
        assert_eq!("NeoForge".parse::<PlatformType>().unwrap(), PlatformType::NeoForge);
        assert_eq!(PlatformType::BungeeCord.to_string(), "bungeecord");
        assert!(matches!(
            "sponge".parse::<PlatformType>(),
            Err(MidnightError::UnknownPlatform(_))
        ));
    }

    #[test]
    fn modded_version_splits_loader_and_game() {
        let server = ServerSpec::new("survival", PlatformType::Fabric, "0.15.11:1.20.1");
        assert_eq!(server.minecraft_version(), Some("1.20.1"));
        assert_eq!(server.software_version(), Some("0.15.11"));
    }

    #[test]
    fn modded_version_without_loader_is_the_game_version() {
        let server = ServerSpec::new("survival", PlatformType::Quilt, "1.20.1");
        assert_eq!(server.minecraft_version(), Some("1.20.1"));
        assert_eq!(server.software_version(), None);
    }

    #[test]
    fn proxy_has_no_game_version() {
        let proxy = ServerSpec::new("proxy", PlatformType::Velocity, "3.3.0");
        assert_eq!(proxy.minecraft_version(), None);
        assert_eq!(proxy.software_version(), Some("3.3.0"));
    }

    #[test]
    fn jar_table_follows_platform() {
        let lobby = ServerSpec::new("lobby", PlatformType::Paper, "1.20.1")
            .with_jar("luckperms", "*");
        assert!(lobby.mods.is_none());
        assert_eq!(lobby.jars().unwrap().get("luckperms").unwrap(), "*");

        let vanilla = ServerSpec::new("v", PlatformType::Vanilla, "1.20.1").with_jar("x", "*");
        assert!(vanilla.jars().is_none());
    }

    #[test]
    fn deserializes_from_fleet_file_shape() {
        let json = r#"{
            "type": "fabric",
            "version": "0.15.11:1.20.1",
            "mods": { "sodium": "*", "lithium": "mc1.20.1-0.11.2" },
            "data-dir": "data/survival"
        }"#;
        let server: ServerSpec = serde_json::from_str(json).unwrap();
        assert_eq!(server.platform, PlatformType::Fabric);
        assert_eq!(server.jars().unwrap().len(), 2);
        assert_eq!(server.data_dir, Some(PathBuf::from("data/survival")));
    }
}
