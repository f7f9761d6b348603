pub mod chain;
pub mod direct;
pub mod github;
pub mod local;
pub mod modrinth;
pub mod patterns;
pub mod source;

pub use chain::ResolverChain;
pub use source::{ArtifactLocation, ArtifactRequest, JarSource, ResolvedArtifact, SourceKind};
