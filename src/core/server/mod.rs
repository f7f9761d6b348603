pub mod context;
pub mod model;

pub use context::ServerContext;
pub use model::{JarKind, PlatformType, ServerSpec};
