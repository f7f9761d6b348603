// ─── Midnight Core ───
// Jar resolution and download engine for declarative server fleets.
//
// Architecture:
//   core/
//     server/     — Platform types, server declarations, resolution context
//     sources/    — Modrinth, GitHub releases, direct URL, local path + chain
//     downloader/ — Downloadables, bounded concurrent batches, cancellation
//     pipeline    — build / add / install on top of chain + downloader
//     config      — Engine settings and token store
//     http        — Shared reqwest client
//     error       — Crate-wide error type

pub mod config;
pub mod downloader;
pub mod error;
pub mod http;
pub mod pipeline;
pub mod server;
pub mod sources;
