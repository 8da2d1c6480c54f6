// ─── Quiltflower Updater Core ───
// Resolves the Quiltflower decompiler version to use and keeps its jar
// cached locally.
//
// Architecture:
//   core/
//     maven/       — maven-metadata.xml fetch + parse (channel, snapshot)
//     catalog/     — Release + snapshot catalog, "latest" selection policy
//     cache/       — Jar cache with ETag revalidation and atomic replace
//     coordinator/ — Refresh/download cycles, single-writer session state
//     version/     — Lenient semantic versions
//     http/        — Transport seam over reqwest
//     config/      — Settings, settings store, on-disk paths

pub mod cache;
pub mod catalog;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod http;
pub mod maven;
pub mod version;
