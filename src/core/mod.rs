// ─── Paperbench Core ───
// Modular backend for a disposable Paper-family test server bench.
//
// Architecture:
//   core/
//     registry/ — platform slugs + cached version/build catalog
//     artifact/ — download-through jar cache with single-flight
//     project/  — project workspaces + server provisioning
//     launch/   — process supervisor + console bridge
//     state/    — settings + application facade

pub mod artifact;
pub mod error;
pub mod http;
pub mod launch;
pub mod project;
pub mod registry;
pub mod state;

#[cfg(test)]
pub(crate) mod testserver;
