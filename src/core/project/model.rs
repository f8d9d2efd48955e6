use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::core::registry::Platform;

/// Project metadata persisted to disk as `bench.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectMeta {
    pub created_at: DateTime<Utc>,
    /// Plugin jars copied into a provisioned server by `sync_plugins`.
    #[serde(default)]
    pub plugin_locations: Vec<PathBuf>,
}

impl ProjectMeta {
    pub fn new() -> Self {
        Self {
            created_at: Utc::now(),
            plugin_locations: Vec::new(),
        }
    }
}

impl Default for ProjectMeta {
    fn default() -> Self {
        Self::new()
    }
}

/// A named workspace holding one server directory per platform version.
///
/// Each project has its own folder under `projects/<name>/` with:
/// - `bench.json`             — this serialized metadata
/// - `<version>-<platform>/`  — one directory per provisioned server
#[derive(Debug, Clone)]
pub struct Project {
    pub name: String,
    pub path: PathBuf,
    pub meta: ProjectMeta,
}

impl Project {
    /// Path to this project's metadata file.
    pub fn meta_path(&self) -> PathBuf {
        self.path.join("bench.json")
    }

    /// Directory of one provisioned server, e.g. `1.19.4-paper/`.
    pub fn server_dir(&self, server: &ServerDirName) -> PathBuf {
        self.path.join(server.dir_name())
    }
}

/// Naming scheme of server directories inside a project:
/// `<version>-<platform>`, e.g. `1.19.4-paper`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerDirName {
    pub platform: Platform,
    pub version: String,
}

impl ServerDirName {
    pub fn new(platform: Platform, version: impl Into<String>) -> Self {
        Self {
            platform,
            version: version.into(),
        }
    }

    pub fn dir_name(&self) -> String {
        format!("{}-{}", self.version, self.platform)
    }

    /// Parse a directory name back into its parts.
    ///
    /// Platform slugs never contain a dash, so the split happens at
    /// the last one; pre-release versions like `1.19.4-rc1` survive
    /// the roundtrip.
    pub fn parse(name: &str) -> Option<Self> {
        let (version, slug) = name.rsplit_once('-')?;
        if version.is_empty() {
            return None;
        }
        let platform = Platform::from_slug(slug)?;
        Some(Self {
            platform,
            version: version.to_string(),
        })
    }
}
