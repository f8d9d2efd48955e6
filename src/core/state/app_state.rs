use std::path::{Path, PathBuf};

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::artifact::{ArtifactCache, ArtifactKey};
use crate::core::error::{ManagerError, ManagerResult};
use crate::core::http::build_http_client;
use crate::core::launch::{ProcessSupervisor, SupervisorState, DEFAULT_DRAIN_LINES};
use crate::core::project::{ProjectManager, ServerDirName};
use crate::core::registry::{Platform, VersionCatalog, DEFAULT_REGISTRY_URL};

const APP_DIR_NAME: &str = "Paperbench";
const SETTINGS_FILE: &str = "settings.json";

/// User-tunable settings persisted to `settings.json` in the data
/// directory. Missing fields fall back to their defaults, so the file
/// can be hand-edited or deleted to reset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerSettings {
    /// Base URL of the download registry.
    pub registry_url: String,
    /// Java binary used to launch servers.
    pub java_bin: PathBuf,
    /// Console lines handed out per drain call.
    pub drain_limit: usize,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            java_bin: PathBuf::from("java"),
            drain_limit: DEFAULT_DRAIN_LINES,
        }
    }
}

/// Ties the backend together for a UI shell: one version catalog, one
/// artifact cache, one project tree and one supervised server.
pub struct AppState {
    pub data_dir: PathBuf,
    pub settings: ManagerSettings,
    pub http_client: Client,
    pub catalog: VersionCatalog,
    pub artifacts: ArtifactCache,
    pub projects: ProjectManager,
    pub supervisor: ProcessSupervisor,
}

impl AppState {
    /// Open the bench in the platform data directory.
    pub fn new() -> ManagerResult<Self> {
        Self::with_data_dir(default_data_dir())
    }

    /// Open the bench rooted at an explicit directory.
    ///
    /// Layout inside the data directory:
    /// - `settings.json` — persisted [`ManagerSettings`]
    /// - `cache/`        — downloaded server jars
    /// - `projects/`     — project workspaces
    /// - `eula.txt`      — optional template copied into new servers
    pub fn with_data_dir(data_dir: PathBuf) -> ManagerResult<Self> {
        std::fs::create_dir_all(&data_dir).map_err(|source| ManagerError::Io {
            path: data_dir.clone(),
            source,
        })?;

        let settings = load_settings_from_disk(&data_dir).unwrap_or_default();
        let http_client = build_http_client()?;

        let catalog = VersionCatalog::new(http_client.clone(), settings.registry_url.clone());
        let artifacts = ArtifactCache::new(
            http_client.clone(),
            settings.registry_url.clone(),
            data_dir.join("cache"),
        );
        let projects = ProjectManager::new(data_dir.join("projects"), data_dir.join("eula.txt"));
        let supervisor = ProcessSupervisor::new(settings.java_bin.clone());

        Ok(Self {
            data_dir,
            settings,
            http_client,
            catalog,
            artifacts,
            projects,
            supervisor,
        })
    }

    /// Persist the current settings.
    pub fn save_settings(&self) -> std::io::Result<()> {
        let settings_path = self.data_dir.join(SETTINGS_FILE);
        let json = serde_json::to_string_pretty(&self.settings)?;
        std::fs::write(settings_path, json)
    }

    // ── Composite operations ────────────────────────────

    /// Key of the newest registry build for a platform version, or
    /// None when the registry lists no builds for it.
    pub async fn latest_build(
        &self,
        platform: Platform,
        version: &str,
    ) -> ManagerResult<Option<ArtifactKey>> {
        let descriptor = self.catalog.descriptor(platform, version).await?;
        Ok(descriptor
            .latest()
            .map(|build| ArtifactKey::new(platform, version, build)))
    }

    /// Resolve an artifact through the cache and provision it into a
    /// project in one go. Returns the provisioned server directory.
    pub async fn install_server(
        &self,
        project: &str,
        key: &ArtifactKey,
    ) -> ManagerResult<PathBuf> {
        let cached = self.artifacts.resolve(key).await?;
        self.projects.provision(project, key, &cached).await
    }

    /// Launch the newest provisioned build of a project server.
    pub async fn start_server(
        &mut self,
        project: &str,
        server: &ServerDirName,
    ) -> ManagerResult<()> {
        let Some(jar) = self.projects.find_server_jar(project, server).await? else {
            return Err(ManagerError::ServerNotProvisioned {
                project: project.to_string(),
                server: server.dir_name(),
            });
        };
        let working_dir = jar
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.data_dir.clone());

        self.supervisor.start(&jar, &working_dir)
    }

    /// One UI tick: observe the child process and hand back a bounded
    /// batch of fresh console output.
    pub fn tick(&mut self) -> ManagerResult<(SupervisorState, Vec<String>)> {
        let state = self.supervisor.poll()?;
        let lines = self.supervisor.drain_console(self.settings.drain_limit);
        Ok((state, lines))
    }
}

fn load_settings_from_disk(data_dir: &Path) -> Option<ManagerSettings> {
    let path = data_dir.join(SETTINGS_FILE);
    let raw = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&raw) {
        Ok(settings) => Some(settings),
        Err(err) => {
            warn!("Ignoring unreadable {SETTINGS_FILE}: {err}");
            None
        }
    }
}

fn default_data_dir() -> PathBuf {
    let dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME);

    if !dir.exists() {
        let _ = std::fs::create_dir_all(&dir);
    }

    dir
}
