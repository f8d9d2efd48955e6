use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::model::{Project, ProjectMeta, ServerDirName};
use crate::core::artifact::ArtifactKey;
use crate::core::error::{ManagerError, ManagerResult};

const META_FILE: &str = "bench.json";

/// Manages project workspaces on disk.
pub struct ProjectManager {
    /// Root directory where all projects live.
    projects_dir: PathBuf,
    /// Pre-accepted `eula.txt` copied into every provisioned server.
    eula_template: PathBuf,
}

impl ProjectManager {
    pub fn new(projects_dir: PathBuf, eula_template: PathBuf) -> Self {
        Self {
            projects_dir,
            eula_template,
        }
    }

    pub fn projects_dir(&self) -> &Path {
        &self.projects_dir
    }

    /// Create a new, empty project.
    pub async fn create(&self, name: &str) -> ManagerResult<Project> {
        validate_name(name)?;

        let path = self.projects_dir.join(name);
        if path.exists() {
            return Err(ManagerError::ProjectAlreadyExists(name.to_string()));
        }

        create_dir_safe(&path).await?;
        let project = Project {
            name: name.to_string(),
            path,
            meta: ProjectMeta::new(),
        };
        self.save_meta(&project).await?;

        info!("Created project '{}'", project.name);
        Ok(project)
    }

    /// Persist a project's metadata.
    pub async fn save_meta(&self, project: &Project) -> ManagerResult<()> {
        let json = serde_json::to_string_pretty(&project.meta)?;
        let meta_path = project.meta_path();

        tokio::fs::write(&meta_path, json)
            .await
            .map_err(|e| ManagerError::Io {
                path: meta_path,
                source: e,
            })?;

        Ok(())
    }

    /// Load a single project by name.
    pub async fn load(&self, name: &str) -> ManagerResult<Project> {
        let path = self.projects_dir.join(name);
        let meta_path = path.join(META_FILE);
        if !meta_path.exists() {
            return Err(ManagerError::ProjectNotFound(name.to_string()));
        }

        let json = tokio::fs::read_to_string(&meta_path)
            .await
            .map_err(|e| ManagerError::Io {
                path: meta_path.clone(),
                source: e,
            })?;

        let meta: ProjectMeta = serde_json::from_str(&json)?;
        Ok(Project {
            name: name.to_string(),
            path,
            meta,
        })
    }

    /// List all projects, skipping unreadable or corrupt metadata.
    pub async fn list(&self) -> ManagerResult<Vec<Project>> {
        let mut projects = Vec::new();

        if !self.projects_dir.exists() {
            return Ok(projects);
        }

        let mut entries = tokio::fs::read_dir(&self.projects_dir)
            .await
            .map_err(|e| ManagerError::Io {
                path: self.projects_dir.clone(),
                source: e,
            })?;

        while let Some(entry) = entries.next_entry().await.map_err(|e| ManagerError::Io {
            path: self.projects_dir.clone(),
            source: e,
        })? {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let meta_path = path.join(META_FILE);
            if !meta_path.exists() {
                continue;
            }
            match tokio::fs::read_to_string(&meta_path).await {
                Ok(json) => match serde_json::from_str::<ProjectMeta>(&json) {
                    Ok(meta) => projects.push(Project {
                        name: name.to_string(),
                        path: path.clone(),
                        meta,
                    }),
                    Err(e) => {
                        warn!("Corrupt {} at {:?}: {}", META_FILE, meta_path, e);
                    }
                },
                Err(e) => {
                    warn!("Cannot read {:?}: {}", meta_path, e);
                }
            }
        }

        projects.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(projects)
    }

    /// Delete a project and all of its provisioned servers.
    pub async fn delete(&self, name: &str) -> ManagerResult<()> {
        let project_dir = self.projects_dir.join(name);
        if !project_dir.exists() {
            return Err(ManagerError::ProjectNotFound(name.to_string()));
        }

        tokio::fs::remove_dir_all(&project_dir)
            .await
            .map_err(|e| ManagerError::Io {
                path: project_dir,
                source: e,
            })?;

        info!("Deleted project {}", name);
        Ok(())
    }

    /// Replace the plugin source list and persist it.
    pub async fn set_plugin_locations(
        &self,
        name: &str,
        locations: Vec<PathBuf>,
    ) -> ManagerResult<Project> {
        let mut project = self.load(name).await?;
        project.meta.plugin_locations = locations;
        self.save_meta(&project).await?;
        Ok(project)
    }

    // ── Server provisioning ─────────────────────────────

    /// Lay out the server directory for `key` inside a project and
    /// place the cached jar in it.
    ///
    /// Creates:
    /// - `<project>/<version>-<platform>/`
    /// - `<project>/<version>-<platform>/plugins/`
    /// - the server jar under its canonical cache name
    /// - `eula.txt` copied from the template when one exists
    pub async fn provision(
        &self,
        name: &str,
        key: &ArtifactKey,
        cached_jar: &Path,
    ) -> ManagerResult<PathBuf> {
        let project = self.load(name).await?;
        let server = ServerDirName::new(key.platform, key.version.clone());
        let server_dir = project.server_dir(&server);

        create_dir_safe(&server_dir.join("plugins")).await?;

        let jar_dest = server_dir.join(key.file_name());
        tokio::fs::copy(cached_jar, &jar_dest)
            .await
            .map_err(|e| ManagerError::Io {
                path: jar_dest.clone(),
                source: e,
            })?;

        if self.eula_template.exists() {
            let eula_dest = server_dir.join("eula.txt");
            tokio::fs::copy(&self.eula_template, &eula_dest)
                .await
                .map_err(|e| ManagerError::Io {
                    path: eula_dest,
                    source: e,
                })?;
        } else {
            debug!(
                "No eula template at {:?}; the server will ask on first boot",
                self.eula_template
            );
        }

        info!("Provisioned {key} in project '{name}'");
        Ok(server_dir)
    }

    /// Newest server jar provisioned for this platform version, by the
    /// build number embedded in the file name.
    pub async fn find_server_jar(
        &self,
        name: &str,
        server: &ServerDirName,
    ) -> ManagerResult<Option<PathBuf>> {
        let project = self.load(name).await?;
        let server_dir = project.server_dir(server);
        if !server_dir.exists() {
            return Ok(None);
        }

        let prefix = format!("{}-{}-", server.platform.slug(), server.version);
        let mut best: Option<(u32, PathBuf)> = None;

        let mut entries = tokio::fs::read_dir(&server_dir)
            .await
            .map_err(|e| ManagerError::Io {
                path: server_dir.clone(),
                source: e,
            })?;
        while let Some(entry) = entries.next_entry().await.map_err(|e| ManagerError::Io {
            path: server_dir.clone(),
            source: e,
        })? {
            let path = entry.path();
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(build) = parse_build_number(file_name, &prefix) else {
                continue;
            };
            if best.as_ref().map_or(true, |(known, _)| build > *known) {
                best = Some((build, path));
            }
        }

        Ok(best.map(|(_, path)| path))
    }

    /// Copy each existing plugin source into the server's `plugins/`
    /// directory. Missing sources are skipped with a warning. Returns
    /// how many files were copied.
    pub async fn sync_plugins(
        &self,
        name: &str,
        server: &ServerDirName,
    ) -> ManagerResult<usize> {
        let project = self.load(name).await?;
        let plugins_dir = project.server_dir(server).join("plugins");
        create_dir_safe(&plugins_dir).await?;

        let mut copied = 0;
        for source in &project.meta.plugin_locations {
            if !source.exists() {
                warn!("Plugin source {:?} does not exist; skipping", source);
                continue;
            }
            let Some(file_name) = source.file_name() else {
                warn!("Plugin source {:?} has no file name; skipping", source);
                continue;
            };
            let dest = plugins_dir.join(file_name);
            tokio::fs::copy(source, &dest)
                .await
                .map_err(|e| ManagerError::Io {
                    path: dest.clone(),
                    source: e,
                })?;
            copied += 1;
        }

        info!(
            "Synced {copied} plugin(s) into '{name}/{}'",
            server.dir_name()
        );
        Ok(copied)
    }

    /// Server directories already provisioned inside a project.
    /// Foreign directories that do not follow the naming scheme are
    /// ignored.
    pub async fn list_servers(&self, name: &str) -> ManagerResult<Vec<ServerDirName>> {
        let project = self.load(name).await?;
        let mut servers = Vec::new();

        let mut entries = tokio::fs::read_dir(&project.path)
            .await
            .map_err(|e| ManagerError::Io {
                path: project.path.clone(),
                source: e,
            })?;
        while let Some(entry) = entries.next_entry().await.map_err(|e| ManagerError::Io {
            path: project.path.clone(),
            source: e,
        })? {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let Some(dir_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if let Some(server) = ServerDirName::parse(dir_name) {
                servers.push(server);
            }
        }

        servers.sort_by_key(|server| server.dir_name());
        Ok(servers)
    }
}

fn validate_name(name: &str) -> ManagerResult<()> {
    if name.is_empty() || name.starts_with('.') || name.contains(['/', '\\']) {
        return Err(ManagerError::InvalidProjectName(name.to_string()));
    }
    Ok(())
}

/// `paper-1.19.4-521.jar` with prefix `paper-1.19.4-` parses to 521.
fn parse_build_number(file_name: &str, prefix: &str) -> Option<u32> {
    file_name
        .strip_prefix(prefix)?
        .strip_suffix(".jar")?
        .parse()
        .ok()
}

async fn create_dir_safe(path: &Path) -> ManagerResult<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|source| ManagerError::Io {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::registry::Platform;

    fn manager(root: &Path) -> ProjectManager {
        ProjectManager::new(root.join("projects"), root.join("eula.txt"))
    }

    #[tokio::test]
    async fn create_then_reload_roundtrips_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(dir.path());
        std::fs::create_dir_all(mgr.projects_dir()).unwrap();

        let created = mgr.create("smp").await.unwrap();
        assert!(created.path.is_dir());
        assert!(created.meta_path().is_file());

        let loaded = mgr.load("smp").await.unwrap();
        assert_eq!(loaded.name, "smp");
        assert_eq!(loaded.meta.created_at, created.meta.created_at);
        assert!(loaded.meta.plugin_locations.is_empty());
    }

    #[tokio::test]
    async fn duplicate_and_invalid_names_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(dir.path());
        std::fs::create_dir_all(mgr.projects_dir()).unwrap();

        mgr.create("smp").await.unwrap();
        match mgr.create("smp").await {
            Err(ManagerError::ProjectAlreadyExists(name)) => assert_eq!(name, "smp"),
            other => panic!("expected duplicate rejection, got {other:?}"),
        }

        for bad in ["", ".hidden", "a/b", "a\\b"] {
            match mgr.create(bad).await {
                Err(ManagerError::InvalidProjectName(_)) => {}
                other => panic!("expected invalid name rejection for {bad:?}, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn list_skips_corrupt_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(dir.path());
        std::fs::create_dir_all(mgr.projects_dir()).unwrap();

        mgr.create("good").await.unwrap();
        let broken = mgr.create("broken").await.unwrap();
        std::fs::write(broken.meta_path(), "certainly not json").unwrap();

        let projects = mgr.list().await.unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].name, "good");
    }

    #[tokio::test]
    async fn plugin_locations_persist() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(dir.path());
        std::fs::create_dir_all(mgr.projects_dir()).unwrap();
        mgr.create("smp").await.unwrap();

        let sources = vec![dir.path().join("worldedit.jar"), dir.path().join("essentials.jar")];
        mgr.set_plugin_locations("smp", sources.clone()).await.unwrap();

        let reloaded = mgr.load("smp").await.unwrap();
        assert_eq!(reloaded.meta.plugin_locations, sources);
    }

    #[tokio::test]
    async fn provision_lays_out_the_server_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(dir.path());
        std::fs::create_dir_all(mgr.projects_dir()).unwrap();
        std::fs::write(dir.path().join("eula.txt"), "eula=true\n").unwrap();
        mgr.create("smp").await.unwrap();

        let cached = dir.path().join("paper-1.19.4-521.jar");
        std::fs::write(&cached, b"jar bytes").unwrap();

        let key = ArtifactKey::new(Platform::Paper, "1.19.4", 521);
        let server_dir = mgr.provision("smp", &key, &cached).await.unwrap();

        assert!(server_dir.ends_with("smp/1.19.4-paper"));
        assert!(server_dir.join("plugins").is_dir());
        assert_eq!(
            std::fs::read(server_dir.join("paper-1.19.4-521.jar")).unwrap(),
            b"jar bytes"
        );
        assert_eq!(
            std::fs::read_to_string(server_dir.join("eula.txt")).unwrap(),
            "eula=true\n"
        );
    }

    #[tokio::test]
    async fn provision_without_an_eula_template_still_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(dir.path());
        std::fs::create_dir_all(mgr.projects_dir()).unwrap();
        mgr.create("smp").await.unwrap();

        let cached = dir.path().join("velocity-3.3.0-400.jar");
        std::fs::write(&cached, b"proxy").unwrap();

        let key = ArtifactKey::new(Platform::Velocity, "3.3.0", 400);
        let server_dir = mgr.provision("smp", &key, &cached).await.unwrap();
        assert!(!server_dir.join("eula.txt").exists());
    }

    #[tokio::test]
    async fn find_server_jar_picks_the_highest_build() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(dir.path());
        std::fs::create_dir_all(mgr.projects_dir()).unwrap();
        let project = mgr.create("smp").await.unwrap();

        let server = ServerDirName::new(Platform::Paper, "1.19.4");
        let server_dir = project.server_dir(&server);
        std::fs::create_dir_all(&server_dir).unwrap();
        for file in [
            "paper-1.19.4-100.jar",
            "paper-1.19.4-521.jar",
            "paper-1.20.1-7.jar",
            "notes.txt",
        ] {
            std::fs::write(server_dir.join(file), b"x").unwrap();
        }

        let found = mgr.find_server_jar("smp", &server).await.unwrap().unwrap();
        assert!(found.ends_with("paper-1.19.4-521.jar"));

        let missing = ServerDirName::new(Platform::Folia, "1.19.4");
        assert!(mgr.find_server_jar("smp", &missing).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sync_plugins_copies_what_exists() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(dir.path());
        std::fs::create_dir_all(mgr.projects_dir()).unwrap();
        mgr.create("smp").await.unwrap();

        let present = dir.path().join("worldedit.jar");
        std::fs::write(&present, b"plugin bytes").unwrap();
        let missing = dir.path().join("gone.jar");
        mgr.set_plugin_locations("smp", vec![present, missing]).await.unwrap();

        let server = ServerDirName::new(Platform::Paper, "1.19.4");
        let copied = mgr.sync_plugins("smp", &server).await.unwrap();
        assert_eq!(copied, 1);

        let dest = mgr
            .load("smp")
            .await
            .unwrap()
            .server_dir(&server)
            .join("plugins/worldedit.jar");
        assert_eq!(std::fs::read(dest).unwrap(), b"plugin bytes");
    }

    #[tokio::test]
    async fn list_servers_ignores_foreign_directories() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(dir.path());
        std::fs::create_dir_all(mgr.projects_dir()).unwrap();
        let project = mgr.create("smp").await.unwrap();

        for server_dir in ["1.19.4-paper", "3.3.0-velocity", "scratch"] {
            std::fs::create_dir_all(project.path.join(server_dir)).unwrap();
        }

        let servers = mgr.list_servers("smp").await.unwrap();
        assert_eq!(
            servers,
            vec![
                ServerDirName::new(Platform::Paper, "1.19.4"),
                ServerDirName::new(Platform::Velocity, "3.3.0"),
            ]
        );
    }

    #[tokio::test]
    async fn delete_removes_the_whole_project() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(dir.path());
        std::fs::create_dir_all(mgr.projects_dir()).unwrap();
        let project = mgr.create("smp").await.unwrap();

        mgr.delete("smp").await.unwrap();
        assert!(!project.path.exists());

        match mgr.delete("smp").await {
            Err(ManagerError::ProjectNotFound(_)) => {}
            other => panic!("expected not-found, got {other:?}"),
        }
    }
}
