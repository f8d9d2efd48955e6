// ─── Version Catalog ───
// Fetches and caches the version and build listings of the
// Paper-family download registry (v2 API).

use std::collections::HashMap;

use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::core::error::{ManagerError, ManagerResult};
use crate::core::registry::platform::Platform;

/// Public v2 endpoint of the Paper download registry.
pub const DEFAULT_REGISTRY_URL: &str = "https://api.papermc.io/v2";

/// Everything the registry knows about one platform version.
#[derive(Debug, Clone)]
pub struct VersionDescriptor {
    pub platform: Platform,
    pub version: String,
    /// Build numbers sorted ascending; the newest build is last.
    pub builds: Vec<u32>,
}

impl VersionDescriptor {
    /// Newest build of this version, if the registry listed any.
    pub fn latest(&self) -> Option<u32> {
        self.builds.last().copied()
    }
}

/// Response of `/projects/<slug>`.
#[derive(Debug, Deserialize)]
struct ProjectInfo {
    versions: Vec<String>,
}

/// Response of `/projects/<slug>/versions/<version>`.
#[derive(Debug, Deserialize)]
struct VersionInfo {
    builds: Vec<u32>,
}

/// Cached view of the remote registry.
///
/// Listings are fetched once per key and kept for the lifetime of the
/// catalog; a bench session does not care about builds published while
/// it is open. Failed fetches cache nothing, so a later retry hits the
/// registry again.
pub struct VersionCatalog {
    client: Client,
    base_url: String,
    versions: Mutex<HashMap<Platform, Vec<String>>>,
    builds: Mutex<HashMap<(Platform, String), VersionDescriptor>>,
}

impl VersionCatalog {
    pub fn new(client: Client, registry_url: impl Into<String>) -> Self {
        let base_url = registry_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            versions: Mutex::new(HashMap::new()),
            builds: Mutex::new(HashMap::new()),
        }
    }

    /// List the known versions of a platform, newest first.
    ///
    /// The lock is held across the fetch so concurrent lookups for the
    /// same platform collapse into a single registry request.
    pub async fn versions(&self, platform: Platform) -> ManagerResult<Vec<String>> {
        let mut cache = self.versions.lock().await;
        if let Some(known) = cache.get(&platform) {
            debug!("Version list for {platform} served from cache");
            return Ok(known.clone());
        }

        let fetched = self.fetch_versions(platform).await?;
        cache.insert(platform, fetched.clone());
        Ok(fetched)
    }

    /// Build listing for one platform version, oldest build first.
    pub async fn descriptor(
        &self,
        platform: Platform,
        version: &str,
    ) -> ManagerResult<VersionDescriptor> {
        let key = (platform, version.to_string());
        let mut cache = self.builds.lock().await;
        if let Some(known) = cache.get(&key) {
            debug!("Build list for {platform} {version} served from cache");
            return Ok(known.clone());
        }

        let fetched = self.fetch_descriptor(platform, version).await?;
        cache.insert(key, fetched.clone());
        Ok(fetched)
    }

    /// Convenience wrapper over [`VersionCatalog::descriptor`].
    pub async fn builds(&self, platform: Platform, version: &str) -> ManagerResult<Vec<u32>> {
        Ok(self.descriptor(platform, version).await?.builds)
    }

    async fn fetch_versions(&self, platform: Platform) -> ManagerResult<Vec<String>> {
        info!("Fetching {platform} version list...");
        let url = format!("{}/projects/{}", self.base_url, platform.slug());
        let info: ProjectInfo = self.get_json(&url).await?;

        let mut versions = info.versions;
        versions.sort_by(|a, b| {
            version_sort_key(b)
                .cmp(&version_sort_key(a))
                .then_with(|| b.cmp(a))
        });
        versions.dedup();

        info!("Loaded {} {platform} versions", versions.len());
        Ok(versions)
    }

    async fn fetch_descriptor(
        &self,
        platform: Platform,
        version: &str,
    ) -> ManagerResult<VersionDescriptor> {
        info!("Fetching build list for {platform} {version}...");
        let url = format!(
            "{}/projects/{}/versions/{}",
            self.base_url,
            platform.slug(),
            version
        );
        let info: VersionInfo = self.get_json(&url).await?;

        let mut builds = info.builds;
        builds.sort_unstable();
        builds.dedup();

        Ok(VersionDescriptor {
            platform,
            version: version.to_string(),
            builds,
        })
    }

    async fn get_json<T>(&self, url: &str) -> ManagerResult<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ManagerError::Registry {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("unknown").to_string(),
            });
        }

        response.json::<T>().await.map_err(|err| ManagerError::Registry {
            status: status.as_u16(),
            reason: format!("malformed response: {err}"),
        })
    }
}

/// Numeric sort key so "1.10" orders above "1.9".
fn version_sort_key(version: &str) -> Vec<u64> {
    version
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<u64>().unwrap_or(0))
        .collect()
}
