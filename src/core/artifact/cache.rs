// ─── Artifact Cache ───
// Local store of downloaded server jars, one file per
// platform/version/build. Bodies are streamed to a temp file and
// renamed into place so the cache never exposes a half-written jar.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::StreamExt;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::error::{ManagerError, ManagerResult};
use crate::core::registry::Platform;

/// Identity of one server artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactKey {
    pub platform: Platform,
    pub version: String,
    pub build: u32,
}

impl ArtifactKey {
    pub fn new(platform: Platform, version: impl Into<String>, build: u32) -> Self {
        Self {
            platform,
            version: version.into(),
            build,
        }
    }

    /// Canonical cache file name, e.g. `paper-1.19.4-521.jar`.
    pub fn file_name(&self) -> String {
        format!("{}-{}-{}.jar", self.platform.slug(), self.version, self.build)
    }

    /// Registry download URL for this artifact.
    pub fn download_url(&self, registry_url: &str) -> String {
        format!(
            "{}/projects/{}/versions/{}/builds/{}/downloads/{}",
            registry_url.trim_end_matches('/'),
            self.platform.slug(),
            self.version,
            self.build,
            self.file_name()
        )
    }
}

impl std::fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} build {}", self.platform, self.version, self.build)
    }
}

/// Download-through cache for server jars.
///
/// `resolve` is the only entry point: it returns the cached path or
/// downloads first. Concurrent resolves of the same key are collapsed
/// into a single download through a per-key gate.
pub struct ArtifactCache {
    client: Client,
    base_url: String,
    cache_dir: PathBuf,
    /// One gate per key ever requested; kept for the cache lifetime.
    in_flight: Mutex<HashMap<ArtifactKey, Arc<Mutex<()>>>>,
}

impl ArtifactCache {
    pub fn new(client: Client, registry_url: impl Into<String>, cache_dir: PathBuf) -> Self {
        let base_url = registry_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            cache_dir,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Whether the artifact is already present on disk.
    pub async fn contains(&self, key: &ArtifactKey) -> bool {
        file_exists(&self.cache_dir.join(key.file_name())).await
    }

    /// Return the local path of the artifact, downloading it first if
    /// the cache does not hold it yet.
    pub async fn resolve(&self, key: &ArtifactKey) -> ManagerResult<PathBuf> {
        let final_path = self.cache_dir.join(key.file_name());
        if file_exists(&final_path).await {
            debug!("Cache hit: {key}");
            return Ok(final_path);
        }

        let gate = self.claim(key).await;
        let _guard = gate.lock().await;

        // Another task may have completed the same download while we
        // waited on the gate.
        if file_exists(&final_path).await {
            debug!("Cache hit after waiting on in-flight download: {key}");
            return Ok(final_path);
        }

        self.download(key, &final_path).await?;
        Ok(final_path)
    }

    async fn claim(&self, key: &ArtifactKey) -> Arc<Mutex<()>> {
        let mut gates = self.in_flight.lock().await;
        gates.entry(key.clone()).or_default().clone()
    }

    async fn download(&self, key: &ArtifactKey, final_path: &Path) -> ManagerResult<()> {
        tokio::fs::create_dir_all(&self.cache_dir)
            .await
            .map_err(|e| ManagerError::Io {
                path: self.cache_dir.clone(),
                source: e,
            })?;

        let url = key.download_url(&self.base_url);
        info!("Downloading {key} from {url}");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ManagerError::Download {
                url,
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("unknown").to_string(),
            });
        }

        let temp_path = self
            .cache_dir
            .join(format!("{}.{}.part", key.file_name(), Uuid::new_v4()));

        match write_body(response, &temp_path).await {
            Ok(bytes) => {
                tokio::fs::rename(&temp_path, final_path)
                    .await
                    .map_err(|e| ManagerError::Io {
                        path: final_path.to_path_buf(),
                        source: e,
                    })?;
                info!("Cached {key} ({bytes} bytes)");
                Ok(())
            }
            Err(err) => {
                if let Err(cleanup) = tokio::fs::remove_file(&temp_path).await {
                    if cleanup.kind() != std::io::ErrorKind::NotFound {
                        warn!("Could not remove partial download {temp_path:?}: {cleanup}");
                    }
                }
                Err(err)
            }
        }
    }
}

async fn file_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

/// Stream the response body to `temp_path`, returning the byte count.
async fn write_body(response: reqwest::Response, temp_path: &Path) -> ManagerResult<u64> {
    let mut bytes_written: u64 = 0;
    {
        let mut file = tokio::fs::File::create(temp_path)
            .await
            .map_err(|e| ManagerError::Io {
                path: temp_path.to_path_buf(),
                source: e,
            })?;

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await.map_err(|e| ManagerError::Io {
                path: temp_path.to_path_buf(),
                source: e,
            })?;
            bytes_written += chunk.len() as u64;
        }

        file.flush().await.map_err(|e| ManagerError::Io {
            path: temp_path.to_path_buf(),
            source: e,
        })?;
        // file is dropped here — critical on Windows
    }
    Ok(bytes_written)
}
